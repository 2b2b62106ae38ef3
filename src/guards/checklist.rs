//! checklist-complete guard

use std::sync::Arc;

use super::{Guard, CHECKLIST_COMPLETE};
use crate::adapters::{AdapterResult, ChecklistProvider};
use penplot_journal::GuardCheck;

/// Passes when every required pre-flight item is done
pub struct ChecklistCompleteGuard {
    checklist: Option<Arc<dyn ChecklistProvider>>,
}

impl ChecklistCompleteGuard {
    pub fn new(checklist: Option<Arc<dyn ChecklistProvider>>) -> Self {
        Self { checklist }
    }
}

impl Guard for ChecklistCompleteGuard {
    fn name(&self) -> &'static str {
        CHECKLIST_COMPLETE
    }

    fn check(&self, job_id: &str) -> AdapterResult<GuardCheck> {
        let Some(checklist) = &self.checklist else {
            return Ok(GuardCheck::skipped(
                CHECKLIST_COMPLETE,
                "no checklist provider configured",
            ));
        };

        let progress = checklist.get_progress(job_id)?;
        let summary = format!(
            "{}/{} required items done",
            progress.required_completed, progress.required_total
        );
        let check = if progress.is_complete() {
            GuardCheck::pass(CHECKLIST_COMPLETE, summary)
        } else {
            GuardCheck::fail(CHECKLIST_COMPLETE, summary)
        };
        Ok(check
            .with_detail("required_completed", progress.required_completed)
            .with_detail("required_total", progress.required_total))
    }
}
