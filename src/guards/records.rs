//! Guards that read the job record (opt-in)

use super::{Guard, PAPER_SESSION_VALID, PEN_LAYER_COMPATIBLE};
use crate::adapters::{AdapterError, AdapterResult};
use crate::job_record::{JobRecord, JobRecordStore};
use penplot_journal::GuardCheck;

fn load(records: &Option<JobRecordStore>, job_id: &str) -> AdapterResult<Option<JobRecord>> {
    match records {
        Some(store) => store
            .load(job_id)
            .map_err(|e| AdapterError::InvalidOutput(format!("job record: {}", e))),
        None => Ok(None),
    }
}

/// A paper session must be chosen before arming
pub struct PaperSessionGuard {
    records: Option<JobRecordStore>,
}

impl PaperSessionGuard {
    pub fn new(records: Option<JobRecordStore>) -> Self {
        Self { records }
    }
}

impl Guard for PaperSessionGuard {
    fn name(&self) -> &'static str {
        PAPER_SESSION_VALID
    }

    fn check(&self, job_id: &str) -> AdapterResult<GuardCheck> {
        let Some(record) = load(&self.records, job_id)? else {
            return Ok(GuardCheck::skipped(PAPER_SESSION_VALID, "no job record"));
        };
        match record.paper.as_deref() {
            Some(paper) if record.has_paper() => Ok(GuardCheck::pass(
                PAPER_SESSION_VALID,
                format!("paper session {}", paper),
            )),
            _ => Ok(GuardCheck::fail(PAPER_SESSION_VALID, "no paper selected for job")),
        }
    }
}

/// Pens must be assigned to every layer before arming
pub struct PenLayerGuard {
    records: Option<JobRecordStore>,
}

impl PenLayerGuard {
    pub fn new(records: Option<JobRecordStore>) -> Self {
        Self { records }
    }
}

impl Guard for PenLayerGuard {
    fn name(&self) -> &'static str {
        PEN_LAYER_COMPATIBLE
    }

    fn check(&self, job_id: &str) -> AdapterResult<GuardCheck> {
        let Some(record) = load(&self.records, job_id)? else {
            return Ok(GuardCheck::skipped(PEN_LAYER_COMPATIBLE, "no job record"));
        };
        if record.is_configured() {
            return Ok(GuardCheck::pass(PEN_LAYER_COMPATIBLE, "pens assigned to all layers"));
        }
        let status = record.config_status.unwrap_or_else(|| "unset".to_string());
        Ok(
            GuardCheck::fail(PEN_LAYER_COMPATIBLE, format!("pen configuration {}", status))
                .with_detail("config_status", status),
        )
    }
}
