//! Named lifecycle operations
//!
//! Thin wrappers over [`StateMachine::transition_to`]. Operations that carry
//! a domain action run it first; an action error fails the job instead of
//! propagating.

use serde_json::{Map, Value};
use tracing::warn;

use super::StateMachine;
use crate::guards::CHECKLIST_COMPLETE;
use penplot_journal::JobState;

/// Result of a domain action: metadata merged into the transition
pub type ActionResult = Result<Map<String, Value>, String>;

impl StateMachine {
    pub fn queue_job(&mut self) -> bool {
        self.transition_to(JobState::Queued, "Job queued", Map::new())
    }

    /// Run `analyze` and enter ANALYZED with its output as metadata
    pub fn analyze_job<F>(&mut self, analyze: F) -> bool
    where
        F: FnOnce(&str) -> ActionResult,
    {
        self.run_action(JobState::Analyzed, "Analysis complete", analyze)
    }

    /// Run `optimize` and enter OPTIMIZED with its output as metadata
    pub fn optimize_job<F>(&mut self, optimize: F) -> bool
    where
        F: FnOnce(&str) -> ActionResult,
    {
        self.run_action(JobState::Optimized, "Optimization complete", optimize)
    }

    pub fn ready_job(&mut self) -> bool {
        self.transition_to(JobState::Ready, "Job ready for plotting", Map::new())
    }

    /// Arm the device. The checklist is verified before the full guard policy.
    pub fn arm_job(&mut self) -> bool {
        if !self.current_state.can_transition_to(JobState::Armed) {
            return false;
        }

        if let Some(check) = self.guards.check_one(&self.job_id, CHECKLIST_COMPLETE) {
            if check.result.is_blocking() {
                warn!(job_id = %self.job_id, message = %check.message, "checklist incomplete, not arming");
                self.last_guard_checks = vec![check];
                return false;
            }
        }

        self.transition_to(JobState::Armed, "Device armed", Map::new())
    }

    /// ARMED → PLOTTING. Use [`resume_plotting`](Self::resume_plotting) from PAUSED.
    pub fn start_plotting(&mut self) -> bool {
        if self.current_state != JobState::Armed {
            return false;
        }
        self.transition_to(JobState::Plotting, "Plotting started", Map::new())
    }

    pub fn pause_plotting(&mut self) -> bool {
        self.transition_to(JobState::Paused, "Plotting paused", Map::new())
    }

    /// PAUSED → PLOTTING
    pub fn resume_plotting(&mut self) -> bool {
        if self.current_state != JobState::Paused {
            return false;
        }
        self.transition_to(JobState::Plotting, "Plotting resumed", Map::new())
    }

    pub fn complete_job(&mut self) -> bool {
        self.transition_to(JobState::Completed, "Plot completed", Map::new())
    }

    pub fn abort_job(&mut self, reason: &str) -> bool {
        self.transition_to(JobState::Aborted, reason, Map::new())
    }

    pub fn fail_job(&mut self, error: &str) -> bool {
        let mut metadata = Map::new();
        metadata.insert("error".to_string(), Value::from(error));
        self.transition_to(JobState::Failed, &format!("Job failed: {}", error), metadata)
    }

    fn run_action<F>(&mut self, target: JobState, reason: &str, action: F) -> bool
    where
        F: FnOnce(&str) -> ActionResult,
    {
        if !self.current_state.can_transition_to(target) {
            return false;
        }

        match action(&self.job_id) {
            Ok(metadata) => self.transition_to(target, reason, metadata),
            Err(error) => {
                if !self.fail_job(&error) {
                    warn!(
                        job_id = %self.job_id,
                        state = %self.current_state,
                        error = %error,
                        "action failed and job cannot fail from this state"
                    );
                }
                false
            }
        }
    }
}
