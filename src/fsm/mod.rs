//! Job lifecycle state machine
//!
//! One [`StateMachine`] per job, seeded from the job's journal. A transition
//! is checked against the static table first, then against the guard policy
//! for risky targets, and is committed once its `state_change` record is
//! durable. Hooks run afterwards and never undo a committed transition.
//!
//! The machine does no internal locking: callers serialize transitions for a
//! job (see [`SharedStateMachine`]).

mod operations;

use std::sync::{Arc, Mutex};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::adapters::HookExecutor;
use crate::guards::GuardEngine;
use crate::hooks::{hooks_for, HookContext, HookSpec};
use crate::job_record::JobRecordStore;
use crate::workspace::{Workspace, WorkspaceError};
use penplot_journal::{
    GuardCheck, JobState, Journal, JournalEntry, JournalError, JournalRecord, JournalResult, Replay,
    StateTransition,
};

/// A state machine shared with the crash recovery registry
pub type SharedStateMachine = Arc<Mutex<StateMachine>>;

/// Errors creating a state machine
#[derive(Debug, Error)]
pub enum FsmError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("journal error: {0}")]
    Journal(#[from] JournalError),
}

/// Open the job's journal and replay it into a state machine.
/// A job without a journal starts at NEW.
pub fn create_state_machine(
    job_id: &str,
    workspace: &Workspace,
    guards: Arc<GuardEngine>,
) -> Result<StateMachine, FsmError> {
    Workspace::validate_job_id(job_id)?;
    let journal = Journal::open(workspace.journal_path(job_id), job_id)?;
    let replay = journal.replay()?;
    Ok(StateMachine::from_replay(
        journal,
        &replay,
        JobRecordStore::new(workspace.clone()),
        guards,
    ))
}

/// Lifecycle state of one job
pub struct StateMachine {
    job_id: String,
    current_state: JobState,
    transitions: Vec<StateTransition>,
    had_emergency_shutdown: bool,
    journal: Journal,
    guards: Arc<GuardEngine>,
    hook_executor: Option<Arc<dyn HookExecutor>>,
    hook_specs: Vec<HookSpec>,
    records: JobRecordStore,
    last_guard_checks: Vec<GuardCheck>,
}

impl StateMachine {
    /// Rebuild from a replayed journal
    pub fn from_replay(
        journal: Journal,
        replay: &Replay,
        records: JobRecordStore,
        guards: Arc<GuardEngine>,
    ) -> Self {
        Self {
            job_id: journal.job_id().to_string(),
            current_state: replay.state_or_new(),
            transitions: replay.transitions.clone(),
            had_emergency_shutdown: replay.had_emergency_shutdown,
            journal,
            guards,
            hook_executor: None,
            hook_specs: Vec::new(),
            records,
            last_guard_checks: Vec::new(),
        }
    }

    /// Run `specs` through `executor` after each committed transition
    pub fn with_hooks(mut self, executor: Arc<dyn HookExecutor>, specs: Vec<HookSpec>) -> Self {
        self.hook_executor = Some(executor);
        self.hook_specs = specs;
        self
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn current_state(&self) -> JobState {
        self.current_state
    }

    /// Committed transitions, oldest first
    pub fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    pub fn guards(&self) -> &GuardEngine {
        &self.guards
    }

    /// Guard results of the most recent gated attempt
    pub fn last_guard_checks(&self) -> &[GuardCheck] {
        &self.last_guard_checks
    }

    pub fn had_emergency_shutdown(&self) -> bool {
        self.had_emergency_shutdown
    }

    /// Not in a terminal state
    pub fn is_resumable(&self) -> bool {
        !self.current_state.is_terminal()
    }

    /// Request a transition. Returns `false` when the table or a guard
    /// refuses it, or when it could not be made durable; nothing changes then.
    pub fn transition_to(
        &mut self,
        target: JobState,
        reason: &str,
        metadata: Map<String, Value>,
    ) -> bool {
        let from = self.current_state;
        if !from.can_transition_to(target) {
            debug!(job_id = %self.job_id, from = %from, to = %target, "transition not in table");
            return false;
        }

        let mut evaluated = None;
        if target.is_risky() {
            let (allowed, checks) = self.guards.can_transition(&self.job_id, target);
            self.last_guard_checks = checks.clone();
            if !allowed {
                return false;
            }
            if !checks.is_empty() {
                evaluated = Some(checks);
            }
        }

        let entry = JournalEntry::state_change(self.job_id.clone(), from, target, reason, metadata);
        if let Err(err) = self.journal.append(&entry) {
            error!(job_id = %self.job_id, from = %from, to = %target, error = %err, "failed to journal transition");
            return false;
        }

        // Audit only; the transition is already committed
        if let Some(checks) = evaluated {
            let record = JournalRecord::GuardsEvaluated {
                target,
                allowed: true,
                checks,
            };
            if let Err(err) = self.journal.record(record) {
                warn!(job_id = %self.job_id, to = %target, error = %err, "failed to journal guard results");
            }
        }

        if let Some(transition) = entry.as_transition() {
            self.transitions.push(transition);
        }
        self.current_state = target;
        info!(job_id = %self.job_id, from = %from, to = %target, reason = %reason, "state transition");

        self.records.mirror_state(&self.job_id, target);
        self.run_hooks(from, target, reason);
        true
    }

    /// Append an `emergency_shutdown` marker holding the current state
    pub fn record_emergency_shutdown(&mut self, reason: &str) -> JournalResult<()> {
        self.journal.record(JournalRecord::EmergencyShutdown {
            state: self.current_state,
            reason: reason.to_string(),
        })?;
        self.had_emergency_shutdown = true;
        warn!(job_id = %self.job_id, state = %self.current_state, "emergency shutdown recorded");
        Ok(())
    }

    /// Append a `recovery` audit record
    pub fn record_recovery(&self, note: &str) -> JournalResult<()> {
        self.journal.record(JournalRecord::Recovery {
            state: self.current_state,
            note: note.to_string(),
        })?;
        Ok(())
    }

    /// Refresh the job record from the in-memory state
    pub fn sync_job_record(&self) -> bool {
        self.records.mirror_state(&self.job_id, self.current_state)
    }

    fn run_hooks(&self, from: JobState, to: JobState, reason: &str) {
        let Some(executor) = &self.hook_executor else {
            return;
        };
        let hooks = hooks_for(&self.hook_specs, to);
        if hooks.is_empty() {
            return;
        }

        let context = HookContext {
            job_id: self.job_id.clone(),
            from_state: from,
            to_state: to,
            reason: reason.to_string(),
        };
        let record = match executor.execute(&hooks, &context) {
            Ok(results) if results.is_empty() => return,
            Ok(results) => JournalRecord::HooksExecuted { state: to, results },
            Err(err) => {
                warn!(job_id = %self.job_id, state = %to, error = %err, "hook executor failed");
                JournalRecord::HooksError {
                    state: to,
                    error: err.to_string(),
                }
            }
        };
        if let Err(err) = self.journal.record(record) {
            warn!(job_id = %self.job_id, error = %err, "failed to journal hook results");
        }
    }
}
