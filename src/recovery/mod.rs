//! Crash recovery
//!
//! A crash is never an error value: it is read off the journal afterwards.
//! A job whose last state-determining record leaves it in a non-terminal
//! state is resumable, whether or not an emergency marker made it to disk.

mod registry;

pub use registry::{CrashRecoveryRegistry, SignalAction, EMERGENCY_ABORT_REASON, EXIT_CODE_SIGNAL};

use std::fs;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tracing::{info, warn};

use crate::adapters::HookExecutor;
use crate::fsm::{SharedStateMachine, StateMachine};
use crate::guards::GuardEngine;
use crate::hooks::HookSpec;
use crate::job_record::JobRecordStore;
use crate::workspace::{Workspace, WorkspaceError};
use penplot_journal::journal::replay_bytes;
use penplot_journal::{Journal, JournalError, Replay};

/// Note attached to the `recovery` record written after an emergency shutdown
pub const EMERGENCY_DETECTED_NOTE: &str =
    "emergency shutdown detected; waiting for operator decision";

/// Errors from recovery operations
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("failed to install signal handler: {0}")]
    Signal(String),
}

/// Rebuilds state machines from journals
pub struct RecoveryManager {
    workspace: Workspace,
    guards: Arc<GuardEngine>,
    hooks: Option<(Arc<dyn HookExecutor>, Vec<HookSpec>)>,
}

impl RecoveryManager {
    pub fn new(workspace: Workspace, guards: Arc<GuardEngine>) -> Self {
        Self {
            workspace,
            guards,
            hooks: None,
        }
    }

    /// Recovered machines run these hooks on later transitions
    pub fn with_hooks(mut self, executor: Arc<dyn HookExecutor>, specs: Vec<HookSpec>) -> Self {
        self.hooks = Some((executor, specs));
        self
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Replay a job's journal without modifying it.
    ///
    /// `Ok(None)` when there is no journal; unrecoverable journals are an error.
    pub fn inspect(&self, job_id: &str) -> Result<Option<Replay>, RecoveryError> {
        Workspace::validate_job_id(job_id)?;
        let path = self.workspace.journal_path(job_id);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(JournalError::from)?;
        Ok(Some(replay_bytes(&path, &bytes)?))
    }

    /// Ids of jobs whose journal ends in a non-terminal state, sorted
    pub fn get_resumable_jobs(&self) -> Result<Vec<String>, RecoveryError> {
        let mut resumable = Vec::new();
        for job_id in self.workspace.journaled_job_ids()? {
            match self.inspect(&job_id) {
                Ok(Some(replay)) if replay.is_resumable() => resumable.push(job_id),
                Ok(_) => {}
                Err(RecoveryError::Journal(err @ JournalError::Unrecoverable { .. })) => {
                    warn!(job_id = %job_id, error = %err, "job state unknown, not resumable");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(resumable)
    }

    /// Rebuild the state machine for a job.
    ///
    /// `Ok(None)` when the job has no journal or the journal is unrecoverable.
    /// A journal that ends in an emergency shutdown gets a `recovery` record;
    /// the job stays where it was until the caller decides what to do.
    pub fn recover_job(&self, job_id: &str) -> Result<Option<StateMachine>, RecoveryError> {
        Workspace::validate_job_id(job_id)?;
        let path = self.workspace.journal_path(job_id);
        if !path.exists() {
            return Ok(None);
        }

        let journal = Journal::open(path, job_id)?;
        let replay = match journal.replay() {
            Ok(replay) => replay,
            Err(err @ JournalError::Unrecoverable { .. }) => {
                warn!(job_id = %job_id, error = %err, "cannot recover job");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let mut machine = StateMachine::from_replay(
            journal,
            &replay,
            JobRecordStore::new(self.workspace.clone()),
            Arc::clone(&self.guards),
        );
        if let Some((executor, specs)) = &self.hooks {
            machine = machine.with_hooks(Arc::clone(executor), specs.clone());
        }

        if replay.ends_with_emergency_shutdown() {
            machine.record_recovery(EMERGENCY_DETECTED_NOTE)?;
            warn!(
                job_id = %job_id,
                state = %machine.current_state(),
                "job was interrupted by an emergency shutdown"
            );
        }
        machine.sync_job_record();

        info!(
            job_id = %job_id,
            state = %machine.current_state(),
            transitions = machine.transitions().len(),
            skipped = replay.skipped,
            "job recovered"
        );
        Ok(Some(machine))
    }

    /// Recover every resumable job and register it for crash protection
    pub fn recover_all_jobs(
        &self,
        registry: &CrashRecoveryRegistry,
    ) -> Result<Vec<SharedStateMachine>, RecoveryError> {
        let mut recovered = Vec::new();
        for job_id in self.get_resumable_jobs()? {
            let Some(machine) = self.recover_job(&job_id)? else {
                continue;
            };
            let shared = Arc::new(Mutex::new(machine));
            registry.register(Arc::clone(&shared));
            recovered.push(shared);
        }
        Ok(recovered)
    }

    /// Bounded journal cleanup; see [`Journal::cleanup`]
    pub fn cleanup_journal(&self, job_id: &str, keep_entries: usize) -> Result<bool, RecoveryError> {
        Workspace::validate_job_id(job_id)?;
        let path = self.workspace.journal_path(job_id);
        if !path.exists() {
            return Ok(false);
        }
        Ok(Journal::open(path, job_id)?.cleanup(keep_entries)?)
    }
}
