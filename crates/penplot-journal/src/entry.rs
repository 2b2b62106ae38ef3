//! Journal records
//!
//! Every line of `journal.jsonl` is one [`JournalEntry`]: the common
//! `job_id`/`timestamp` envelope plus a record tagged by `type`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::guard::GuardCheck;
use crate::state::JobState;

/// A committed state change. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateTransition {
    pub from_state: JobState,
    pub to_state: JobState,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Outcome of one hook run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookRun {
    /// Hook identifier (usually its command line)
    pub hook: String,
    pub success: bool,
    /// Captured output, truncated by the executor
    #[serde(default)]
    pub output: String,
}

/// Record payload, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JournalRecord {
    StateChange {
        from_state: JobState,
        to_state: JobState,
        reason: String,
        #[serde(default)]
        metadata: Map<String, Value>,
    },
    HooksExecuted {
        state: JobState,
        results: Vec<HookRun>,
    },
    GuardsEvaluated {
        target: JobState,
        allowed: bool,
        checks: Vec<GuardCheck>,
    },
    HooksError {
        state: JobState,
        error: String,
    },
    EmergencyShutdown {
        /// State snapshot at the time of shutdown
        state: JobState,
        reason: String,
    },
    Recovery {
        state: JobState,
        note: String,
    },
}

impl JournalRecord {
    /// Value of the `type` tag
    pub fn kind(&self) -> &'static str {
        match self {
            JournalRecord::StateChange { .. } => "state_change",
            JournalRecord::HooksExecuted { .. } => "hooks_executed",
            JournalRecord::GuardsEvaluated { .. } => "guards_evaluated",
            JournalRecord::HooksError { .. } => "hooks_error",
            JournalRecord::EmergencyShutdown { .. } => "emergency_shutdown",
            JournalRecord::Recovery { .. } => "recovery",
        }
    }

    /// State this record sets during replay, if any
    pub fn determined_state(&self) -> Option<JobState> {
        match self {
            JournalRecord::StateChange { to_state, .. } => Some(*to_state),
            JournalRecord::EmergencyShutdown { state, .. } => Some(*state),
            _ => None,
        }
    }
}

/// One journal line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub job_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub record: JournalRecord,
}

impl JournalEntry {
    /// Create an entry stamped with the current UTC time
    pub fn new(job_id: impl Into<String>, record: JournalRecord) -> Self {
        Self {
            job_id: job_id.into(),
            timestamp: Utc::now(),
            record,
        }
    }

    pub fn state_change(
        job_id: impl Into<String>,
        from_state: JobState,
        to_state: JobState,
        reason: impl Into<String>,
        metadata: Map<String, Value>,
    ) -> Self {
        Self::new(
            job_id,
            JournalRecord::StateChange {
                from_state,
                to_state,
                reason: reason.into(),
                metadata,
            },
        )
    }

    pub fn emergency_shutdown(job_id: impl Into<String>, state: JobState, reason: impl Into<String>) -> Self {
        Self::new(
            job_id,
            JournalRecord::EmergencyShutdown {
                state,
                reason: reason.into(),
            },
        )
    }

    pub fn recovery(job_id: impl Into<String>, state: JobState, note: impl Into<String>) -> Self {
        Self::new(
            job_id,
            JournalRecord::Recovery {
                state,
                note: note.into(),
            },
        )
    }

    /// The transition carried by a `state_change` record
    pub fn as_transition(&self) -> Option<StateTransition> {
        match &self.record {
            JournalRecord::StateChange {
                from_state,
                to_state,
                reason,
                metadata,
            } => Some(StateTransition {
                from_state: *from_state,
                to_state: *to_state,
                timestamp: self.timestamp,
                reason: reason.clone(),
                metadata: metadata.clone(),
            }),
            _ => None,
        }
    }

    pub fn is_state_change(&self) -> bool {
        matches!(self.record, JournalRecord::StateChange { .. })
    }

    pub fn is_emergency_shutdown(&self) -> bool {
        matches!(self.record, JournalRecord::EmergencyShutdown { .. })
    }
}
