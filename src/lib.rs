//! Penplot job lifecycle core
//!
//! Tracks a plot job from submission to completion, gates risky transitions
//! (arming the device, starting a plot) behind safety guards, and keeps a
//! per-job journal that survives crashes.
//!
//! - [`fsm`]: per-job state machine and lifecycle operations
//! - [`guards`]: guard engine and the standard guards
//! - [`recovery`]: journal-driven recovery and signal-driven crash protection
//! - [`adapters`]: device, camera, checklist and hook interfaces

pub mod adapters;
pub mod config;
pub mod fsm;
pub mod guards;
pub mod hooks;
pub mod job_record;
pub mod recovery;
pub mod workspace;

pub use fsm::{create_state_machine, FsmError, SharedStateMachine, StateMachine};
pub use guards::{Guard, GuardAdapters, GuardEngine, Severity};
pub use job_record::{JobRecord, JobRecordStore};
pub use recovery::{CrashRecoveryRegistry, RecoveryError, RecoveryManager};
pub use workspace::Workspace;

pub use penplot_journal::{
    GuardCheck, GuardResult, JobState, Journal, JournalEntry, JournalRecord, ParseStateError,
    StateTransition,
};
