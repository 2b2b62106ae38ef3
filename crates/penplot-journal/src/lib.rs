//! Penplot job journal
//!
//! Types shared by every part of the job lifecycle core, plus the per-job
//! append-only journal that is the authoritative record of what happened.
//!
//! - [`JobState`] and the static transition table
//! - [`JournalEntry`] records as written to `journal.jsonl`
//! - [`Journal`] with fsync durability, checksum framing and replay

pub mod entry;
pub mod error;
pub mod guard;
pub mod journal;
pub mod replay;
pub mod state;

pub use entry::{HookRun, JournalEntry, JournalRecord, StateTransition};
pub use error::{JournalError, JournalResult};
pub use guard::{GuardCheck, GuardResult};
pub use journal::{Journal, CHECKSUM_FIELD};
pub use replay::Replay;
pub use state::{JobState, ParseStateError};

/// File name of a job journal inside its job directory.
pub const JOURNAL_FILE_NAME: &str = "journal.jsonl";
