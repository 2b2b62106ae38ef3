//! Journal replay
//!
//! Records are applied in file order. A `state_change` sets the state to its
//! `to_state`, an `emergency_shutdown` sets it to its own snapshot. Every other
//! record is kept for audit only. Each state-determining record fully
//! overwrites the previous state, so replay is idempotent.

use crate::entry::{JournalEntry, StateTransition};
use crate::state::JobState;

/// State reconstructed from a journal
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Replay {
    /// Valid records in file order
    pub entries: Vec<JournalEntry>,
    /// State after the last state-determining record (None if there is none)
    pub current_state: Option<JobState>,
    /// Every committed transition in order
    pub transitions: Vec<StateTransition>,
    /// An emergency shutdown record was seen anywhere in the journal
    pub had_emergency_shutdown: bool,
    /// Corrupt records that were skipped
    pub skipped: usize,
    /// The final line was an incomplete write
    pub torn_tail: bool,
}

impl Replay {
    /// Apply records in order
    pub fn from_entries(entries: Vec<JournalEntry>) -> Self {
        let mut replay = Replay::default();
        for entry in entries {
            replay.apply(entry);
        }
        replay
    }

    /// Apply one record
    pub fn apply(&mut self, entry: JournalEntry) {
        if let Some(transition) = entry.as_transition() {
            self.transitions.push(transition);
        }
        if entry.is_emergency_shutdown() {
            self.had_emergency_shutdown = true;
        }
        if let Some(state) = entry.record.determined_state() {
            self.current_state = Some(state);
        }
        self.entries.push(entry);
    }

    /// State to seed a state machine with (NEW when nothing was committed)
    pub fn state_or_new(&self) -> JobState {
        self.current_state.unwrap_or(JobState::New)
    }

    pub fn last_entry(&self) -> Option<&JournalEntry> {
        self.entries.last()
    }

    /// The journal ends in an emergency shutdown marker
    pub fn ends_with_emergency_shutdown(&self) -> bool {
        self.last_entry().is_some_and(JournalEntry::is_emergency_shutdown)
    }

    /// Last committed state is known and not terminal
    pub fn is_resumable(&self) -> bool {
        self.current_state.is_some_and(|state| !state.is_terminal())
    }

    /// Index of the last record that determines state
    pub fn last_state_record_index(&self) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|entry| entry.record.determined_state().is_some())
    }
}
