//! Job lifecycle states
//!
//! NEW → QUEUED → ANALYZED → OPTIMIZED → READY → ARMED → PLOTTING → COMPLETED
//! with PAUSED as a detour from PLOTTING and ABORTED/FAILED exits along the way.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle state of a fabrication job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobState {
    /// Job exists but has not been submitted
    New,
    /// Waiting for analysis
    Queued,
    /// Source artwork analyzed
    Analyzed,
    /// Layers optimized into pen-assigned output
    Optimized,
    /// Output ready for plotting
    Ready,
    /// Device armed, motors may move
    Armed,
    /// Device is drawing
    Plotting,
    /// Plot paused mid-job
    Paused,
    /// Plot finished
    Completed,
    /// Plot stopped by operator or shutdown
    Aborted,
    /// Job failed
    Failed,
}

impl JobState {
    /// Every state, in lifecycle order
    pub const ALL: [JobState; 11] = [
        JobState::New,
        JobState::Queued,
        JobState::Analyzed,
        JobState::Optimized,
        JobState::Ready,
        JobState::Armed,
        JobState::Plotting,
        JobState::Paused,
        JobState::Completed,
        JobState::Aborted,
        JobState::Failed,
    ];

    /// States reachable from this one in a single transition
    pub fn allowed_targets(&self) -> &'static [JobState] {
        use JobState::*;
        match self {
            New => &[Queued],
            Queued => &[Analyzed, Aborted],
            Analyzed => &[Optimized, Failed],
            Optimized => &[Ready, Failed],
            Ready => &[Armed, Aborted],
            Armed => &[Plotting, Aborted],
            Plotting => &[Paused, Completed, Aborted, Failed],
            Paused => &[Plotting, Aborted],
            Completed | Aborted | Failed => &[],
        }
    }

    /// Check if transition from this state to target is in the static table
    pub fn can_transition_to(&self, target: JobState) -> bool {
        self.allowed_targets().contains(&target)
    }

    /// Terminal states have no outgoing transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Aborted | JobState::Failed)
    }

    /// States in which the device may move and must be shut down on exit
    pub fn is_risky(&self) -> bool {
        matches!(self, JobState::Armed | JobState::Plotting)
    }

    /// Wire name (SCREAMING_SNAKE_CASE)
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::New => "NEW",
            JobState::Queued => "QUEUED",
            JobState::Analyzed => "ANALYZED",
            JobState::Optimized => "OPTIMIZED",
            JobState::Ready => "READY",
            JobState::Armed => "ARMED",
            JobState::Plotting => "PLOTTING",
            JobState::Paused => "PAUSED",
            JobState::Completed => "COMPLETED",
            JobState::Aborted => "ABORTED",
            JobState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown state name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown job state: {0}")]
pub struct ParseStateError(pub String);

impl FromStr for JobState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        JobState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str() == upper)
            .ok_or_else(|| ParseStateError(s.to_string()))
    }
}
