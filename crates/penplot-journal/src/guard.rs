//! Guard check results recorded in the journal

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Outcome of a single guard evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardResult {
    Pass,
    /// Blocks the transition
    Fail,
    /// Reported but never blocks
    SoftFail,
    /// Guard could not run (not configured)
    Skipped,
}

impl GuardResult {
    /// Only a hard failure denies a transition
    pub fn is_blocking(&self) -> bool {
        matches!(self, GuardResult::Fail)
    }
}

impl fmt::Display for GuardResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardResult::Pass => write!(f, "PASS"),
            GuardResult::Fail => write!(f, "FAIL"),
            GuardResult::SoftFail => write!(f, "SOFT_FAIL"),
            GuardResult::Skipped => write!(f, "SKIPPED"),
        }
    }
}

/// Result of one guard evaluation. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardCheck {
    /// Guard name (e.g. "device_idle")
    pub name: String,
    pub result: GuardResult,
    /// Single-line human-readable explanation
    pub message: String,
    /// Machine-readable details (counts, adapter errors)
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl GuardCheck {
    pub fn new(name: impl Into<String>, result: GuardResult, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            result,
            message: message.into(),
            details: Map::new(),
        }
    }

    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, GuardResult::Pass, message)
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, GuardResult::Fail, message)
    }

    pub fn soft_fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, GuardResult::SoftFail, message)
    }

    pub fn skipped(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, GuardResult::Skipped, message)
    }

    /// Attach a detail value
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}
