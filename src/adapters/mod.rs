//! External collaborator interfaces
//!
//! The lifecycle core never talks to hardware directly. Guards and hooks go
//! through these traits, which return explicit results instead of panicking
//! or blocking: every call made on behalf of a guard is bounded by
//! [`call_with_timeout`].

mod command;
#[doc(hidden)]
pub mod fixed;
mod timeout;

pub use command::{
    run_command, CommandCameraAdapter, CommandDeviceAdapter, CommandOutput, FileChecklistProvider,
};
pub use timeout::call_with_timeout;

use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::hooks::{HookContext, HookSpec};
use penplot_journal::HookRun;

/// Result type for adapter calls
pub type AdapterResult<T> = Result<T, AdapterError>;

/// Adapter failures. Guards downgrade all of these to SOFT_FAIL.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("command failed: {0}")]
    Command(String),

    #[error("invalid adapter output: {0}")]
    InvalidOutput(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Device availability as reported by the driver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceStatus {
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DeviceStatus {
    pub fn idle() -> Self {
        Self {
            available: true,
            error: None,
        }
    }

    pub fn busy(error: impl Into<String>) -> Self {
        Self {
            available: false,
            error: Some(error.into()),
        }
    }
}

/// Connected devices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceList {
    #[serde(default)]
    pub devices: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Camera stream reachability
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CameraProbe {
    pub accessible: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Pre-flight checklist progress for a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistProgress {
    pub required_completed: u32,
    pub required_total: u32,
}

impl ChecklistProgress {
    pub fn is_complete(&self) -> bool {
        self.required_completed >= self.required_total
    }
}

/// Plotter driver
pub trait DeviceAdapter: Send + Sync {
    fn get_status(&self) -> AdapterResult<DeviceStatus>;

    fn list_devices(&self) -> AdapterResult<DeviceList>;
}

/// Camera watching the plot
pub trait CameraAdapter: Send + Sync {
    fn probe(&self) -> AdapterResult<CameraProbe>;
}

/// Source of per-job checklist progress
pub trait ChecklistProvider: Send + Sync {
    fn get_progress(&self, job_id: &str) -> AdapterResult<ChecklistProgress>;
}

/// Runs user-defined hooks after a committed transition. Best-effort.
pub trait HookExecutor: Send + Sync {
    fn execute(&self, hooks: &[HookSpec], context: &HookContext) -> AdapterResult<Vec<HookRun>>;
}
