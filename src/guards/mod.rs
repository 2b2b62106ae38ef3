//! Safety guards for risky transitions
//!
//! A guard answers one question about a job ("is the device idle?") with a
//! [`GuardCheck`]. The [`GuardEngine`] decides which guards apply to a target
//! state and whether their combined results allow the transition.
//!
//! Guards return adapter failures as `Err`; the engine turns those (and
//! timeouts) into SOFT_FAIL so a broken adapter never blocks or crashes a
//! transition.

mod camera;
mod checklist;
mod device;
mod engine;
mod records;

pub use camera::CameraHealthGuard;
pub use checklist::ChecklistCompleteGuard;
pub use device::DeviceIdleGuard;
pub use engine::{GuardEngine, PolicyEntry, Severity};
pub use records::{PaperSessionGuard, PenLayerGuard};

use std::sync::Arc;

use crate::adapters::{
    AdapterResult, CameraAdapter, ChecklistProvider, CommandCameraAdapter, CommandDeviceAdapter,
    DeviceAdapter, FileChecklistProvider,
};
use crate::config::CoreConfig;
use crate::job_record::JobRecordStore;
use crate::workspace::Workspace;
pub use penplot_journal::{GuardCheck, GuardResult};

pub const DEVICE_IDLE: &str = "device_idle";
pub const CHECKLIST_COMPLETE: &str = "checklist_complete";
pub const CAMERA_HEALTH: &str = "camera_health";
pub const PAPER_SESSION_VALID: &str = "paper_session_valid";
pub const PEN_LAYER_COMPATIBLE: &str = "pen_layer_compatible";

/// An independent safety check
pub trait Guard: Send + Sync {
    /// Stable name used in policies and journal records
    fn name(&self) -> &'static str;

    /// Evaluate the guard for a job. Adapter failures are returned as `Err`.
    fn check(&self, job_id: &str) -> AdapterResult<GuardCheck>;
}

/// Collaborators the standard guards consult. `None` means not configured,
/// and the guard reports SKIPPED.
#[derive(Clone, Default)]
pub struct GuardAdapters {
    pub device: Option<Arc<dyn DeviceAdapter>>,
    pub camera: Option<Arc<dyn CameraAdapter>>,
    pub checklist: Option<Arc<dyn ChecklistProvider>>,
    pub job_records: Option<JobRecordStore>,
}

impl GuardAdapters {
    /// Command-backed adapters from configuration
    pub fn from_config(config: &CoreConfig, workspace: &Workspace) -> Self {
        let timeout = config.guard_timeout();

        let device: Option<Arc<dyn DeviceAdapter>> = config.device.is_configured().then(|| {
            Arc::new(CommandDeviceAdapter::new(
                config.device.status_command.clone(),
                config.device.list_command.clone(),
                timeout,
            )) as Arc<dyn DeviceAdapter>
        });
        let camera: Option<Arc<dyn CameraAdapter>> = config.camera.is_configured().then(|| {
            Arc::new(CommandCameraAdapter::new(
                config.camera.probe_command.clone(),
                timeout,
            )) as Arc<dyn CameraAdapter>
        });

        Self {
            device,
            camera,
            checklist: Some(Arc::new(FileChecklistProvider::new(
                workspace.clone(),
                config.checklist.file.clone(),
            ))),
            job_records: Some(JobRecordStore::new(workspace.clone())),
        }
    }
}
