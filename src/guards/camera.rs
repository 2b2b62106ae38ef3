//! camera-health guard

use std::sync::Arc;

use super::{Guard, CAMERA_HEALTH};
use crate::adapters::{AdapterResult, CameraAdapter};
use penplot_journal::GuardCheck;

/// Reports whether the camera watching the plot is reachable. Advisory.
pub struct CameraHealthGuard {
    camera: Option<Arc<dyn CameraAdapter>>,
}

impl CameraHealthGuard {
    pub fn new(camera: Option<Arc<dyn CameraAdapter>>) -> Self {
        Self { camera }
    }
}

impl Guard for CameraHealthGuard {
    fn name(&self) -> &'static str {
        CAMERA_HEALTH
    }

    fn check(&self, _job_id: &str) -> AdapterResult<GuardCheck> {
        let Some(camera) = &self.camera else {
            return Ok(GuardCheck::skipped(CAMERA_HEALTH, "no camera configured"));
        };

        let probe = camera.probe()?;
        if probe.accessible {
            return Ok(GuardCheck::pass(CAMERA_HEALTH, "camera stream reachable"));
        }
        let error = probe.error.unwrap_or_else(|| "not accessible".to_string());
        Ok(GuardCheck::soft_fail(CAMERA_HEALTH, format!("camera: {}", error)).with_detail("error", error))
    }
}
