//! device-idle guard

use std::sync::Arc;

use super::{Guard, DEVICE_IDLE};
use crate::adapters::{AdapterError, AdapterResult, DeviceAdapter};
use penplot_journal::GuardCheck;

/// Passes when a plotter is connected and not busy
pub struct DeviceIdleGuard {
    device: Option<Arc<dyn DeviceAdapter>>,
}

impl DeviceIdleGuard {
    pub fn new(device: Option<Arc<dyn DeviceAdapter>>) -> Self {
        Self { device }
    }
}

impl Guard for DeviceIdleGuard {
    fn name(&self) -> &'static str {
        DEVICE_IDLE
    }

    fn check(&self, _job_id: &str) -> AdapterResult<GuardCheck> {
        let Some(device) = &self.device else {
            return Ok(GuardCheck::skipped(DEVICE_IDLE, "no device adapter configured"));
        };

        let list = device.list_devices()?;
        if let Some(error) = list.error {
            return Err(AdapterError::Unavailable(error));
        }
        if list.devices.is_empty() {
            return Ok(GuardCheck::fail(DEVICE_IDLE, "no plotter connected"));
        }

        let status = device.get_status()?;
        if !status.available {
            let error = status.error.unwrap_or_else(|| "device busy".to_string());
            return Ok(GuardCheck::fail(DEVICE_IDLE, format!("device not available: {}", error))
                .with_detail("error", error));
        }

        Ok(GuardCheck::pass(DEVICE_IDLE, "device idle")
            .with_detail("devices", list.devices.len()))
    }
}
