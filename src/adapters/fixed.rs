//! Static adapters for tests
//!
//! Each adapter returns a canned answer, optionally after a delay, so guard
//! timeouts and adapter failures can be exercised without hardware.

use std::thread;
use std::time::Duration;

use serde_json::json;

use super::{
    AdapterError, AdapterResult, CameraAdapter, CameraProbe, ChecklistProgress, ChecklistProvider,
    DeviceAdapter, DeviceList, DeviceStatus,
};

fn canned<T: Clone>(answer: &Result<T, String>, delay: Option<Duration>) -> AdapterResult<T> {
    if let Some(delay) = delay {
        thread::sleep(delay);
    }
    answer.clone().map_err(AdapterError::Unavailable)
}

/// Device adapter with fixed status and device list
#[derive(Debug, Clone)]
pub struct StaticDeviceAdapter {
    status: Result<DeviceStatus, String>,
    devices: Result<DeviceList, String>,
    delay: Option<Duration>,
}

impl StaticDeviceAdapter {
    /// One connected plotter, ready to go
    pub fn idle() -> Self {
        Self {
            status: Ok(DeviceStatus::idle()),
            devices: Ok(DeviceList {
                devices: vec![json!({"name": "plotter-0"})],
                error: None,
            }),
            delay: None,
        }
    }

    /// Connected but in use
    pub fn busy(reason: impl Into<String>) -> Self {
        Self {
            status: Ok(DeviceStatus::busy(reason)),
            ..Self::idle()
        }
    }

    /// Nothing plugged in
    pub fn disconnected() -> Self {
        Self {
            devices: Ok(DeviceList {
                devices: Vec::new(),
                error: None,
            }),
            ..Self::idle()
        }
    }

    /// Driver errors on every call
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: Err(message.clone()),
            devices: Err(message),
            delay: None,
        }
    }

    /// Sleep before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl DeviceAdapter for StaticDeviceAdapter {
    fn get_status(&self) -> AdapterResult<DeviceStatus> {
        canned(&self.status, self.delay)
    }

    fn list_devices(&self) -> AdapterResult<DeviceList> {
        canned(&self.devices, self.delay)
    }
}

#[derive(Debug, Clone)]
pub struct StaticCameraAdapter {
    probe: Result<CameraProbe, String>,
    delay: Option<Duration>,
}

impl StaticCameraAdapter {
    pub fn accessible() -> Self {
        Self {
            probe: Ok(CameraProbe {
                accessible: true,
                error: None,
            }),
            delay: None,
        }
    }

    pub fn inaccessible(error: impl Into<String>) -> Self {
        Self {
            probe: Ok(CameraProbe {
                accessible: false,
                error: Some(error.into()),
            }),
            delay: None,
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            probe: Err(message.into()),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl CameraAdapter for StaticCameraAdapter {
    fn probe(&self) -> AdapterResult<CameraProbe> {
        canned(&self.probe, self.delay)
    }
}

/// Same progress for every job
#[derive(Debug, Clone)]
pub struct StaticChecklistProvider {
    progress: Result<ChecklistProgress, String>,
}

impl StaticChecklistProvider {
    pub fn new(required_completed: u32, required_total: u32) -> Self {
        Self {
            progress: Ok(ChecklistProgress {
                required_completed,
                required_total,
            }),
        }
    }

    pub fn complete() -> Self {
        Self::new(3, 3)
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            progress: Err(message.into()),
        }
    }
}

impl ChecklistProvider for StaticChecklistProvider {
    fn get_progress(&self, _job_id: &str) -> AdapterResult<ChecklistProgress> {
        canned(&self.progress, None)
    }
}
