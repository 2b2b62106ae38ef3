//! Crash protection for running jobs
//!
//! The process entry point builds one [`CrashRecoveryRegistry`], calls
//! [`start`](CrashRecoveryRegistry::start) and hands clones to whatever drives
//! state machines. On SIGINT/SIGTERM every registered job in ARMED or PLOTTING
//! gets an `emergency_shutdown` record and is aborted before the process
//! exits with [`EXIT_CODE_SIGNAL`].
//!
//! A second signal exits immediately; later signals are ignored.

use std::collections::BTreeMap;
use std::process;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, info, warn};

use super::RecoveryError;
use crate::fsm::SharedStateMachine;

/// Exit code after a termination signal (128 + SIGINT)
pub const EXIT_CODE_SIGNAL: i32 = 130;

/// Abort reason used for jobs stopped by a signal
pub const EMERGENCY_ABORT_REASON: &str = "Emergency shutdown";

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: shut down registered jobs, then exit
    Shutdown,
    /// Second signal, or registry not running: exit now
    ImmediateExit,
    /// Third+ signal: ignore
    Ignore,
}

#[derive(Default)]
struct RegistryState {
    machines: Mutex<BTreeMap<String, SharedStateMachine>>,
    active: AtomicBool,
    installed: AtomicBool,
    signal_count: AtomicU8,
}

/// State machines to protect on process termination
#[derive(Clone, Default)]
pub struct CrashRecoveryRegistry {
    state: Arc<RegistryState>,
}

impl CrashRecoveryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm crash protection. The OS handler is installed on first start;
    /// later calls only re-arm it.
    pub fn start(&self) -> Result<(), RecoveryError> {
        self.state.active.store(true, Ordering::SeqCst);
        if self.state.installed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let registry = self.clone();
        if let Err(err) = ctrlc::set_handler(move || registry.on_signal()) {
            self.state.installed.store(false, Ordering::SeqCst);
            self.state.active.store(false, Ordering::SeqCst);
            return Err(RecoveryError::Signal(err.to_string()));
        }
        info!("crash protection started");
        Ok(())
    }

    /// Disarm crash protection. A signal then exits without touching journals.
    pub fn stop(&self) {
        self.state.active.store(false, Ordering::SeqCst);
    }

    pub fn is_active(&self) -> bool {
        self.state.active.load(Ordering::SeqCst)
    }

    pub fn signal_count(&self) -> u8 {
        self.state.signal_count.load(Ordering::SeqCst)
    }

    /// Protect a machine; replaces any earlier registration for the same job
    pub fn register(&self, machine: SharedStateMachine) {
        let job_id = machine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .job_id()
            .to_string();
        self.machines().insert(job_id, machine);
    }

    pub fn unregister(&self, job_id: &str) -> Option<SharedStateMachine> {
        self.machines().remove(job_id)
    }

    /// Registered job ids, sorted
    pub fn registered_jobs(&self) -> Vec<String> {
        self.machines().keys().cloned().collect()
    }

    /// Count a signal and decide what to do about it
    pub fn handle_signal(&self) -> SignalAction {
        if !self.is_active() {
            return SignalAction::ImmediateExit;
        }
        match self.state.signal_count.fetch_add(1, Ordering::SeqCst) {
            0 => SignalAction::Shutdown,
            1 => SignalAction::ImmediateExit,
            _ => SignalAction::Ignore,
        }
    }

    /// Record an emergency shutdown and abort every registered job that is
    /// ARMED or PLOTTING. Returns the ids of the jobs that were stopped.
    pub fn emergency_shutdown(&self, reason: &str) -> Vec<String> {
        let machines: Vec<SharedStateMachine> = self.machines().values().cloned().collect();
        let mut stopped = Vec::new();

        for machine in machines {
            // A panic mid-transition must not stop the shutdown of the device
            let mut sm = machine.lock().unwrap_or_else(PoisonError::into_inner);
            if !sm.current_state().is_risky() {
                continue;
            }

            let job_id = sm.job_id().to_string();
            if let Err(err) = sm.record_emergency_shutdown(reason) {
                error!(job_id = %job_id, error = %err, "failed to journal emergency shutdown");
            }
            if sm.abort_job(EMERGENCY_ABORT_REASON) {
                warn!(job_id = %job_id, "job aborted by emergency shutdown");
            } else {
                error!(job_id = %job_id, state = %sm.current_state(), "emergency abort failed");
            }
            stopped.push(job_id);
        }
        stopped
    }

    fn on_signal(&self) {
        match self.handle_signal() {
            SignalAction::Shutdown => {
                warn!("termination signal received, shutting down jobs");
                self.emergency_shutdown("Termination signal received");
                process::exit(EXIT_CODE_SIGNAL);
            }
            SignalAction::ImmediateExit => process::exit(EXIT_CODE_SIGNAL),
            SignalAction::Ignore => {}
        }
    }

    fn machines(&self) -> MutexGuard<'_, BTreeMap<String, SharedStateMachine>> {
        self.state.machines.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_counting() {
        let registry = CrashRecoveryRegistry::new();
        assert_eq!(registry.handle_signal(), SignalAction::ImmediateExit);
        assert_eq!(registry.signal_count(), 0);

        // Arm without installing an OS handler
        registry.state.active.store(true, Ordering::SeqCst);
        assert_eq!(registry.handle_signal(), SignalAction::Shutdown);
        assert_eq!(registry.handle_signal(), SignalAction::ImmediateExit);
        assert_eq!(registry.handle_signal(), SignalAction::Ignore);
        assert_eq!(registry.signal_count(), 3);

        registry.stop();
        assert!(!registry.is_active());
        assert_eq!(registry.handle_signal(), SignalAction::ImmediateExit);
    }

    #[test]
    fn test_clones_share_registrations() {
        let registry = CrashRecoveryRegistry::new();
        let clone = registry.clone();
        assert!(clone.registered_jobs().is_empty());
        assert!(registry.unregister("missing").is_none());
        assert!(clone.emergency_shutdown("test").is_empty());
    }
}
