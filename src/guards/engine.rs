//! Guard registry and per-target policy

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{
    CameraHealthGuard, ChecklistCompleteGuard, DeviceIdleGuard, Guard, GuardAdapters,
    PaperSessionGuard, PenLayerGuard, CAMERA_HEALTH, CHECKLIST_COMPLETE, DEVICE_IDLE,
    PAPER_SESSION_VALID, PEN_LAYER_COMPATIBLE,
};
use crate::adapters::{call_with_timeout, AdapterError};
use crate::config::GuardConfig;
use penplot_journal::{GuardCheck, GuardResult, JobState};

/// Default bound on a single guard evaluation
pub const DEFAULT_GUARD_TIMEOUT: Duration = Duration::from_secs(5);

/// How a guard's FAIL is treated for a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// FAIL denies the transition
    Hard,
    /// FAIL is reported as SOFT_FAIL
    Soft,
}

/// One applicable guard for a target state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyEntry {
    pub guard: &'static str,
    pub severity: Severity,
}

/// Evaluates guards for gated transitions
pub struct GuardEngine {
    guards: BTreeMap<&'static str, Arc<dyn Guard>>,
    policies: BTreeMap<JobState, Vec<PolicyEntry>>,
    timeout: Duration,
}

impl GuardEngine {
    /// Engine with no guards and no policy: every transition is allowed
    pub fn new(timeout: Duration) -> Self {
        Self {
            guards: BTreeMap::new(),
            policies: BTreeMap::new(),
            timeout,
        }
    }

    /// The five standard guards with the standard policy:
    ///
    /// - ARMED: device_idle, checklist_complete, and optionally
    ///   paper_session_valid / pen_layer_compatible (all hard)
    /// - PLOTTING: device_idle (hard), camera_health (soft)
    pub fn standard(adapters: GuardAdapters, options: &GuardConfig) -> Self {
        let mut engine = Self::new(Duration::from_secs(options.timeout_seconds));
        engine.register(Arc::new(DeviceIdleGuard::new(adapters.device)));
        engine.register(Arc::new(ChecklistCompleteGuard::new(adapters.checklist)));
        engine.register(Arc::new(CameraHealthGuard::new(adapters.camera)));
        engine.register(Arc::new(PaperSessionGuard::new(adapters.job_records.clone())));
        engine.register(Arc::new(PenLayerGuard::new(adapters.job_records)));

        engine.require(JobState::Armed, DEVICE_IDLE, Severity::Hard);
        engine.require(JobState::Armed, CHECKLIST_COMPLETE, Severity::Hard);
        if options.paper_session {
            engine.require(JobState::Armed, PAPER_SESSION_VALID, Severity::Hard);
        }
        if options.pen_layers {
            engine.require(JobState::Armed, PEN_LAYER_COMPATIBLE, Severity::Hard);
        }
        engine.require(JobState::Plotting, DEVICE_IDLE, Severity::Hard);
        engine.require(JobState::Plotting, CAMERA_HEALTH, Severity::Soft);
        engine
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Add or replace a guard by name
    pub fn register(&mut self, guard: Arc<dyn Guard>) {
        self.guards.insert(guard.name(), guard);
    }

    /// Make a guard applicable to transitions into `target`
    pub fn require(&mut self, target: JobState, guard: &'static str, severity: Severity) {
        let entries = self.policies.entry(target).or_default();
        entries.retain(|entry| entry.guard != guard);
        entries.push(PolicyEntry { guard, severity });
    }

    /// Guards applicable to `target`, in evaluation order
    pub fn applicable(&self, target: JobState) -> &[PolicyEntry] {
        self.policies.get(&target).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether any guard applies to `target`
    pub fn is_gated(&self, target: JobState) -> bool {
        !self.applicable(target).is_empty()
    }

    /// Evaluate every applicable guard. Allowed iff no result is FAIL.
    pub fn can_transition(&self, job_id: &str, target: JobState) -> (bool, Vec<GuardCheck>) {
        let checks: Vec<GuardCheck> = self
            .applicable(target)
            .iter()
            .map(|entry| self.evaluate(job_id, entry))
            .collect();

        let allowed = !checks.iter().any(|check| check.result.is_blocking());
        if allowed {
            debug!(job_id = %job_id, to = %target, checks = checks.len(), "guards passed");
        } else {
            let denied: Vec<&str> = checks
                .iter()
                .filter(|c| c.result.is_blocking())
                .map(|c| c.name.as_str())
                .collect();
            info!(job_id = %job_id, to = %target, denied = ?denied, "transition denied by guards");
        }
        (allowed, checks)
    }

    /// Evaluate one registered guard as a hard check, outside any policy
    pub fn check_one(&self, job_id: &str, guard: &str) -> Option<GuardCheck> {
        let name = self.guards.get_key_value(guard).map(|(name, _)| *name)?;
        Some(self.evaluate(
            job_id,
            &PolicyEntry {
                guard: name,
                severity: Severity::Hard,
            },
        ))
    }

    fn evaluate(&self, job_id: &str, entry: &PolicyEntry) -> GuardCheck {
        let Some(guard) = self.guards.get(entry.guard).cloned() else {
            return GuardCheck::skipped(entry.guard, "guard not registered");
        };

        let owned_id = job_id.to_string();
        let outcome = call_with_timeout(self.timeout, move || guard.check(&owned_id));
        let check = match outcome {
            Ok(check) => check,
            Err(err) => adapter_failure(entry.guard, &err),
        };

        match (entry.severity, check.result) {
            (Severity::Soft, GuardResult::Fail) => GuardCheck {
                result: GuardResult::SoftFail,
                ..check
            },
            _ => check,
        }
    }
}

impl Default for GuardEngine {
    fn default() -> Self {
        Self::new(DEFAULT_GUARD_TIMEOUT)
    }
}

/// Adapter errors and timeouts never block: they become SOFT_FAIL
fn adapter_failure(guard: &str, err: &AdapterError) -> GuardCheck {
    warn!(guard = %guard, error = %err, "guard adapter failed");
    let kind = match err {
        AdapterError::Timeout(_) => "timeout",
        _ => "adapter_error",
    };
    GuardCheck::soft_fail(guard, format!("{} unavailable: {}", guard, err))
        .with_detail("error", err.to_string())
        .with_detail("kind", kind)
}
