//! Guard engine integration tests with the standard guards

mod fixtures;

use std::sync::Arc;
use std::time::{Duration, Instant};

use fixtures::{guard_options, passing_adapters, TestWorkspace};
use penplot_core::adapters::fixed::{
    StaticCameraAdapter, StaticChecklistProvider, StaticDeviceAdapter,
};
use penplot_core::config::GuardConfig;
use penplot_core::guards::{
    CameraHealthGuard, DeviceIdleGuard, CAMERA_HEALTH, CHECKLIST_COMPLETE, DEVICE_IDLE,
    PAPER_SESSION_VALID, PEN_LAYER_COMPATIBLE,
};
use penplot_core::job_record::CONFIG_STATUS_CONFIGURED;
use penplot_core::{GuardAdapters, GuardEngine, GuardResult, JobRecord, JobState, Severity};

fn results(checks: &[penplot_core::GuardCheck]) -> Vec<(&str, GuardResult)> {
    checks.iter().map(|c| (c.name.as_str(), c.result)).collect()
}

// =============================================================================
// Aggregation
// =============================================================================

#[test]
fn test_ungated_targets_allowed_without_checks() {
    let engine = GuardEngine::standard(GuardAdapters::default(), &guard_options());
    for target in [
        JobState::Queued,
        JobState::Ready,
        JobState::Paused,
        JobState::Completed,
        JobState::Aborted,
    ] {
        let (allowed, checks) = engine.can_transition("job", target);
        assert!(allowed, "{}", target);
        assert!(checks.is_empty(), "{}", target);
    }
}

#[test]
fn test_arming_all_pass() {
    let engine = GuardEngine::standard(passing_adapters(), &guard_options());
    let (allowed, checks) = engine.can_transition("job", JobState::Armed);

    assert!(allowed);
    assert_eq!(
        results(&checks),
        vec![
            (DEVICE_IDLE, GuardResult::Pass),
            (CHECKLIST_COMPLETE, GuardResult::Pass),
        ]
    );
}

#[test]
fn test_any_hard_fail_denies() {
    let adapters = GuardAdapters {
        checklist: Some(Arc::new(StaticChecklistProvider::new(2, 5))),
        ..passing_adapters()
    };
    let engine = GuardEngine::standard(adapters, &guard_options());
    let (allowed, checks) = engine.can_transition("job", JobState::Armed);

    assert!(!allowed);
    assert_eq!(checks[1].result, GuardResult::Fail);
    assert_eq!(checks[1].message, "2/5 required items done");
}

#[test]
fn test_disconnected_device_blocks_plotting() {
    let adapters = GuardAdapters {
        device: Some(Arc::new(StaticDeviceAdapter::disconnected())),
        ..passing_adapters()
    };
    let engine = GuardEngine::standard(adapters, &guard_options());
    let (allowed, checks) = engine.can_transition("job", JobState::Plotting);

    assert!(!allowed);
    assert_eq!(
        results(&checks),
        vec![(DEVICE_IDLE, GuardResult::Fail), (CAMERA_HEALTH, GuardResult::Pass)]
    );
}

#[test]
fn test_unconfigured_adapters_skip() {
    let engine = GuardEngine::standard(GuardAdapters::default(), &guard_options());
    let (allowed, checks) = engine.can_transition("job", JobState::Plotting);

    assert!(allowed, "SKIPPED never blocks");
    assert!(checks.iter().all(|c| c.result == GuardResult::Skipped));
}

#[test]
fn test_unregistered_guard_skipped() {
    let mut engine = GuardEngine::new(Duration::from_secs(1));
    engine.require(JobState::Armed, "bed_level", Severity::Hard);

    let (allowed, checks) = engine.can_transition("job", JobState::Armed);
    assert!(allowed);
    assert_eq!(checks[0].result, GuardResult::Skipped);
    assert!(engine.check_one("job", "bed_level").is_none());
}

// =============================================================================
// Adapter failures
// =============================================================================

#[test]
fn test_slow_adapter_becomes_soft_fail() {
    let mut engine = GuardEngine::new(Duration::from_millis(100));
    engine.register(Arc::new(DeviceIdleGuard::new(Some(Arc::new(
        StaticDeviceAdapter::idle().with_delay(Duration::from_secs(2)),
    )))));
    engine.require(JobState::Plotting, DEVICE_IDLE, Severity::Hard);

    let started = Instant::now();
    let (allowed, checks) = engine.can_transition("job", JobState::Plotting);

    assert!(started.elapsed() < Duration::from_secs(1), "evaluation must not wait for the adapter");
    assert!(allowed, "timeouts never block");
    assert_eq!(checks[0].result, GuardResult::SoftFail);
    assert_eq!(checks[0].details["kind"], "timeout");
    assert!(checks[0].details.contains_key("error"));
}

#[test]
fn test_failing_adapter_becomes_soft_fail() {
    let adapters = GuardAdapters {
        device: Some(Arc::new(StaticDeviceAdapter::failing("driver crashed"))),
        checklist: Some(Arc::new(StaticChecklistProvider::failing("file locked"))),
        ..GuardAdapters::default()
    };
    let engine = GuardEngine::standard(adapters, &guard_options());
    let (allowed, checks) = engine.can_transition("job", JobState::Armed);

    assert!(allowed);
    for check in &checks {
        assert_eq!(check.result, GuardResult::SoftFail, "{}", check.name);
        assert_eq!(check.details["kind"], "adapter_error");
    }
    assert!(checks[0].details["error"].as_str().unwrap().contains("driver crashed"));
}

#[test]
fn test_soft_policy_downgrades_fail() {
    let mut engine = GuardEngine::new(Duration::from_secs(1));
    engine.register(Arc::new(CameraHealthGuard::new(Some(Arc::new(
        StaticCameraAdapter::inaccessible("lens cap on"),
    )))));
    engine.require(JobState::Plotting, CAMERA_HEALTH, Severity::Soft);

    let (allowed, checks) = engine.can_transition("job", JobState::Plotting);
    assert!(allowed);
    assert_eq!(checks[0].result, GuardResult::SoftFail);
    assert_eq!(checks[0].details["error"], "lens cap on");
}

// =============================================================================
// Job record guards
// =============================================================================

#[test]
fn test_record_guards_are_opt_in() {
    let tw = TestWorkspace::new();
    tw.records().save(&JobRecord::new("job", "postcard")).unwrap();
    let adapters = GuardAdapters {
        job_records: Some(tw.records()),
        ..passing_adapters()
    };

    let default = GuardEngine::standard(adapters.clone(), &guard_options());
    let (allowed, _) = default.can_transition("job", JobState::Armed);
    assert!(allowed, "record guards are off by default");

    let strict = GuardEngine::standard(
        adapters,
        &GuardConfig {
            paper_session: true,
            pen_layers: true,
            ..guard_options()
        },
    );
    let (allowed, checks) = strict.can_transition("job", JobState::Armed);
    assert!(!allowed);
    assert_eq!(
        results(&checks)[2..],
        [
            (PAPER_SESSION_VALID, GuardResult::Fail),
            (PEN_LAYER_COMPATIBLE, GuardResult::Fail),
        ]
    );

    tw.records()
        .save(
            &JobRecord::new("job", "postcard")
                .with_paper("A6 bristol")
                .with_config_status(CONFIG_STATUS_CONFIGURED),
        )
        .unwrap();
    let (allowed, _) = strict.can_transition("job", JobState::Armed);
    assert!(allowed);
}
