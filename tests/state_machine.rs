//! State machine integration tests: table conformance, gating, replay

mod fixtures;

use std::sync::Arc;

use fixtures::{path_to, permissive_guards, TestWorkspace};
use penplot_core::adapters::fixed::{
    StaticCameraAdapter, StaticChecklistProvider, StaticDeviceAdapter,
};
use penplot_core::adapters::FileChecklistProvider;
use penplot_core::{
    create_state_machine, GuardAdapters, GuardEngine, GuardResult, JobState, JournalRecord,
    StateMachine,
};
use serde_json::Map;

fn machine_at(
    tw: &TestWorkspace,
    job_id: &str,
    state: JobState,
    guards: Arc<GuardEngine>,
) -> StateMachine {
    tw.seed_journal(job_id, &path_to(state));
    let sm = create_state_machine(job_id, &tw.workspace, guards).unwrap();
    assert_eq!(sm.current_state(), state);
    sm
}

// =============================================================================
// Table conformance
// =============================================================================

#[test]
fn test_disallowed_pairs_write_nothing() {
    let mut rejected = 0;
    for from in JobState::ALL {
        for to in JobState::ALL {
            if from.can_transition_to(to) {
                continue;
            }
            let tw = TestWorkspace::new();
            let mut sm = machine_at(&tw, "job", from, permissive_guards());
            let before = tw.journal_lines("job");

            assert!(!sm.transition_to(to, "conformance", Map::new()), "{} -> {}", from, to);
            assert_eq!(sm.current_state(), from);
            assert_eq!(tw.journal_lines("job"), before, "{} -> {} wrote to the journal", from, to);
            rejected += 1;
        }
    }
    // 121 pairs, 17 allowed
    assert_eq!(rejected, 121 - 17);
}

#[test]
fn test_allowed_pairs_commit_with_passing_guards() {
    for from in JobState::ALL {
        for &to in from.allowed_targets() {
            let tw = TestWorkspace::new();
            let mut sm = machine_at(&tw, "job", from, permissive_guards());
            let before = sm.transitions().len();

            assert!(sm.transition_to(to, "conformance", Map::new()), "{} -> {}", from, to);
            assert_eq!(sm.current_state(), to);
            assert_eq!(sm.transitions().len(), before + 1);

            let replayed = create_state_machine("job", &tw.workspace, permissive_guards()).unwrap();
            assert_eq!(replayed.current_state(), to);
        }
    }
}

#[test]
fn test_terminal_states_have_no_exits() {
    for state in [JobState::Completed, JobState::Aborted, JobState::Failed] {
        assert!(state.is_terminal());
        assert!(state.allowed_targets().is_empty());
    }
}

// =============================================================================
// Gated transitions
// =============================================================================

#[test]
fn test_denied_arm_is_not_journaled() {
    let tw = TestWorkspace::new();
    let adapters = GuardAdapters {
        device: Some(Arc::new(StaticDeviceAdapter::busy("previous plot still running"))),
        checklist: Some(Arc::new(StaticChecklistProvider::complete())),
        ..GuardAdapters::default()
    };
    let guards = Arc::new(GuardEngine::standard(adapters, &fixtures::guard_options()));
    let mut sm = machine_at(&tw, "job", JobState::Ready, guards);
    let before = tw.journal_lines("job");

    assert!(!sm.transition_to(JobState::Armed, "arm", Map::new()));
    assert_eq!(sm.current_state(), JobState::Ready);
    assert_eq!(tw.journal_lines("job"), before);

    let device = sm
        .last_guard_checks()
        .iter()
        .find(|c| c.name == "device_idle")
        .unwrap();
    assert_eq!(device.result, GuardResult::Fail);
    assert!(device.message.contains("previous plot still running"));
}

#[test]
fn test_soft_failures_do_not_block_plotting() {
    let tw = TestWorkspace::new();
    let adapters = GuardAdapters {
        device: Some(Arc::new(StaticDeviceAdapter::idle())),
        camera: Some(Arc::new(StaticCameraAdapter::inaccessible("no signal"))),
        ..GuardAdapters::default()
    };
    let guards = Arc::new(GuardEngine::standard(adapters, &fixtures::guard_options()));
    let mut sm = machine_at(&tw, "job", JobState::Armed, guards);

    assert!(sm.start_plotting());

    let replay = sm.journal().replay().unwrap();
    let evaluated = replay
        .entries
        .iter()
        .rev()
        .find(|e| e.record.kind() == "guards_evaluated")
        .unwrap();
    match &evaluated.record {
        JournalRecord::GuardsEvaluated { target, allowed, checks } => {
            assert_eq!(*target, JobState::Plotting);
            assert!(allowed);
            assert_eq!(checks[1].result, GuardResult::SoftFail);
        }
        other => panic!("unexpected record {:?}", other),
    }
}

#[test]
fn test_retry_after_fixing_checklist() {
    let tw = TestWorkspace::new();
    let job_dir = tw.workspace.job_dir("job");
    std::fs::create_dir_all(&job_dir).unwrap();
    let write_checklist = |done: bool| {
        std::fs::write(
            job_dir.join("checklist.json"),
            format!(
                r#"{{"items": [{{"name": "paper taped", "required": true, "done": {}}}]}}"#,
                done
            ),
        )
        .unwrap();
    };

    let adapters = GuardAdapters {
        device: Some(Arc::new(StaticDeviceAdapter::idle())),
        checklist: Some(Arc::new(FileChecklistProvider::new(
            tw.workspace.clone(),
            "checklist.json",
        ))),
        ..GuardAdapters::default()
    };
    let guards = Arc::new(GuardEngine::standard(adapters, &fixtures::guard_options()));
    let mut sm = machine_at(&tw, "job", JobState::Ready, guards);

    write_checklist(false);
    assert!(!sm.arm_job());
    assert_eq!(sm.last_guard_checks()[0].message, "0/1 required items done");

    write_checklist(true);
    assert!(sm.arm_job());
    assert_eq!(sm.current_state(), JobState::Armed);
}

// =============================================================================
// Replay
// =============================================================================

#[test]
fn test_replay_is_idempotent() {
    let tw = TestWorkspace::new();
    let mut sm = machine_at(&tw, "job", JobState::Ready, permissive_guards());
    assert!(sm.arm_job());
    assert!(sm.start_plotting());
    assert!(sm.pause_plotting());

    let first = create_state_machine("job", &tw.workspace, permissive_guards()).unwrap();
    let second = create_state_machine("job", &tw.workspace, permissive_guards()).unwrap();

    assert_eq!(first.current_state(), JobState::Paused);
    assert_eq!(first.current_state(), second.current_state());
    assert_eq!(first.transitions(), second.transitions());
    assert_eq!(first.transitions().len(), 8);
}

#[test]
fn test_torn_tail_ignored_and_repaired() {
    use std::io::Write;

    let tw = TestWorkspace::new();
    tw.seed_journal("job", &path_to(JobState::Ready));
    let path = tw.workspace.journal_path("job");
    std::fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .unwrap()
        .write_all(br#"{"type":"state_change","job_id":"job","from_st"#)
        .unwrap();

    let mut sm = create_state_machine("job", &tw.workspace, permissive_guards()).unwrap();
    assert_eq!(sm.current_state(), JobState::Ready);
    assert!(sm.abort_job("operator cancelled"));

    let reopened = create_state_machine("job", &tw.workspace, permissive_guards()).unwrap();
    assert_eq!(reopened.current_state(), JobState::Aborted);
    assert_eq!(reopened.journal().replay().unwrap().skipped, 0);
}
