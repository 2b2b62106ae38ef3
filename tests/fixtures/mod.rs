//! Shared helpers for integration tests
//!
//! Scratch workspaces, journals seeded along valid lifecycle paths, and guard
//! engines built on static adapters.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::Arc;

use penplot_core::adapters::fixed::{
    StaticCameraAdapter, StaticChecklistProvider, StaticDeviceAdapter,
};
use penplot_core::config::GuardConfig;
use penplot_core::{GuardAdapters, GuardEngine, JobRecordStore, JobState, Journal, JournalEntry, Workspace};
use serde_json::Map;
use tempfile::TempDir;

/// A workspace in a temp directory, removed on drop
pub struct TestWorkspace {
    _dir: TempDir,
    pub workspace: Workspace,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let workspace = Workspace::new(dir.path());
        Self {
            _dir: dir,
            workspace,
        }
    }

    pub fn records(&self) -> JobRecordStore {
        JobRecordStore::new(self.workspace.clone())
    }

    /// Write a journal that walks `path` one transition at a time
    pub fn seed_journal(&self, job_id: &str, path: &[JobState]) -> Journal {
        let journal = Journal::open(self.workspace.journal_path(job_id), job_id).expect("open journal");
        for pair in path.windows(2) {
            journal
                .append(&JournalEntry::state_change(
                    job_id,
                    pair[0],
                    pair[1],
                    format!("seed {} -> {}", pair[0], pair[1]),
                    Map::new(),
                ))
                .expect("append");
        }
        journal
    }

    /// Non-empty lines in the job's journal (0 when it does not exist)
    pub fn journal_lines(&self, job_id: &str) -> usize {
        line_count(&self.workspace.journal_path(job_id))
    }
}

pub fn line_count(path: &Path) -> usize {
    fs::read_to_string(path)
        .map(|text| text.lines().filter(|l| !l.trim().is_empty()).count())
        .unwrap_or(0)
}

/// A valid lifecycle path from NEW to `state`
pub fn path_to(state: JobState) -> Vec<JobState> {
    use JobState::*;
    let main = [New, Queued, Analyzed, Optimized, Ready, Armed, Plotting];
    match state {
        Paused => [&main[..], &[Paused]].concat(),
        Completed => [&main[..], &[Completed]].concat(),
        Aborted => vec![New, Queued, Aborted],
        Failed => vec![New, Queued, Analyzed, Failed],
        other => {
            let end = main.iter().position(|s| *s == other).expect("state on main path");
            main[..=end].to_vec()
        }
    }
}

/// The journal of the crash scenario: five transitions ending in ARMED
pub fn crash_path() -> Vec<JobState> {
    path_to(JobState::Armed)
}

pub fn guard_options() -> GuardConfig {
    GuardConfig {
        timeout_seconds: 5,
        paper_session: false,
        pen_layers: false,
    }
}

/// Idle device, complete checklist, reachable camera
pub fn passing_adapters() -> GuardAdapters {
    GuardAdapters {
        device: Some(Arc::new(StaticDeviceAdapter::idle())),
        camera: Some(Arc::new(StaticCameraAdapter::accessible())),
        checklist: Some(Arc::new(StaticChecklistProvider::complete())),
        job_records: None,
    }
}

/// Standard policy where every guard passes
pub fn permissive_guards() -> Arc<GuardEngine> {
    Arc::new(GuardEngine::standard(passing_adapters(), &guard_options()))
}
