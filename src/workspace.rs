//! Workspace layout
//!
//! ```text
//! <root>/penplot.toml
//! <root>/jobs/<job_id>/job.json
//! <root>/jobs/<job_id>/journal.jsonl
//! ```

use std::io;
use std::path::{Path, PathBuf};

use penplot_journal::JOURNAL_FILE_NAME;
use thiserror::Error;
use walkdir::WalkDir;

/// Workspace config file name
pub const WORKSPACE_CONFIG_FILE: &str = "penplot.toml";

/// Job record file name
pub const JOB_RECORD_FILE: &str = "job.json";

const JOBS_DIR: &str = "jobs";

/// Maximum job id length
const MAX_JOB_ID_LEN: usize = 128;

/// Errors for workspace paths
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("invalid job id {0:?}: use letters, digits, '-' or '_' (max 128)")]
    InvalidJobId(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Root of a penplot workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join(WORKSPACE_CONFIG_FILE)
    }

    pub fn jobs_dir(&self) -> PathBuf {
        self.root.join(JOBS_DIR)
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.jobs_dir().join(job_id)
    }

    pub fn journal_path(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join(JOURNAL_FILE_NAME)
    }

    pub fn job_record_path(&self, job_id: &str) -> PathBuf {
        self.job_dir(job_id).join(JOB_RECORD_FILE)
    }

    /// Job ids become directory names, so only path-safe ids are accepted
    pub fn validate_job_id(job_id: &str) -> Result<(), WorkspaceError> {
        let valid = !job_id.is_empty()
            && job_id.len() <= MAX_JOB_ID_LEN
            && job_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(())
        } else {
            Err(WorkspaceError::InvalidJobId(job_id.to_string()))
        }
    }

    /// Ids of every job that has a journal, sorted
    pub fn journaled_job_ids(&self) -> Result<Vec<String>, WorkspaceError> {
        let jobs_dir = self.jobs_dir();
        if !jobs_dir.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in WalkDir::new(&jobs_dir).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|e| {
                e.into_io_error()
                    .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "walk error"))
            })?;
            if !entry.file_type().is_file() || entry.file_name() != JOURNAL_FILE_NAME {
                continue;
            }
            let id = entry
                .path()
                .parent()
                .and_then(Path::file_name)
                .and_then(|name| name.to_str());
            if let Some(id) = id.filter(|id| Self::validate_job_id(id).is_ok()) {
                ids.push(id.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}
