//! Job record (job.json)
//!
//! The record holds CRUD-owned job metadata plus a mirror of the lifecycle
//! state for fast reads. The journal stays authoritative: the mirrored state
//! is refreshed after every committed transition and on recovery, and a
//! failed refresh is never fatal.

use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;

use crate::workspace::Workspace;
use penplot_journal::JobState;

/// Value of `config_status` once pens and layers are assigned
pub const CONFIG_STATUS_CONFIGURED: &str = "configured";

/// Errors for job record persistence
#[derive(Debug, Error)]
pub enum JobRecordError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Job metadata as stored in `jobs/<id>/job.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Paper size/session chosen for the plot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paper: Option<String>,
    /// Mirror of the journal's current state
    pub state: JobState,
    /// Pen/layer assignment status
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Fields owned by other tools, preserved on rewrite
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobRecord {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            paper: None,
            state: JobState::New,
            config_status: None,
            created_at: now,
            updated_at: now,
            extra: Map::new(),
        }
    }

    pub fn with_paper(mut self, paper: impl Into<String>) -> Self {
        self.paper = Some(paper.into());
        self
    }

    pub fn with_config_status(mut self, status: impl Into<String>) -> Self {
        self.config_status = Some(status.into());
        self
    }

    /// A paper session is selected
    pub fn has_paper(&self) -> bool {
        self.paper.as_deref().is_some_and(|p| !p.trim().is_empty())
    }

    /// Pens and layers are assigned
    pub fn is_configured(&self) -> bool {
        self.config_status.as_deref() == Some(CONFIG_STATUS_CONFIGURED)
    }
}

/// Reads and writes job records inside a workspace
#[derive(Debug, Clone)]
pub struct JobRecordStore {
    workspace: Workspace,
}

impl JobRecordStore {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    /// Load a record; `None` when the job has no job.json
    pub fn load(&self, job_id: &str) -> Result<Option<JobRecord>, JobRecordError> {
        let path = self.workspace.job_record_path(job_id);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Write atomically (write-then-rename)
    pub fn save(&self, record: &JobRecord) -> Result<(), JobRecordError> {
        let path = self.workspace.job_record_path(&record.id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&path, &serde_json::to_string_pretty(record)?)
    }

    /// Refresh the mirrored state. Returns false when there is no record to
    /// update or the write failed.
    pub fn mirror_state(&self, job_id: &str, state: JobState) -> bool {
        let result = self.load(job_id).and_then(|record| match record {
            Some(mut record) if record.state != state => {
                record.state = state;
                record.updated_at = Utc::now();
                self.save(&record).map(|_| true)
            }
            Some(_) => Ok(true),
            None => Ok(false),
        });

        result.unwrap_or_else(|err| {
            warn!(job_id = %job_id, error = %err, "failed to refresh job record");
            false
        })
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<(), JobRecordError> {
    let temp_path = path.with_extension("json.tmp");
    fs::write(&temp_path, contents)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}
