//! Journal error types

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for journal operations
pub type JournalResult<T> = Result<T, JournalError>;

/// Errors from journal operations
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JCS canonicalization error: {0}")]
    Canonicalize(String),

    /// No record in the file could be parsed; the job state is unknown
    #[error("journal {path} is unrecoverable: none of {lines} records could be read")]
    Unrecoverable { path: PathBuf, lines: usize },
}
