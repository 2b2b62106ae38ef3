//! Per-job append-only journal
//!
//! One newline-delimited JSON file per job. Each append is a single write of
//! one complete line followed by `sync_data`; a transition is committed once
//! its `state_change` line is durable.
//!
//! Every line carries a `checksum` field: `sha256:<hex>` of the JCS (RFC 8785)
//! form of the record without that field. A partial final write is detected
//! and discarded during replay, and trimmed before the next append.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::entry::{JournalEntry, JournalRecord};
use crate::error::{JournalError, JournalResult};
use crate::replay::Replay;

/// Name of the integrity field added to every line
pub const CHECKSUM_FIELD: &str = "checksum";

const CHECKSUM_PREFIX: &str = "sha256:";

/// Append-only journal for a single job
#[derive(Debug, Clone)]
pub struct Journal {
    job_id: String,
    path: PathBuf,
}

impl Journal {
    /// Open (or prepare to create) the journal at `path`.
    ///
    /// Creates the parent directory and trims a torn final line left by a
    /// crash mid-append.
    pub fn open(path: impl Into<PathBuf>, job_id: impl Into<String>) -> JournalResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let journal = Self {
            job_id: job_id.into(),
            path,
        };
        journal.repair_tail()?;
        Ok(journal)
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Durably append one entry
    pub fn append(&self, entry: &JournalEntry) -> JournalResult<()> {
        let line = encode_line(entry)?;
        let created = !self.path.exists();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;

        if created {
            sync_parent_dir(&self.path)?;
        }

        debug!(
            job_id = %self.job_id,
            record = entry.record.kind(),
            "journal record appended"
        );
        Ok(())
    }

    /// Build an entry for this job, append it, and return it
    pub fn record(&self, record: JournalRecord) -> JournalResult<JournalEntry> {
        let entry = JournalEntry::new(self.job_id.clone(), record);
        self.append(&entry)?;
        Ok(entry)
    }

    /// Replay the whole file. A missing file replays to an empty journal.
    pub fn replay(&self) -> JournalResult<Replay> {
        if !self.path.exists() {
            return Ok(Replay::default());
        }
        let bytes = fs::read(&self.path)?;
        replay_bytes(&self.path, &bytes)
    }

    /// Rewrite the journal keeping only the most recent `keep_entries` records.
    ///
    /// The last `state_change` and the last state-determining record (which
    /// may be an `emergency_shutdown`) are always kept, so replaying the result
    /// yields the same state and transition tail. They take slots from the
    /// oldest records of the window; only when `keep_entries` is 1 and they are
    /// different records are two records written. `keep_entries == 0` is
    /// treated as 1. Returns `false` when there was nothing to trim.
    pub fn cleanup(&self, keep_entries: usize) -> JournalResult<bool> {
        if !self.path.exists() {
            return Ok(false);
        }

        let replay = self.replay()?;
        let keep = keep_entries.max(1);
        let total = replay.entries.len();
        if total <= keep {
            return Ok(false);
        }

        let mut pinned: Vec<usize> = [
            replay.entries.iter().rposition(JournalEntry::is_state_change),
            replay.last_state_record_index(),
        ]
        .into_iter()
        .flatten()
        .collect();
        pinned.dedup();

        let mut chosen = pinned.clone();
        for index in (0..total).rev() {
            if chosen.len() >= keep {
                break;
            }
            if !pinned.contains(&index) {
                chosen.push(index);
            }
        }
        if chosen.len() >= total {
            return Ok(false);
        }
        chosen.sort_unstable();
        let kept: Vec<&JournalEntry> = chosen.iter().map(|&index| &replay.entries[index]).collect();

        let temp_path = self.path.with_extension("jsonl.tmp");
        {
            let mut temp = File::create(&temp_path)?;
            for entry in &kept {
                temp.write_all(encode_line(entry)?.as_bytes())?;
            }
            temp.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;
        sync_parent_dir(&self.path)?;

        info!(
            job_id = %self.job_id,
            before = total,
            after = kept.len(),
            "journal cleaned up"
        );
        Ok(true)
    }

    /// Make sure the file ends with a newline so the next append starts a
    /// fresh line. A complete final record only lost its newline; anything
    /// else is a torn write and is cut off.
    fn repair_tail(&self) -> JournalResult<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let bytes = fs::read(&self.path)?;
        if bytes.is_empty() || bytes.ends_with(b"\n") {
            return Ok(());
        }

        let tail_start = bytes
            .iter()
            .rposition(|b| *b == b'\n')
            .map(|pos| pos + 1)
            .unwrap_or(0);

        let file = if decode_line(&bytes[tail_start..]).is_ok() {
            let mut file = OpenOptions::new().append(true).open(&self.path)?;
            file.write_all(b"\n")?;
            file
        } else {
            warn!(
                job_id = %self.job_id,
                path = %self.path.display(),
                discarded_bytes = bytes.len() - tail_start,
                "truncating torn tail from journal"
            );
            let file = OpenOptions::new().write(true).open(&self.path)?;
            file.set_len(tail_start as u64)?;
            file
        };
        file.sync_all()?;
        Ok(())
    }
}

/// Replay raw journal bytes.
///
/// Corrupt records are skipped with a warning. If every record is corrupt the
/// journal is [`JournalError::Unrecoverable`]; a file holding only a torn
/// final line replays as empty.
pub fn replay_bytes(path: &Path, bytes: &[u8]) -> JournalResult<Replay> {
    let mut replay = Replay::default();

    let complete = bytes.ends_with(b"\n");
    let segments: Vec<&[u8]> = bytes.split(|b| *b == b'\n').collect();
    let last_index = segments.len().saturating_sub(1);

    for (index, raw) in segments.into_iter().enumerate() {
        if raw.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        match decode_line(raw) {
            Ok(entry) => replay.apply(entry),
            Err(reason) if index == last_index && !complete => {
                warn!(path = %path.display(), %reason, "discarding torn final journal record");
                replay.torn_tail = true;
            }
            Err(reason) => {
                warn!(
                    path = %path.display(),
                    line = index + 1,
                    %reason,
                    "skipping corrupt journal record"
                );
                replay.skipped += 1;
            }
        }
    }

    // A torn tail alone is an uncommitted first write, not corruption
    if replay.skipped > 0 && replay.entries.is_empty() {
        return Err(JournalError::Unrecoverable {
            path: path.to_path_buf(),
            lines: replay.skipped,
        });
    }

    Ok(replay)
}

/// Serialize an entry to one checksummed line, newline included
pub fn encode_line(entry: &JournalEntry) -> JournalResult<String> {
    let mut value = serde_json::to_value(entry)?;
    let checksum = checksum(&value)?;
    if let Value::Object(map) = &mut value {
        map.insert(CHECKSUM_FIELD.to_string(), Value::String(checksum));
    }

    let mut line = serde_json::to_string(&value)?;
    line.push('\n');
    Ok(line)
}

/// Parse and verify one line. Lines without a checksum are accepted.
pub fn decode_line(raw: &[u8]) -> Result<JournalEntry, String> {
    let text = std::str::from_utf8(raw).map_err(|e| format!("invalid UTF-8: {e}"))?;
    let mut value: Value = serde_json::from_str(text.trim()).map_err(|e| e.to_string())?;

    let map = value
        .as_object_mut()
        .ok_or_else(|| "record is not a JSON object".to_string())?;
    match map.remove(CHECKSUM_FIELD) {
        None => {}
        Some(Value::String(expected)) => {
            let actual = checksum(&value).map_err(|e| e.to_string())?;
            if actual != expected {
                return Err(format!("checksum mismatch: expected {expected}, computed {actual}"));
            }
        }
        Some(_) => return Err("checksum field is not a string".to_string()),
    }

    serde_json::from_value(value).map_err(|e| e.to_string())
}

fn checksum(value: &Value) -> JournalResult<String> {
    let jcs_bytes = serde_json_canonicalizer::to_vec(value)
        .map_err(|e| JournalError::Canonicalize(e.to_string()))?;

    let mut hasher = Sha256::new();
    hasher.update(&jcs_bytes);
    Ok(format!("{}{}", CHECKSUM_PREFIX, hex::encode(hasher.finalize())))
}

/// Persist a directory entry change (create/rename)
fn sync_parent_dir(path: &Path) -> JournalResult<()> {
    #[cfg(unix)]
    {
        if let Some(parent) = path.parent() {
            File::open(parent)?.sync_all()?;
        }
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}
