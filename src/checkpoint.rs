//! Durable, append-only completion log used to resume interrupted batches.
//!
//! The file is UTF-8 JSON Lines: one self-describing record per line, no
//! header or footer. Records are keyed by work-item index and written in
//! completion order, so file order and index order are unrelated; `load`
//! indexes by the `index` field and, for duplicate indices, the last line
//! wins.
//!
//! The store assumes single-writer-at-a-time semantics. It does no locking
//! of its own; the batch driver serializes `append` calls behind a mutex.

use crate::types::Message;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// One persisted line: a completed conversation and its index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub index: usize,
    pub payload: Vec<Message>,
}

#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the log into an index-ordered view.
    ///
    /// The result is sized `max(index seen) + 1`; indices never written are
    /// `None`. A missing file is an empty log, not an error. Malformed lines
    /// are skipped with a warning; any other read failure aborts the load,
    /// since resume state cannot be trusted without the full log.
    pub async fn load(&self) -> Result<Vec<Option<Vec<Message>>>> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::checkpoint(&self.path, e)),
        };

        let mut slots: Vec<Option<Vec<Message>>> = Vec::new();
        for (lineno, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CheckpointRecord>(line) {
                Ok(record) => {
                    if record.index >= slots.len() {
                        slots.resize(record.index + 1, None);
                    }
                    slots[record.index] = Some(record.payload);
                }
                Err(e) => warn!(
                    path = %self.path.display(),
                    line = lineno + 1,
                    error = %e,
                    "skipping malformed checkpoint line"
                ),
            }
        }

        let unfinished = slots.iter().filter(|s| s.is_none()).count();
        if unfinished > 0 {
            warn!(
                path = %self.path.display(),
                unfinished,
                total = slots.len(),
                "checkpoint has unfinished entries"
            );
        }
        Ok(slots)
    }

    /// Append one record and flush before returning.
    pub async fn append(&self, index: usize, payload: &[Message]) -> Result<()> {
        let record = CheckpointRecord {
            index,
            payload: payload.to_vec(),
        };
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| Error::checkpoint(&self.path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| Error::checkpoint(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| Error::checkpoint(&self.path, e))?;
        Ok(())
    }

    /// Remove the log file. Idempotent: a missing file is not an error.
    pub async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::checkpoint(&self.path, e)),
        }
    }
}
