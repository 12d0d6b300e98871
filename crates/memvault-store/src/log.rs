use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use memvault_types::LogEvent;
use tracing::warn;

use crate::error::{StoreError, StoreResult};
use crate::lock::LockTable;

/// Durable append-only event log (one JSON event per line).
///
/// Appends are O(1) regardless of log size: no read-modify-write cycle,
/// just an exclusive lock, a single line write, flush and fsync. Growth is
/// verified by comparing file sizes before and after; a write that did not
/// grow the file raises [`StoreError::WriteFailed`] rather than silently
/// partially succeeding.
///
/// The log is monotonic: lines are only ever added, never rewritten in
/// place. A crash mid-write can leave a torn trailing line; the reader
/// discards it instead of failing the whole read.
pub struct AppendLog {
    path: PathBuf,
    locks: Arc<LockTable>,
}

impl AppendLog {
    /// Create a handle for the log at `path`. The file is created lazily
    /// on first append.
    pub fn new(path: impl Into<PathBuf>, locks: Arc<LockTable>) -> Self {
        Self {
            path: path.into(),
            locks,
        }
    }

    /// The log file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a single line. Returns the file size after the
    /// write.
    pub fn append(&self, event: &LogEvent) -> StoreResult<u64> {
        let line = serde_json::to_string(event)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        if line.contains('\n') {
            // serde_json escapes newlines inside strings, so this only
            // trips if the serializer contract is violated.
            return Err(StoreError::WriteFailed {
                path: self.path.display().to_string(),
                reason: "serialized event contains an embedded line break".into(),
            });
        }

        let _guard = self.locks.acquire(&self.path)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let before = match fs::metadata(&self.path) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        file.sync_all()?;

        let after = file.metadata()?.len();
        if after <= before {
            return Err(StoreError::WriteFailed {
                path: self.path.display().to_string(),
                reason: format!("log did not grow ({before} -> {after} bytes)"),
            });
        }
        Ok(after)
    }

    /// Read every complete event in the log.
    ///
    /// A missing file reads as empty. A torn trailing line (crash
    /// mid-write) is discarded with a warning; a malformed line anywhere
    /// else is an error.
    pub fn read_events(&self) -> StoreResult<Vec<LogEvent>> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<&str> = data.lines().collect();
        let mut events = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<LogEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) if i + 1 == lines.len() => {
                    warn!(
                        path = %self.path.display(),
                        error = %e,
                        "discarding torn trailing log line"
                    );
                }
                Err(e) => {
                    return Err(StoreError::Serialization(format!(
                        "malformed log line {} in {}: {e}",
                        i + 1,
                        self.path.display()
                    )));
                }
            }
        }
        Ok(events)
    }

    /// Number of complete events currently in the log.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.read_events()?.len())
    }

    /// Returns `true` if the log has no complete events.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }
}
