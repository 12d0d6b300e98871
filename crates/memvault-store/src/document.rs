use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::lock::LockTable;

/// Structural validator run against a document before it is written.
///
/// Returns a human-readable reason on rejection.
pub type Validator = fn(&serde_json::Value) -> Result<(), String>;

/// Atomic whole-document writer.
///
/// The only primitive permitted to replace a document on disk. Replacement
/// and list-append are two distinct named operations, [`replace`] and
/// [`append_to_list`], rather than one call with a mode flag, so an
/// intended append can never silently become a destructive overwrite.
///
/// Every write serializes to a temp file in the destination's own
/// directory (same volume, required for atomic rename semantics), flushes,
/// fsyncs, then renames over the destination. On any failure the temp file
/// is removed and the destination is left untouched.
///
/// [`replace`]: DocumentWriter::replace
/// [`append_to_list`]: DocumentWriter::append_to_list
pub struct DocumentWriter {
    locks: Arc<LockTable>,
}

impl DocumentWriter {
    /// Create a writer sharing the given lock table.
    pub fn new(locks: Arc<LockTable>) -> Self {
        Self { locks }
    }

    /// Atomically replace the document at `path` with `doc`.
    pub fn replace<T: Serialize>(&self, path: &Path, doc: &T) -> StoreResult<()> {
        let value = serde_json::to_value(doc)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let _guard = self.locks.acquire(path)?;
        write_value_atomic(path, &value)
    }

    /// Like [`replace`](Self::replace), but run `validate` over the
    /// serialized document first and fail with [`StoreError::Schema`] if
    /// it rejects.
    pub fn replace_validated<T: Serialize>(
        &self,
        path: &Path,
        doc: &T,
        validate: Validator,
    ) -> StoreResult<()> {
        let value = serde_json::to_value(doc)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        validate(&value).map_err(|reason| StoreError::Schema {
            path: path.display().to_string(),
            reason,
        })?;
        let _guard = self.locks.acquire(path)?;
        write_value_atomic(path, &value)
    }

    /// Append `element` to the JSON array stored at `path`, atomically
    /// rewriting the array.
    ///
    /// The existing document is loaded under the resource lock. A missing
    /// or empty file starts as an empty array; any other non-array
    /// document fails with [`StoreError::Schema`].
    pub fn append_to_list<T: Serialize>(&self, path: &Path, element: &T) -> StoreResult<()> {
        let element = serde_json::to_value(element)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let _guard = self.locks.acquire(path)?;

        let mut items = match fs::read(path) {
            Ok(data) if data.iter().all(|b| b.is_ascii_whitespace()) => Vec::new(),
            Ok(data) => {
                let doc: serde_json::Value = serde_json::from_slice(&data)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                match doc {
                    serde_json::Value::Array(items) => items,
                    other => {
                        return Err(StoreError::Schema {
                            path: path.display().to_string(),
                            reason: format!(
                                "append_to_list requires a JSON array, found {}",
                                json_kind(&other)
                            ),
                        });
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        items.push(element);
        write_value_atomic(path, &serde_json::Value::Array(items))
    }
}

/// Serialize `value` as pretty JSON and atomically install it at `path`.
///
/// Caller holds the resource lock where mutual exclusion matters.
pub(crate) fn write_value_atomic(path: &Path, value: &serde_json::Value) -> StoreResult<()> {
    let mut bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    bytes.push(b'\n');
    write_bytes_atomic(path, &bytes)
}

/// Atomically install raw bytes at `path` via temp file + rename.
pub(crate) fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;

    // NamedTempFile deletes itself on drop, so every early return below
    // leaves the destination untouched.
    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    debug!(path = %path.display(), bytes = bytes.len(), "document replaced");
    Ok(())
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
