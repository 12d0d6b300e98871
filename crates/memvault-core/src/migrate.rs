use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use memvault_types::{
    ActionKind, LifecycleStatus, LogEvent, ManifestEntry, Record, RecordId,
    CURRENT_SCHEMA_VERSION,
};
use tracing::{info, warn};

use crate::error::{VaultError, VaultResult};
use crate::vault::Vault;

/// Summary of a completed migration run.
#[derive(Clone, Debug)]
pub struct MigrationReport {
    /// Entries migrated during this run.
    pub migrated: usize,
    /// Entries skipped because they were already manifested (a resumed
    /// run, or duplicates of prior ingestion).
    pub skipped: usize,
    /// Where the legacy monolith was archived.
    pub archived_monolith: PathBuf,
}

impl Vault {
    /// Convert a legacy monolithic store into per-record containers.
    ///
    /// The monolith is one JSON object keyed by record id. Each entry is
    /// stored, manifested, indexed, and logged at one-record granularity,
    /// so a halted run resumes by skipping already-manifested ids. After
    /// all entries are processed, every manifest entry is verified
    /// fetchable; only then is the monolith moved, hash-verified, into
    /// the archive area. On verification failure the monolith is left
    /// byte-identical so the operation can be safely retried.
    pub fn migrate(&self, legacy_path: &Path) -> VaultResult<MigrationReport> {
        let legacy_bytes = fs::read(legacy_path)?;
        let doc: serde_json::Value =
            serde_json::from_slice(&legacy_bytes).map_err(|e| VaultError::LegacyFormat {
                path: legacy_path.display().to_string(),
                reason: e.to_string(),
            })?;
        let entries = doc.as_object().ok_or_else(|| VaultError::LegacyFormat {
            path: legacy_path.display().to_string(),
            reason: "top level must be a JSON object keyed by record id".into(),
        })?;

        let mut migrated = 0usize;
        let mut skipped = 0usize;
        for (key, value) in entries {
            let id = RecordId::new(key.clone()).map_err(|e| VaultError::LegacyFormat {
                path: legacy_path.display().to_string(),
                reason: format!("unusable record id {key:?}: {e}"),
            })?;

            // Resume checkpoint: one record migrated at a time.
            if self.manifest().lock().contains(&id) {
                skipped += 1;
                continue;
            }

            let record = legacy_record(&id, value, legacy_path)?;
            let info = self.records().store(&record)?;
            self.manifest().lock().upsert(ManifestEntry::new(
                record.id.clone(),
                info.hash,
                info.location,
                record.decision,
                record.timestamp,
                info.size,
            ))?;
            if let Err(e) = self.search().lock().index_record(&record) {
                warn!(id = %record.id, error = %e, "search index update failed during migration");
            }
            self.log().append(&LogEvent::now(
                ActionKind::RecordMigrated,
                serde_json::json!({ "id": record.id }),
            ))?;
            migrated += 1;
        }

        // Verify every manifest entry is actually fetchable before the
        // monolith is touched.
        let mut failures = Vec::new();
        {
            let manifest = self.manifest().lock();
            for entry in manifest.entries() {
                if let Err(e) = self.records().fetch_raw(&entry.id) {
                    failures.push((entry.id.clone(), e.to_string()));
                }
            }
        }
        if !failures.is_empty() {
            warn!(
                failures = failures.len(),
                "migration verification failed; legacy monolith left untouched"
            );
            return Err(VaultError::MigrationVerification { failures });
        }

        let archived_monolith = self.archive_monolith(legacy_path, &legacy_bytes)?;
        self.log().append(&LogEvent::now(
            ActionKind::MigrationCompleted,
            serde_json::json!({
                "migrated": migrated,
                "skipped": skipped,
                "archived_monolith": archived_monolith.display().to_string(),
            }),
        ))?;
        info!(migrated, skipped, "migration completed");

        Ok(MigrationReport {
            migrated,
            skipped,
            archived_monolith,
        })
    }

    /// Move the verified monolith into the archive area: copy, compare
    /// hashes, and only then remove the original.
    fn archive_monolith(&self, legacy_path: &Path, legacy_bytes: &[u8]) -> VaultResult<PathBuf> {
        let archive_dir = self.root().join(memvault_store::RecordStore::ARCHIVE_DIR);
        fs::create_dir_all(&archive_dir)?;

        let name = legacy_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("monolith");
        let ext = legacy_path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("json");
        let stamp = Utc::now().format("%Y%m%d_%H%M%S%3f");
        let target = archive_dir.join(format!("{name}_{stamp}.{ext}"));

        fs::copy(legacy_path, &target)?;
        let copied = fs::read(&target)?;
        if blake3::hash(&copied) != blake3::hash(legacy_bytes) {
            fs::remove_file(&target)?;
            return Err(VaultError::Store(memvault_store::StoreError::WriteFailed {
                path: target.display().to_string(),
                reason: "archived monolith does not match the original".into(),
            }));
        }
        fs::remove_file(legacy_path)?;
        info!(archive = %target.display(), "legacy monolith archived");
        Ok(target)
    }
}

/// Shape a loosely-typed legacy entry into a schema-tagged record.
///
/// Required fields get defaults when missing; unrecognized fields are
/// preserved in the record's `extra` map rather than dropped.
fn legacy_record(
    id: &RecordId,
    value: &serde_json::Value,
    legacy_path: &Path,
) -> VaultResult<Record> {
    let mut obj = match value {
        serde_json::Value::Object(map) => map.clone(),
        other => {
            return Err(VaultError::LegacyFormat {
                path: legacy_path.display().to_string(),
                reason: format!("entry {id} is not an object: {other}"),
            });
        }
    };

    obj.insert("id".into(), serde_json::json!(id.as_str()));
    if !obj.contains_key("title") {
        obj.insert("title".into(), serde_json::json!(""));
    }
    if !obj.contains_key("timestamp") {
        obj.insert(
            "timestamp".into(),
            serde_json::json!(Utc::now().to_rfc3339()),
        );
    }
    if !obj.contains_key("raw") {
        // Older monoliths used "content" or "text" for the payload.
        let payload = obj
            .remove("content")
            .or_else(|| obj.remove("text"))
            .unwrap_or_else(|| serde_json::json!(""));
        obj.insert("raw".into(), payload);
    }
    if !obj.contains_key("schema_version") {
        obj.insert(
            "schema_version".into(),
            serde_json::json!(CURRENT_SCHEMA_VERSION),
        );
    }
    if let Some(decision) = obj.get("decision").cloned() {
        // Normalize loose spellings ("keep", "discard"); anything
        // unrecognized moves aside instead of failing the entry.
        match decision.as_str().map(str::parse::<LifecycleStatus>) {
            Some(Ok(status)) => {
                obj.insert("decision".into(), serde_json::json!(status.to_string()));
            }
            _ => {
                obj.remove("decision");
                obj.insert("legacy_decision".into(), decision);
            }
        }
    }

    serde_json::from_value(serde_json::Value::Object(obj)).map_err(|e| VaultError::LegacyFormat {
        path: legacy_path.display().to_string(),
        reason: format!("entry {id} does not shape into a record: {e}"),
    })
}
