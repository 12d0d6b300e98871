use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use memvault_store::{DocumentWriter, RecordStore, StoreError};
use memvault_types::{ContentHash, LifecycleStatus, ManifestEntry, RecordId};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{IndexError, IndexResult};

/// Current manifest document version.
pub const MANIFEST_VERSION: u32 = 1;

/// File name of the manifest document under the storage root.
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Serialize, Deserialize)]
struct ManifestDocument {
    version: u32,
    entries: BTreeMap<RecordId, ManifestEntry>,
}

/// Summary of a manifest rebuild.
#[derive(Clone, Debug)]
pub struct ManifestRebuildReport {
    /// Entries written into the rebuilt manifest.
    pub total: usize,
    /// Ids flagged because their container was unreadable.
    pub flagged: Vec<RecordId>,
}

/// The authoritative bookkeeping ledger: one entry per stored record.
///
/// Held in memory as a `BTreeMap` and persisted as a single JSON document
/// through [`DocumentWriter::replace_validated`], a whole-document replace
/// on every change, never a per-entry append, so the ledger on disk is
/// always transactionally consistent. Deterministic ordering plus
/// deterministic serialization make [`rebuild`](Manifest::rebuild)
/// idempotent down to the byte.
pub struct Manifest {
    path: PathBuf,
    archive_dir: PathBuf,
    writer: DocumentWriter,
    entries: BTreeMap<RecordId, ManifestEntry>,
}

impl Manifest {
    /// Open the manifest under `root`, loading the existing document if
    /// one is present.
    pub fn open(root: &Path, writer: DocumentWriter) -> IndexResult<Self> {
        let path = root.join(MANIFEST_FILE);
        let archive_dir = root.join(RecordStore::ARCHIVE_DIR);
        let entries = match fs::read(&path) {
            Ok(data) => {
                let doc: ManifestDocument =
                    serde_json::from_slice(&data).map_err(|e| IndexError::Malformed {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })?;
                if doc.version != MANIFEST_VERSION {
                    return Err(IndexError::Malformed {
                        path: path.display().to_string(),
                        reason: format!("unsupported manifest version {}", doc.version),
                    });
                }
                doc.entries
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            archive_dir,
            writer,
            entries,
        })
    }

    /// Create or update the entry for `entry.id` and persist the ledger.
    ///
    /// Callers must only invoke this after the record itself is durably
    /// stored: a crash may leave an orphan container, never a manifest
    /// entry pointing at nothing.
    pub fn upsert(&mut self, entry: ManifestEntry) -> IndexResult<()> {
        self.entries.insert(entry.id.clone(), entry);
        self.persist()
    }

    /// Look up the entry for `id`.
    pub fn lookup(&self, id: &RecordId) -> IndexResult<&ManifestEntry> {
        self.entries
            .get(id)
            .ok_or_else(|| IndexError::NotFound(id.clone()))
    }

    /// Whether an entry exists for `id`.
    pub fn contains(&self, id: &RecordId) -> bool {
        self.entries.contains_key(id)
    }

    /// All entries, ordered by id.
    pub fn entries(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.values()
    }

    /// Number of entries in the ledger.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The manifest document path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Regenerate the ledger purely by scanning the record store.
    ///
    /// Disaster recovery for when the manifest and the stored records have
    /// drifted apart. Fetchable records become entries whose `created_at`
    /// is the record's own timestamp; lifecycle status is preserved from
    /// the prior ledger when known, otherwise taken from the record. An
    /// unreadable container becomes a `Flagged` entry hashing the raw
    /// container bytes, with a note naming the corruption. The superseded
    /// manifest document is copied into the archive area before the
    /// rewrite.
    pub fn rebuild(&mut self, records: &RecordStore) -> IndexResult<ManifestRebuildReport> {
        self.archive_current()?;

        let mut rebuilt = BTreeMap::new();
        let mut flagged = Vec::new();
        for id in records.ids()? {
            let prior = self.entries.get(&id);
            match records.fetch_payload(&id) {
                Ok(payload) => {
                    let record: memvault_types::Record = match serde_json::from_slice(&payload) {
                        Ok(record) => record,
                        Err(e) => {
                            flagged.push(id.clone());
                            rebuilt.insert(
                                id.clone(),
                                Self::flagged_entry(
                                    records,
                                    &id,
                                    prior,
                                    &format!("payload is not a valid record: {e}"),
                                )?,
                            );
                            continue;
                        }
                    };
                    let status = prior.map(|p| p.status).unwrap_or(record.decision);
                    let entry = ManifestEntry::new(
                        id.clone(),
                        ContentHash::of(&payload),
                        records.location(&id),
                        status,
                        record.timestamp,
                        payload.len() as u64,
                    );
                    rebuilt.insert(id, entry);
                }
                Err(StoreError::CorruptContainer { reason, .. }) => {
                    warn!(id = %id, reason = %reason, "flagging corrupt container during rebuild");
                    flagged.push(id.clone());
                    rebuilt.insert(
                        id.clone(),
                        Self::flagged_entry(records, &id, prior, &reason)?,
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.entries = rebuilt;
        self.persist()?;
        info!(
            total = self.entries.len(),
            flagged = flagged.len(),
            "manifest rebuilt from record store"
        );
        Ok(ManifestRebuildReport {
            total: self.entries.len(),
            flagged,
        })
    }

    /// Build a deterministic `Flagged` entry for an unreadable container.
    fn flagged_entry(
        records: &RecordStore,
        id: &RecordId,
        prior: Option<&ManifestEntry>,
        reason: &str,
    ) -> IndexResult<ManifestEntry> {
        let raw = fs::read(records.container_path(id))?;
        // Anything deterministic works for created_at here; prior ledger
        // knowledge beats the epoch placeholder.
        let created_at: DateTime<Utc> = prior
            .map(|p| p.created_at)
            .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap_or_default());
        Ok(ManifestEntry::new(
            id.clone(),
            ContentHash::of(&raw),
            records.location(id),
            LifecycleStatus::Flagged,
            created_at,
            raw.len() as u64,
        )
        .with_note(reason))
    }

    fn persist(&self) -> IndexResult<()> {
        let doc = ManifestDocument {
            version: MANIFEST_VERSION,
            entries: self.entries.clone(),
        };
        self.writer
            .replace_validated(&self.path, &doc, validate_manifest)?;
        Ok(())
    }

    /// Copy the current manifest document into the archive area.
    fn archive_current(&self) -> IndexResult<()> {
        if !self.path.exists() {
            return Ok(());
        }
        fs::create_dir_all(&self.archive_dir)?;
        let stamp = Utc::now().format("%Y%m%d_%H%M%S%3f");
        let target = self.archive_dir.join(format!("manifest_{stamp}.json"));
        fs::copy(&self.path, &target)?;
        info!(archive = %target.display(), "superseded manifest archived");
        Ok(())
    }
}

/// Structural validator for the manifest document.
fn validate_manifest(doc: &serde_json::Value) -> Result<(), String> {
    if !doc.get("version").map_or(false, |v| v.is_u64()) {
        return Err("manifest version must be an unsigned integer".into());
    }
    if !doc.get("entries").map_or(false, |e| e.is_object()) {
        return Err("manifest entries must be an object keyed by id".into());
    }
    Ok(())
}
