use std::path::{Path, PathBuf};
use std::sync::Arc;

use memvault_index::{
    Manifest, ManifestRebuildReport, QueryMatches, SearchIndex,
};
use memvault_store::{
    AppendLog, DocumentWriter, FetchMode, Fetched, LockTable, RecordStore,
};
use memvault_types::{
    ActionKind, LogEvent, ManifestEntry, Record, RecordId,
};
use parking_lot::Mutex;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::config::VaultConfig;
use crate::error::{VaultError, VaultResult};

/// Event log path relative to the storage root.
pub const EVENT_LOG_FILE: &str = "logs/events.log";

/// Outcome of a single store call.
#[derive(Clone, Debug)]
pub struct StoreOutcome {
    /// The stored record's id.
    pub id: RecordId,
    /// `true` if an identical record was already stored (logged no-op).
    pub duplicate: bool,
}

/// Outcome of a batch store. One failed record never aborts the batch.
#[derive(Clone, Debug, Default)]
pub struct BatchOutcome {
    /// Ids stored during this batch.
    pub stored: Vec<RecordId>,
    /// Ids skipped as duplicates.
    pub skipped: Vec<RecordId>,
    /// Ids that failed, with the error rendered for the caller to decide
    /// retry or escalation.
    pub failed: Vec<(RecordId, String)>,
}

/// An open storage root: records, manifest, search index, and event log.
///
/// The vault is an explicit context object; callers own it and pass it
/// where needed. Mutating operations take `&self` and serialize through
/// per-resource locks, so concurrent stores to distinct ids proceed in
/// parallel while same-id writers are serialized.
pub struct Vault {
    root: PathBuf,
    records: RecordStore,
    manifest: Mutex<Manifest>,
    search: Mutex<SearchIndex>,
    log: AppendLog,
}

impl Vault {
    /// Open (or create) the vault rooted at `root`.
    pub fn open(root: impl Into<PathBuf>, config: VaultConfig) -> VaultResult<Self> {
        let root = root.into();
        let locks = Arc::new(LockTable::new(config.lock_timeout));

        let records = RecordStore::open(&root, Arc::clone(&locks), config.compression_level)?;
        let manifest = Manifest::open(&root, DocumentWriter::new(Arc::clone(&locks)))?;
        let search = SearchIndex::open(&root, DocumentWriter::new(Arc::clone(&locks)));
        let log = AppendLog::new(root.join(EVENT_LOG_FILE), locks);

        info!(root = %root.display(), records = manifest.len(), "vault opened");
        Ok(Self {
            root,
            records,
            manifest: Mutex::new(manifest),
            search: Mutex::new(search),
            log,
        })
    }

    /// The storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Direct access to the record store (read paths and tests).
    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    /// Persist one record: container first, then manifest entry, then
    /// search index, then the audit event.
    ///
    /// The manifest entry is written only after the container is durable,
    /// so a crash can leave an orphan container but never a dangling
    /// manifest pointer. A search index failure is downgraded to a warning;
    /// a broken derived index must never block ingestion.
    pub fn store(&self, record: &Record) -> VaultResult<StoreOutcome> {
        let info = self.records.store(record)?;

        if info.duplicate && self.manifest.lock().contains(&record.id) {
            self.log.append(&LogEvent::now(
                ActionKind::RecordSkippedDuplicate,
                serde_json::json!({ "id": record.id }),
            ))?;
            return Ok(StoreOutcome {
                id: record.id.clone(),
                duplicate: true,
            });
        }

        self.manifest.lock().upsert(ManifestEntry::new(
            record.id.clone(),
            info.hash,
            info.location.clone(),
            record.decision,
            record.timestamp,
            info.size,
        ))?;

        if let Err(e) = self.search.lock().index_record(record) {
            warn!(id = %record.id, error = %e, "search index update failed; continuing (rebuild to heal)");
        }

        if info.archived_previous {
            self.log.append(&LogEvent::now(
                ActionKind::ContainerArchived,
                serde_json::json!({ "id": record.id }),
            ))?;
        }
        self.log.append(&LogEvent::now(
            ActionKind::RecordStored,
            serde_json::json!({
                "id": record.id,
                "size": info.size,
                "status": record.decision.to_string(),
            }),
        ))?;

        Ok(StoreOutcome {
            id: record.id.clone(),
            duplicate: false,
        })
    }

    /// Store a batch with per-record failure isolation.
    pub fn store_batch(&self, records: &[Record]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for record in records {
            match self.store(record) {
                Ok(result) if result.duplicate => outcome.skipped.push(result.id),
                Ok(result) => outcome.stored.push(result.id),
                Err(e) => {
                    warn!(id = %record.id, error = %e, "record failed during batch store");
                    outcome.failed.push((record.id.clone(), e.to_string()));
                }
            }
        }
        outcome
    }

    /// Fetch a record in the requested presentation.
    pub fn fetch(&self, id: &RecordId, mode: FetchMode) -> VaultResult<Fetched> {
        Ok(self.records.fetch(id, mode)?)
    }

    /// Fetch the parsed record.
    pub fn fetch_raw(&self, id: &RecordId) -> VaultResult<Record> {
        Ok(self.records.fetch_raw(id)?)
    }

    /// Look up the manifest entry for `id`.
    pub fn lookup(&self, id: &RecordId) -> VaultResult<ManifestEntry> {
        Ok(self.manifest.lock().lookup(id)?.clone())
    }

    /// Query the search index by substring containment.
    pub fn query(&self, term: &str) -> QueryMatches {
        self.search.lock().query(term)
    }

    /// Regenerate the manifest from the record store (disaster recovery).
    pub fn rebuild_manifest(&self) -> VaultResult<ManifestRebuildReport> {
        let report = self.manifest.lock().rebuild(&self.records)?;
        self.log.append(&LogEvent::now(
            ActionKind::ManifestRebuilt,
            serde_json::json!({
                "total": report.total,
                "flagged": report.flagged.len(),
            }),
        ))?;
        Ok(report)
    }

    /// Recompute the search index from the record store.
    pub fn rebuild_index(&self) -> VaultResult<usize> {
        let indexed = self.search.lock().rebuild(&self.records)?;
        self.log.append(&LogEvent::now(
            ActionKind::IndexRebuilt,
            serde_json::json!({ "indexed": indexed }),
        ))?;
        Ok(indexed)
    }

    /// Read the full audit event history.
    pub fn events(&self) -> VaultResult<Vec<LogEvent>> {
        Ok(self.log.read_events()?)
    }

    /// Containers present on disk but absent from the manifest.
    ///
    /// A crash between a container write and its manifest upsert leaves
    /// exactly this shape behind; `rebuild_manifest` adopts them.
    pub fn orphans(&self) -> VaultResult<Vec<RecordId>> {
        let manifest = self.manifest.lock();
        let records_dir = self.root.join(RecordStore::RECORDS_DIR);
        let mut orphans = Vec::new();
        for entry in WalkDir::new(&records_dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                VaultError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "walk failed")
                }))
            })?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("mvz") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(id) = RecordId::new(stem) {
                if !manifest.contains(&id) {
                    orphans.push(id);
                }
            }
        }
        orphans.sort();
        Ok(orphans)
    }

    pub(crate) fn log(&self) -> &AppendLog {
        &self.log
    }

    pub(crate) fn manifest(&self) -> &Mutex<Manifest> {
        &self.manifest
    }

    pub(crate) fn search(&self) -> &Mutex<SearchIndex> {
        &self.search
    }
}
