use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use memvault_types::{ContentHash, Record, RecordId};
use tracing::{debug, info, warn};

use crate::container;
use crate::document::write_bytes_atomic;
use crate::error::{StoreError, StoreResult};
use crate::lock::LockTable;

/// How a fetched record should be presented.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchMode {
    /// The parsed record structure.
    Raw,
    /// A human-readable rendering of the record.
    Text,
}

/// A fetched record in the requested presentation.
#[derive(Clone, Debug, PartialEq)]
pub enum Fetched {
    Raw(Box<Record>),
    Text(String),
}

/// Outcome of a container write.
#[derive(Clone, Debug)]
pub struct StoredRecordInfo {
    /// Hash of the stored payload.
    pub hash: ContentHash,
    /// Container path relative to the storage root.
    pub location: String,
    /// Uncompressed payload size in bytes.
    pub size: u64,
    /// `true` if an identical container already existed (no-op write).
    pub duplicate: bool,
    /// `true` if a differing container was moved to the archive area.
    pub archived_previous: bool,
}

/// Compressed per-record store: one container file per record id.
///
/// Built on the atomic byte writer, so a container is either fully the old
/// version or fully the new one. At most one *current* container exists per
/// id; superseded versions are copied into the archive area with a
/// timestamped name before the replacement renames over them, never
/// silently overwritten in place. Access is always point lookup by id;
/// containers are deliberately not range-scannable.
pub struct RecordStore {
    root: PathBuf,
    records_dir: PathBuf,
    archive_dir: PathBuf,
    locks: Arc<LockTable>,
    compression_level: i32,
}

impl RecordStore {
    /// Directory under the root holding current containers.
    pub const RECORDS_DIR: &'static str = "records";
    /// Directory under the root holding superseded containers.
    pub const ARCHIVE_DIR: &'static str = "archive";

    /// Open (or create) the records area under `root`.
    pub fn open(
        root: impl Into<PathBuf>,
        locks: Arc<LockTable>,
        compression_level: i32,
    ) -> StoreResult<Self> {
        let root = root.into();
        let records_dir = root.join(Self::RECORDS_DIR);
        let archive_dir = root.join(Self::ARCHIVE_DIR);
        fs::create_dir_all(&records_dir)?;
        fs::create_dir_all(&archive_dir)?;
        Ok(Self {
            root,
            records_dir,
            archive_dir,
            locks,
            compression_level,
        })
    }

    /// Absolute path of the container for `id`.
    pub fn container_path(&self, id: &RecordId) -> PathBuf {
        self.records_dir
            .join(format!("{id}.{}", container::EXTENSION))
    }

    /// Container path relative to the storage root, as stored in the
    /// manifest.
    pub fn location(&self, id: &RecordId) -> String {
        format!("{}/{id}.{}", Self::RECORDS_DIR, container::EXTENSION)
    }

    /// Serialize a record to its canonical payload bytes.
    ///
    /// The content hash in the manifest covers exactly these bytes.
    pub fn canonical_payload(record: &Record) -> StoreResult<Vec<u8>> {
        serde_json::to_vec(record).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Write one compressed container for `record`.
    ///
    /// Idempotent for identical content: re-storing the same bytes under
    /// the same id is a no-op. Differing content supersedes the existing
    /// container, which is first copied to the archive area. The copy
    /// keeps the current container in place until the replacement renames
    /// over it, so a current container exists at every instant and the
    /// manifest never points at nothing.
    pub fn store(&self, record: &Record) -> StoreResult<StoredRecordInfo> {
        let payload = Self::canonical_payload(record)?;
        let hash = ContentHash::of(&payload);
        let path = self.container_path(&record.id);
        // Encode before touching anything on disk: an encode failure must
        // not leave a half-superseded container behind.
        let encoded = container::encode(&record.id, &payload, self.compression_level)?;

        let _guard = self.locks.acquire(&path)?;

        let mut archived_previous = false;
        match fs::read(&path) {
            Ok(existing) => {
                let identical = container::decode(&record.id, &existing)
                    .map(|old| ContentHash::of(&old) == hash)
                    .unwrap_or(false);
                if identical {
                    debug!(id = %record.id, "identical container already stored");
                    return Ok(StoredRecordInfo {
                        hash,
                        location: self.location(&record.id),
                        size: payload.len() as u64,
                        duplicate: true,
                        archived_previous: false,
                    });
                }
                self.archive_container(&record.id, &path)?;
                archived_previous = true;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        write_bytes_atomic(&path, &encoded)?;
        info!(
            id = %record.id,
            payload_bytes = payload.len(),
            container_bytes = encoded.len(),
            "record stored"
        );
        Ok(StoredRecordInfo {
            hash,
            location: self.location(&record.id),
            size: payload.len() as u64,
            duplicate: false,
            archived_previous,
        })
    }

    /// Fetch the decoded payload bytes for `id`.
    pub fn fetch_payload(&self, id: &RecordId) -> StoreResult<Vec<u8>> {
        let path = self.container_path(id);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        container::decode(id, &data)
    }

    /// Fetch the parsed record for `id`.
    pub fn fetch_raw(&self, id: &RecordId) -> StoreResult<Record> {
        let payload = self.fetch_payload(id)?;
        serde_json::from_slice(&payload).map_err(|e| StoreError::CorruptContainer {
            id: id.clone(),
            reason: format!("payload is not a valid record: {e}"),
        })
    }

    /// Fetch the human-readable rendering for `id`.
    pub fn fetch_text(&self, id: &RecordId) -> StoreResult<String> {
        Ok(render_text(&self.fetch_raw(id)?))
    }

    /// Fetch `id` in the requested presentation.
    pub fn fetch(&self, id: &RecordId, mode: FetchMode) -> StoreResult<Fetched> {
        match mode {
            FetchMode::Raw => Ok(Fetched::Raw(Box::new(self.fetch_raw(id)?))),
            FetchMode::Text => Ok(Fetched::Text(self.fetch_text(id)?)),
        }
    }

    /// Whether a container exists for `id`.
    pub fn exists(&self, id: &RecordId) -> bool {
        self.container_path(id).exists()
    }

    /// All ids with a current container, sorted.
    pub fn ids(&self) -> StoreResult<Vec<RecordId>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.records_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(container::EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match RecordId::new(stem) {
                Ok(id) => ids.push(id),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "skipping unusable container name");
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// The storage root this store was opened under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Copy a superseded container into the archive area.
    ///
    /// A copy, not a move: the current container must stay at its path
    /// until the replacement atomically renames over it.
    fn archive_container(&self, id: &RecordId, path: &Path) -> StoreResult<()> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S%3f");
        let mut target = self
            .archive_dir
            .join(format!("{id}_{stamp}.{}", container::EXTENSION));
        let mut attempt = 1;
        while target.exists() {
            target = self
                .archive_dir
                .join(format!("{id}_{stamp}_{attempt}.{}", container::EXTENSION));
            attempt += 1;
        }
        fs::copy(path, &target)?;
        info!(id = %id, archive = %target.display(), "superseded container archived");
        Ok(())
    }
}

/// Render a record in the strict human-readable format.
fn render_text(record: &Record) -> String {
    let mut out = String::new();
    out.push_str(&format!("{{Header: {}}}\n", record.title));
    out.push_str(&format!("ID: {}\n", record.id));
    out.push_str(&format!("Timestamp: {}\n", record.timestamp.to_rfc3339()));
    out.push_str(&format!("Topics: {}\n", record.topics.join(", ")));
    out.push_str(&format!("Keywords: {}\n", record.keywords.join(", ")));
    out.push('\n');
    out.push_str(&record.raw);
    if !record.raw.ends_with('\n') {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use memvault_types::LifecycleStatus;
    use proptest::prelude::*;

    fn make_store(root: &Path) -> RecordStore {
        RecordStore::open(
            root,
            Arc::new(LockTable::default()),
            container::DEFAULT_COMPRESSION_LEVEL,
        )
        .unwrap()
    }

    fn make_record(title: &str, raw: &str) -> Record {
        let mut record = Record::from_payload(title, raw);
        record.topics = vec!["workflow".into()];
        record.keywords = vec!["canvas".into(), "schema".into()];
        record.relevance = 0.8;
        record.decision = LifecycleStatus::Kept;
        record
    }

    #[test]
    fn store_then_fetch_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(dir.path());
        let record = make_record("a chat", "User: hi\nAssistant: hello");

        let info = store.store(&record).unwrap();
        assert!(!info.duplicate);
        assert_eq!(info.location, format!("records/{}.mvz", record.id));

        let fetched = store.fetch_raw(&record.id).unwrap();
        assert_eq!(fetched, record);
    }

    #[test]
    fn fetch_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(dir.path());
        let err = store.fetch_raw(&RecordId::new("nope").unwrap()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn identical_restore_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(dir.path());
        let record = make_record("t", "content");

        store.store(&record).unwrap();
        let info = store.store(&record).unwrap();
        assert!(info.duplicate);
        assert!(!info.archived_previous);
        // Nothing landed in the archive.
        assert_eq!(fs::read_dir(dir.path().join("archive")).unwrap().count(), 0);
    }

    #[test]
    fn superseding_content_archives_the_old_container() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(dir.path());
        let mut record = make_record("t", "content");
        store.store(&record).unwrap();
        let old_bytes = fs::read(store.container_path(&record.id)).unwrap();

        record.title = "retitled".into();
        let info = store.store(&record).unwrap();
        assert!(info.archived_previous);

        let archived: Vec<_> = fs::read_dir(dir.path().join("archive"))
            .unwrap()
            .filter_map(|e| e.ok())
            .collect();
        assert_eq!(archived.len(), 1);
        assert_eq!(fs::read(archived[0].path()).unwrap(), old_bytes);
        assert_eq!(store.fetch_raw(&record.id).unwrap().title, "retitled");
    }

    #[test]
    fn archiving_keeps_the_current_container_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(dir.path());
        let record = make_record("t", "content");
        store.store(&record).unwrap();
        let path = store.container_path(&record.id);
        let original = fs::read(&path).unwrap();

        store.archive_container(&record.id, &path).unwrap();

        // The current container stays put until a replacement renames over
        // it; a crash after archiving can never strand the manifest.
        assert_eq!(fs::read(&path).unwrap(), original);
        assert!(store.fetch_raw(&record.id).is_ok());
    }

    #[test]
    fn corruption_is_confined_to_one_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(dir.path());
        let good = make_record("good", "good content");
        let bad = make_record("bad", "bad content");
        store.store(&good).unwrap();
        store.store(&bad).unwrap();

        fs::write(store.container_path(&bad.id), b"garbage").unwrap();

        assert!(matches!(
            store.fetch_raw(&bad.id),
            Err(StoreError::CorruptContainer { .. })
        ));
        assert_eq!(store.fetch_raw(&good.id).unwrap(), good);
    }

    #[test]
    fn text_mode_renders_header_and_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(dir.path());
        let record = make_record("a chat", "User: hi");
        store.store(&record).unwrap();

        let text = store.fetch_text(&record.id).unwrap();
        assert!(text.starts_with("{Header: a chat}\n"));
        assert!(text.contains(&format!("ID: {}\n", record.id)));
        assert!(text.contains("Keywords: canvas, schema"));
        assert!(text.ends_with("User: hi\n"));
    }

    #[test]
    fn ids_are_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = make_store(dir.path());
        for raw in ["zebra", "apple", "mango"] {
            store.store(&make_record("t", raw)).unwrap();
        }
        let ids = store.ids().unwrap();
        assert_eq!(ids.len(), 3);
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
    }

    proptest! {
        #[test]
        fn round_trip_property(title in ".{0,40}", raw in ".{1,400}") {
            let dir = tempfile::tempdir().unwrap();
            let store = make_store(dir.path());
            let record = Record::from_payload(title, raw);
            store.store(&record).unwrap();
            prop_assert_eq!(store.fetch_raw(&record.id).unwrap(), record);
        }
    }
}
