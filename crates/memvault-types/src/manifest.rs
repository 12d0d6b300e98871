use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{ContentHash, RecordId};
use crate::record::LifecycleStatus;

/// Bookkeeping ledger entry: one per stored record.
///
/// Created only after the record is durably persisted, so a crash can leave
/// an orphan container but never a manifest entry pointing at nothing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// The record this entry tracks.
    pub id: RecordId,
    /// Hash of the record's serialized payload.
    pub content_hash: ContentHash,
    /// Container path relative to the storage root.
    pub location: String,
    /// Current lifecycle state.
    pub status: LifecycleStatus,
    /// When the record was first stored.
    pub created_at: DateTime<Utc>,
    /// Uncompressed payload size in bytes.
    pub size: u64,
    /// Set by rebuilds when an entry was flagged (e.g. corrupt container).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ManifestEntry {
    /// Create a fresh entry for a just-stored record.
    pub fn new(
        id: RecordId,
        content_hash: ContentHash,
        location: impl Into<String>,
        status: LifecycleStatus,
        created_at: DateTime<Utc>,
        size: u64,
    ) -> Self {
        Self {
            id,
            content_hash,
            location: location.into(),
            status,
            created_at,
            size,
            note: None,
        }
        .normalize()
    }

    fn normalize(mut self) -> Self {
        // Locations always use forward slashes so the manifest is portable.
        self.location = self.location.replace('\\', "/");
        self
    }

    /// Attach a note (used when a rebuild flags this entry).
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}
