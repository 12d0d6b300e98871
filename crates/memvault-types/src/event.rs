use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened, for the append-only audit log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// A record was stored (container + manifest + index).
    RecordStored,
    /// A store call matched an existing id with identical content.
    RecordSkippedDuplicate,
    /// A superseded container was preserved in the archive area.
    ContainerArchived,
    /// One legacy entry was migrated.
    RecordMigrated,
    /// A full migration run finished and the monolith was archived.
    MigrationCompleted,
    /// The manifest was regenerated from the record store.
    ManifestRebuilt,
    /// The search index was regenerated.
    IndexRebuilt,
}

/// One line in the append-only event log.
///
/// Events are serialized as single-line JSON and only ever appended; the
/// log is the audit trail of every store/migrate action and is never
/// rewritten in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// When the action happened.
    pub timestamp: DateTime<Utc>,
    /// What kind of action it was.
    pub action: ActionKind,
    /// Free-form context: ids, counts, reasons.
    pub context: serde_json::Value,
}

impl LogEvent {
    /// Create an event stamped with the current time.
    pub fn now(action: ActionKind, context: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            action,
            context,
        }
    }
}
