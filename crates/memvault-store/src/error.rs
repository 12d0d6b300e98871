use memvault_types::RecordId;

/// Errors from storage primitive operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A per-resource lock could not be acquired within the bounded wait.
    #[error("timed out waiting for lock on {resource}")]
    LockTimeout { resource: String },

    /// An append or replace could not be made durable, or failed its
    /// post-write verification.
    #[error("write to {path} failed: {reason}")]
    WriteFailed { path: String, reason: String },

    /// Structural validation failed on a whole-document write.
    #[error("schema violation in {path}: {reason}")]
    Schema { path: String, reason: String },

    /// A compressed container is unreadable or its inner entry is
    /// missing or misnamed.
    #[error("corrupt container for {id}: {reason}")]
    CorruptContainer { id: RecordId, reason: String },

    /// The requested record has no container.
    #[error("record not found: {0}")]
    NotFound(RecordId),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the filesystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
