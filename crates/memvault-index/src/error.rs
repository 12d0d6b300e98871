use memvault_store::StoreError;
use memvault_types::RecordId;

/// Errors from manifest and search index operations.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// No manifest entry for the requested id.
    #[error("no manifest entry for {0}")]
    NotFound(RecordId),

    /// The persisted document does not have the expected shape.
    #[error("malformed document {path}: {reason}")]
    Malformed { path: String, reason: String },

    /// Error from the underlying storage primitives.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// I/O error outside the storage primitives (e.g. archiving).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;
