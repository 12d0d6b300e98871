use memvault_index::IndexError;
use memvault_store::StoreError;
use memvault_types::RecordId;

/// Errors from vault-level operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// Error from the storage primitives.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Error from the manifest or search index.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Post-migration verification found manifest entries whose records
    /// cannot be fetched. The legacy monolith was left untouched.
    #[error("migration verification failed for {} record(s)", failures.len())]
    MigrationVerification { failures: Vec<(RecordId, String)> },

    /// The legacy monolith does not have the expected shape.
    #[error("legacy monolith {path}: {reason}")]
    LegacyFormat { path: String, reason: String },

    /// I/O error outside the storage primitives.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for vault operations.
pub type VaultResult<T> = Result<T, VaultError>;
