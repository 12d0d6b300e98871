use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid byte length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("invalid record id {0:?}: {1}")]
    InvalidRecordId(String, String),

    #[error("unknown lifecycle status: {0:?}")]
    UnknownStatus(String),
}
