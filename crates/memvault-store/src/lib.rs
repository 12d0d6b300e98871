//! Durable storage primitives for MemVault.
//!
//! Everything above this crate composes four primitives:
//!
//! - [`LockTable`]: named per-resource locks with a bounded wait; on
//!   expiry the caller gets [`StoreError::LockTimeout`] instead of hanging.
//! - [`AppendLog`]: durable line-append for the event history. O(1) per
//!   append, fsync on every write, and a reader that tolerates the torn
//!   trailing line a crash can leave behind.
//! - [`DocumentWriter`]: atomic whole-document replacement via a temp file
//!   and rename on the same volume. Replacing and appending are two
//!   distinct named operations, so an append can never silently become a
//!   destructive overwrite.
//! - [`RecordStore`]: one compressed container per record id. Superseded
//!   containers are preserved in the archive area; corruption is confined
//!   to a single id.
//!
//! # Design Rules
//!
//! 1. A failed write is never silent: durability is verified and
//!    [`StoreError::WriteFailed`] raised when it cannot be.
//! 2. Logs are monotonic, never rewritten in place.
//! 3. Only [`DocumentWriter`] may replace a whole document.
//! 4. All I/O errors are propagated, never swallowed.

pub mod container;
pub mod document;
pub mod error;
pub mod lock;
pub mod log;
pub mod records;

pub use document::DocumentWriter;
pub use error::{StoreError, StoreResult};
pub use lock::{LockTable, ResourceGuard, DEFAULT_LOCK_TIMEOUT};
pub use log::AppendLog;
pub use records::{FetchMode, Fetched, RecordStore, StoredRecordInfo};
