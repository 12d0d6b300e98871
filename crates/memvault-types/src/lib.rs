//! Foundation types for MemVault.
//!
//! This crate provides the data model shared by every other MemVault crate:
//! record identifiers, the record schema itself, manifest bookkeeping
//! entries, and append-only log events.
//!
//! # Key Types
//!
//! - [`RecordId`]: Compact identifier, derived from a record's content hash
//! - [`ContentHash`]: Full BLAKE3 content hash used for integrity checks
//! - [`Record`]: A single archived conversation entry (tagged schema)
//! - [`LifecycleStatus`]: Classification decision attached to each record
//! - [`ManifestEntry`]: Bookkeeping ledger entry, one per stored record
//! - [`LogEvent`]: Append-only audit event (timestamp, action, context)

pub mod error;
pub mod event;
pub mod id;
pub mod manifest;
pub mod record;

pub use error::TypeError;
pub use event::{ActionKind, LogEvent};
pub use id::{ContentHash, RecordId};
pub use manifest::ManifestEntry;
pub use record::{LifecycleStatus, Record, CURRENT_SCHEMA_VERSION};
