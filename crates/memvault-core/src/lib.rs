//! The MemVault context object.
//!
//! [`Vault`] ties the storage primitives together behind one explicit,
//! caller-owned handle: compressed record containers, the bookkeeping
//! manifest, the derived search index, and the append-only event log.
//! There is no ambient global state; every operation goes through a
//! `Vault` the caller opened, and state is loaded at open and flushed on
//! every mutation.
//!
//! All operations run synchronously on the calling thread; safety comes
//! from cooperative per-resource locking with a bounded wait, not from a
//! scheduler. One process holds write ownership of a storage root at a
//! time; concurrent readers are always safe.

pub mod config;
pub mod error;
pub mod migrate;
pub mod vault;

pub use config::VaultConfig;
pub use error::{VaultError, VaultResult};
pub use migrate::MigrationReport;
pub use vault::{BatchOutcome, StoreOutcome, Vault};

// Re-export the types callers need to drive a vault.
pub use memvault_index::{ManifestRebuildReport, QueryMatches};
pub use memvault_store::{FetchMode, Fetched};
pub use memvault_types::{
    ActionKind, LifecycleStatus, LogEvent, ManifestEntry, Record, RecordId,
};
