//! Bookkeeping manifest and derived search index for MemVault.
//!
//! Two documents with very different authority:
//!
//! - [`Manifest`]: the authoritative ledger: one entry per stored record
//!   (hash, location, lifecycle status). Updated by whole-document replace
//!   only, and only after the record itself is durably stored.
//! - [`SearchIndex`]: a derived keyword → id mapping. Fully recomputable
//!   from the record store; corruption here is non-fatal and self-healing
//!   via [`SearchIndex::rebuild`], and must never block ingestion.
//!
//! The manifest is bookkeeping only; interactive search is always served
//! by the search index, never by the ledger.

pub mod error;
pub mod manifest;
pub mod search;

pub use error::{IndexError, IndexResult};
pub use manifest::{Manifest, ManifestRebuildReport, MANIFEST_VERSION};
pub use search::{QueryMatches, SearchEntry, SearchIndex};
