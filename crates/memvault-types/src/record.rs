use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::id::RecordId;

/// Schema version written into every new record.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Classification decision attached to a record by the upstream classifier.
///
/// The storage core never computes these; it persists what it is handed and
/// the manifest tracks them as lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    /// Awaiting review; the default for anything not yet classified.
    Pending,
    /// Classified as relevant and retained.
    Kept,
    /// Uncertain classification or integrity problem; needs human review.
    Flagged,
    /// Classified as irrelevant. The record stays stored; only the ledger
    /// marks it discarded.
    Discarded,
}

impl Default for LifecycleStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Kept => write!(f, "kept"),
            Self::Flagged => write!(f, "flagged"),
            Self::Discarded => write!(f, "discarded"),
        }
    }
}

impl FromStr for LifecycleStatus {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "kept" | "keep" => Ok(Self::Kept),
            "flagged" | "flag" => Ok(Self::Flagged),
            "discarded" | "discard" => Ok(Self::Discarded),
            other => Err(TypeError::UnknownStatus(other.to_string())),
        }
    }
}

/// A single archived conversation entry.
///
/// Records arrive fully formed from the classification collaborator and are
/// immutable once stored. The schema is tagged with an explicit integer
/// version; fields this version does not recognize are preserved verbatim
/// in `extra` so round-trips across schema evolution are lossless.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Stable identifier, normally derived from the payload content.
    pub id: RecordId,
    /// Human-readable title.
    pub title: String,
    /// When the conversation was captured.
    pub timestamp: DateTime<Utc>,
    /// The raw conversation text, untouched.
    pub raw: String,
    /// Topic tags from the classifier.
    #[serde(default)]
    pub topics: Vec<String>,
    /// Search keywords from the classifier.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Relevance score in `[0, 1]` from the classifier.
    #[serde(default)]
    pub relevance: f64,
    /// Lifecycle decision from the classifier.
    #[serde(default)]
    pub decision: LifecycleStatus,
    /// Integer schema version this record was written with.
    pub schema_version: u32,
    /// Unrecognized fields, preserved for lossless round-trips.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Record {
    /// Build a record with an id derived from its payload.
    pub fn from_payload(title: impl Into<String>, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self {
            id: RecordId::derive(&raw),
            title: title.into(),
            timestamp: Utc::now(),
            raw,
            topics: Vec::new(),
            keywords: Vec::new(),
            relevance: 0.0,
            decision: LifecycleStatus::Pending,
            schema_version: CURRENT_SCHEMA_VERSION,
            extra: BTreeMap::new(),
        }
    }

    /// All searchable terms: keywords plus topics, deduplicated, lowercase.
    pub fn search_terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = self
            .keywords
            .iter()
            .chain(self.topics.iter())
            .map(|t| t.to_lowercase())
            .collect();
        terms.sort();
        terms.dedup();
        terms
    }
}
