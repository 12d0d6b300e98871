use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use memvault_store::{DocumentWriter, RecordStore, StoreError};
use memvault_types::{Record, RecordId};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::IndexResult;

/// Current search index document version.
const SEARCH_VERSION: u32 = 1;

/// Search index path relative to the storage root.
pub const SEARCH_FILE: &str = "index/search.json";

/// Searchable fields for one record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchEntry {
    /// Record title.
    pub title: String,
    /// Keywords and topic tags, lowercased.
    pub keywords: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct SearchDocument {
    version: u32,
    entries: BTreeMap<RecordId, SearchEntry>,
}

/// Derived keyword → id mapping. Never authoritative.
///
/// Everything here is recomputable from the record store, so corruption is
/// non-fatal by design: an unreadable document loads as empty (with a
/// warning) and [`rebuild`](SearchIndex::rebuild) restores it. A broken
/// search index must never block ingestion or storage; callers downgrade
/// index failures to warnings on the store path.
pub struct SearchIndex {
    path: PathBuf,
    writer: DocumentWriter,
    entries: BTreeMap<RecordId, SearchEntry>,
}

impl SearchIndex {
    /// Open the search index under `root`. Unreadable or malformed
    /// documents load as empty rather than failing.
    pub fn open(root: &Path, writer: DocumentWriter) -> Self {
        let path = root.join(SEARCH_FILE);
        let entries = match fs::read(&path) {
            Ok(data) => match serde_json::from_slice::<SearchDocument>(&data) {
                Ok(doc) if doc.version == SEARCH_VERSION => doc.entries,
                Ok(doc) => {
                    warn!(
                        version = doc.version,
                        "unsupported search index version; starting empty (rebuild to restore)"
                    );
                    BTreeMap::new()
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "search index unreadable; starting empty (rebuild to restore)"
                    );
                    BTreeMap::new()
                }
            },
            Err(_) => BTreeMap::new(),
        };
        Self {
            path,
            writer,
            entries,
        }
    }

    /// Upsert the searchable fields for `id` and persist the document.
    pub fn index(
        &mut self,
        id: RecordId,
        title: impl Into<String>,
        keywords: Vec<String>,
    ) -> IndexResult<()> {
        let keywords = keywords.into_iter().map(|k| k.to_lowercase()).collect();
        self.entries.insert(
            id,
            SearchEntry {
                title: title.into(),
                keywords,
            },
        );
        self.persist()
    }

    /// Upsert straight from a record.
    pub fn index_record(&mut self, record: &Record) -> IndexResult<()> {
        self.index(
            record.id.clone(),
            record.title.clone(),
            record.search_terms(),
        )
    }

    /// Query by case-insensitive substring containment against id, title,
    /// and keyword set.
    ///
    /// Returns a lazy, finite, restartable sequence of ids, ranked id
    /// match first, then title match, then keyword match, ties broken by
    /// id ordering.
    pub fn query(&self, term: &str) -> QueryMatches {
        let needle = term.to_lowercase();
        let mut scored: Vec<(u8, &RecordId)> = self
            .entries
            .iter()
            .filter_map(|(id, entry)| {
                let score = if id.as_str().to_lowercase().contains(&needle) {
                    3
                } else if entry.title.to_lowercase().contains(&needle) {
                    2
                } else if entry.keywords.iter().any(|k| k.contains(&needle)) {
                    1
                } else {
                    return None;
                };
                Some((score, id))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
        QueryMatches {
            matches: scored.into_iter().map(|(_, id)| id.clone()).collect(),
            pos: 0,
        }
    }

    /// Recompute the whole document from the record store. Corrupt
    /// containers are skipped with a warning; rebuilding search must
    /// succeed even when individual records cannot be read.
    pub fn rebuild(&mut self, records: &RecordStore) -> IndexResult<usize> {
        let mut rebuilt = BTreeMap::new();
        for id in records.ids()? {
            match records.fetch_raw(&id) {
                Ok(record) => {
                    rebuilt.insert(
                        id,
                        SearchEntry {
                            title: record.title.clone(),
                            keywords: record.search_terms(),
                        },
                    );
                }
                Err(StoreError::CorruptContainer { reason, .. }) => {
                    warn!(id = %id, reason = %reason, "skipping corrupt container during index rebuild");
                }
                Err(e) => return Err(e.into()),
            }
        }
        self.entries = rebuilt;
        self.persist()?;
        info!(entries = self.entries.len(), "search index rebuilt");
        Ok(self.entries.len())
    }

    /// Number of indexed records.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The search index document path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> IndexResult<()> {
        let doc = SearchDocument {
            version: SEARCH_VERSION,
            entries: self.entries.clone(),
        };
        self.writer.replace(&self.path, &doc)?;
        Ok(())
    }
}

/// A finite, restartable sequence of query matches, best first.
#[derive(Clone, Debug)]
pub struct QueryMatches {
    matches: Vec<RecordId>,
    pos: usize,
}

impl QueryMatches {
    /// Rewind to the first match.
    pub fn restart(&mut self) {
        self.pos = 0;
    }

    /// Total number of matches, regardless of iteration position.
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    /// Returns `true` if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

impl Iterator for QueryMatches {
    type Item = RecordId;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.matches.get(self.pos).cloned();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }
}
