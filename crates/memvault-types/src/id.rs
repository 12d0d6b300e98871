use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Domain tag prepended to every record-id hash computation.
///
/// Keeps record ids from colliding with any other BLAKE3 use in the system
/// and pins the derivation so the same payload always maps to the same id.
const RECORD_ID_DOMAIN: &str = "memvault-record-v1";

/// Number of hex characters kept when deriving an id from a content hash.
const DERIVED_ID_LEN: usize = 16;

/// Compact, stable identifier for a record.
///
/// Two ways to obtain one:
///
/// - [`RecordId::derive`]: a pure function of the record's raw payload
///   (truncated domain-separated BLAKE3). Re-ingesting identical content
///   always produces the same id, which is what makes duplicate detection
///   work without a separate index.
/// - [`RecordId::new`]: adopt an id that already exists, e.g. when
///   migrating a legacy store that assigned its own keys.
///
/// Ids become file names, so they must be non-empty and free of path
/// separators and whitespace.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Derive an id from raw payload content.
    pub fn derive(payload: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(RECORD_ID_DOMAIN.as_bytes());
        hasher.update(b":");
        hasher.update(payload.as_bytes());
        let hash = hasher.finalize();
        Self(hex::encode(&hash.as_bytes()[..DERIVED_ID_LEN / 2]))
    }

    /// Adopt an existing id, validating that it is usable as a file name.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TypeError::InvalidRecordId(id, "empty id".into()));
        }
        if id.chars().any(|c| c == '/' || c == '\\' || c.is_whitespace()) {
            return Err(TypeError::InvalidRecordId(
                id,
                "ids may not contain path separators or whitespace".into(),
            ));
        }
        Ok(Self(id))
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Full BLAKE3 content hash of a record's serialized form.
///
/// Stored in the manifest and compared on re-ingest to distinguish a
/// duplicate (same id, same hash) from a superseding write (same id,
/// different hash).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash raw bytes with domain separation.
    pub fn of(data: &[u8]) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(RECORD_ID_DOMAIN.as_bytes());
        hasher.update(b":");
        hasher.update(data);
        Self(*hasher.finalize().as_bytes())
    }

    /// The raw 32-byte hash.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full hex-encoded string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string (64 hex characters).
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != 32 {
            return Err(TypeError::InvalidLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; 32];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({}..)", &self.to_hex()[..8])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_is_deterministic() {
        let id1 = RecordId::derive("User: hello\nAssistant: hi");
        let id2 = RecordId::derive("User: hello\nAssistant: hi");
        assert_eq!(id1, id2);
        assert_eq!(id1.as_str().len(), DERIVED_ID_LEN);
    }

    #[test]
    fn different_payloads_produce_different_ids() {
        let id1 = RecordId::derive("payload one");
        let id2 = RecordId::derive("payload two");
        assert_ne!(id1, id2);
    }

    #[test]
    fn derived_ids_are_lowercase_hex() {
        let id = RecordId::derive("anything");
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn adopted_id_rejects_path_separators() {
        assert!(RecordId::new("../escape").is_err());
        assert!(RecordId::new("a b").is_err());
        assert!(RecordId::new("").is_err());
        assert!(RecordId::new("legacy-042").is_ok());
    }

    #[test]
    fn content_hash_round_trips_through_hex() {
        let hash = ContentHash::of(b"some record bytes");
        let parsed = ContentHash::from_hex(&hash.to_hex()).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn content_hash_serializes_as_hex_string() {
        let hash = ContentHash::of(b"x");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{}\"", hash.to_hex()));
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    #[test]
    fn bad_hex_is_rejected() {
        assert!(ContentHash::from_hex("zz").is_err());
        assert!(ContentHash::from_hex("abcd").is_err());
    }
}
