//! Compressed per-record container codec.
//!
//! One container file holds exactly one inner entry, named
//! deterministically after the record id. On-disk layout:
//!
//! ```text
//! [4 bytes: magic "MVZ1"]
//! [4 bytes: format version (big-endian u32)]
//! [2 bytes: inner entry name length (big-endian u16)]
//! [N bytes: inner entry name ("<id>.json")]
//! [4 bytes: uncompressed payload size (big-endian u32)]
//! [4 bytes: compressed payload size (big-endian u32)]
//! [4 bytes: CRC32 of the compressed payload (big-endian u32)]
//! [M bytes: zstd-compressed payload]
//! ```
//!
//! Containers trade range-scannability for isolation: every access is a
//! full decode by id, and corruption is confined to a single record.

use memvault_types::RecordId;

use crate::error::{StoreError, StoreResult};

/// File magic for record containers.
pub const MAGIC: &[u8; 4] = b"MVZ1";

/// Current container format version.
pub const FORMAT_VERSION: u32 = 1;

/// File extension used for containers.
pub const EXTENSION: &str = "mvz";

/// Default zstd compression level.
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Fixed header bytes before the inner name: magic + version + name length.
const PREFIX_LEN: usize = 4 + 4 + 2;

/// The deterministic inner entry name for a record id.
pub fn inner_name(id: &RecordId) -> String {
    format!("{id}.json")
}

/// Encode a record payload into container bytes.
pub fn encode(id: &RecordId, payload: &[u8], level: i32) -> StoreResult<Vec<u8>> {
    let name = inner_name(id);
    if name.len() > u16::MAX as usize {
        return Err(StoreError::Serialization(format!(
            "inner entry name too long: {} bytes",
            name.len()
        )));
    }
    let payload_len = header_len(payload.len(), "payload")?;
    let compressed = zstd::encode_all(payload, level)
        .map_err(|e| StoreError::Serialization(format!("zstd encode failed: {e}")))?;
    let compressed_len = header_len(compressed.len(), "compressed payload")?;
    let crc = crc32fast::hash(&compressed);

    let mut out = Vec::with_capacity(PREFIX_LEN + name.len() + 12 + compressed.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&FORMAT_VERSION.to_be_bytes());
    out.extend_from_slice(&(name.len() as u16).to_be_bytes());
    out.extend_from_slice(name.as_bytes());
    out.extend_from_slice(&payload_len.to_be_bytes());
    out.extend_from_slice(&compressed_len.to_be_bytes());
    out.extend_from_slice(&crc.to_be_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Check a length fits the fixed-width header field, failing the encode
/// instead of writing a silently truncated size.
fn header_len(len: usize, what: &str) -> StoreResult<u32> {
    u32::try_from(len).map_err(|_| {
        StoreError::Serialization(format!("{what} too large for container header: {len} bytes"))
    })
}

/// Decode container bytes back into the record payload, verifying the
/// magic, version, inner entry name, CRC, and sizes.
pub fn decode(id: &RecordId, data: &[u8]) -> StoreResult<Vec<u8>> {
    let corrupt = |reason: String| StoreError::CorruptContainer {
        id: id.clone(),
        reason,
    };

    if data.len() < PREFIX_LEN {
        return Err(corrupt(format!("container too short: {} bytes", data.len())));
    }
    if &data[0..4] != MAGIC {
        return Err(corrupt(format!(
            "bad magic: {:?}",
            String::from_utf8_lossy(&data[0..4])
        )));
    }
    let version = u32::from_be_bytes(data[4..8].try_into().expect("sliced 4 bytes"));
    if version != FORMAT_VERSION {
        return Err(corrupt(format!("unsupported container version {version}")));
    }
    let name_len = u16::from_be_bytes(data[8..10].try_into().expect("sliced 2 bytes")) as usize;

    let mut pos = PREFIX_LEN;
    if data.len() < pos + name_len + 12 {
        return Err(corrupt("truncated container header".into()));
    }
    let name = std::str::from_utf8(&data[pos..pos + name_len])
        .map_err(|_| corrupt("inner entry name is not valid UTF-8".into()))?;
    let expected = inner_name(id);
    if name != expected {
        return Err(corrupt(format!(
            "inner entry is named {name:?}, expected {expected:?}"
        )));
    }
    pos += name_len;

    let uncompressed_size =
        u32::from_be_bytes(data[pos..pos + 4].try_into().expect("sliced 4 bytes")) as usize;
    let compressed_size =
        u32::from_be_bytes(data[pos + 4..pos + 8].try_into().expect("sliced 4 bytes")) as usize;
    let expected_crc =
        u32::from_be_bytes(data[pos + 8..pos + 12].try_into().expect("sliced 4 bytes"));
    pos += 12;

    if data.len() != pos + compressed_size {
        return Err(corrupt(format!(
            "compressed size mismatch: header says {compressed_size}, found {}",
            data.len() - pos
        )));
    }
    let compressed = &data[pos..];
    let actual_crc = crc32fast::hash(compressed);
    if actual_crc != expected_crc {
        return Err(corrupt(format!(
            "CRC mismatch: expected {expected_crc:08x}, computed {actual_crc:08x}"
        )));
    }

    let payload = zstd::decode_all(compressed)
        .map_err(|e| corrupt(format!("zstd decode failed: {e}")))?;
    if payload.len() != uncompressed_size {
        return Err(corrupt(format!(
            "uncompressed size mismatch: header says {uncompressed_size}, got {}",
            payload.len()
        )));
    }
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> RecordId {
        RecordId::new(s).unwrap()
    }

    #[test]
    fn encode_decode_round_trip() {
        let payload = br#"{"id":"abc","title":"hello"}"#;
        let encoded = encode(&id("abc"), payload, DEFAULT_COMPRESSION_LEVEL).unwrap();
        let decoded = decode(&id("abc"), &encoded).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn misnamed_inner_entry_is_corrupt() {
        let encoded = encode(&id("abc"), b"payload", 1).unwrap();
        let err = decode(&id("xyz"), &encoded).unwrap_err();
        match err {
            StoreError::CorruptContainer { reason, .. } => {
                assert!(reason.contains("inner entry is named"), "{reason}");
            }
            other => panic!("expected CorruptContainer, got {other:?}"),
        }
    }

    #[test]
    fn flipped_byte_fails_crc() {
        let mut encoded = encode(&id("abc"), b"some payload worth compressing", 3).unwrap();
        let last = encoded.len() - 1;
        encoded[last] ^= 0xff;
        let err = decode(&id("abc"), &encoded).unwrap_err();
        assert!(matches!(err, StoreError::CorruptContainer { .. }));
    }

    #[test]
    fn truncation_is_corrupt_not_panic() {
        let encoded = encode(&id("abc"), b"payload", 3).unwrap();
        for cut in [0, 3, 9, encoded.len() - 1] {
            let err = decode(&id("abc"), &encoded[..cut]).unwrap_err();
            assert!(matches!(err, StoreError::CorruptContainer { .. }));
        }
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut encoded = encode(&id("abc"), b"payload", 3).unwrap();
        encoded[0] = b'X';
        let err = decode(&id("abc"), &encoded).unwrap_err();
        assert!(matches!(err, StoreError::CorruptContainer { .. }));
    }

    #[test]
    fn oversized_lengths_fail_the_encode() {
        assert_eq!(header_len(7, "payload").unwrap(), 7);
        let err = header_len(u32::MAX as usize + 1, "payload").unwrap_err();
        match err {
            StoreError::Serialization(reason) => {
                assert!(reason.contains("too large"), "{reason}");
            }
            other => panic!("expected Serialization, got {other:?}"),
        }
    }

    #[test]
    fn repetitive_payloads_compress_well() {
        // Small structured records are the common case; the container must
        // beat line-delimited plaintext by a wide margin on them.
        let payload = r#"{"role":"user","content":"same line"}"#.repeat(200);
        let encoded = encode(&id("abc"), payload.as_bytes(), 3).unwrap();
        assert!(encoded.len() * 6 < payload.len());
    }
}
