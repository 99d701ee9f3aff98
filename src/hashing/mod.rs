//! BLAKE3 hashing for cache keys and storage file names.

use blake3::Hasher;

/// Full 32-byte BLAKE3 hash of a text; the text half of an embedding cache key.
#[inline]
pub fn hash_text(text: &str) -> [u8; 32] {
    *blake3::hash(text.as_bytes()).as_bytes()
}

/// Lowercase hex form of [`hash_text`].
#[inline]
pub fn hash_text_hex(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Computes a 64-bit hash of the input data using BLAKE3, truncated from 256 bits.
///
/// Used for short identifiers only (log fields, principal tags). Anything that must not
/// collide (cache keys, file names) uses the full 256-bit hash.
#[inline]
pub fn hash_to_u64(data: &[u8]) -> u64 {
    let hash = blake3::hash(data);
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash.as_bytes()[0..8]);
    u64::from_le_bytes(bytes)
}

/// Hashes an arbitrary record key into a file-system safe hex name.
#[inline]
pub fn hash_record_key(collection: &str, key: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(collection.as_bytes());
    hasher.update(b"|");
    hasher.update(key.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Derives the storage key for an embedding: hex text hash plus model version.
///
/// Identical text under different model versions yields different keys.
#[inline]
pub fn embedding_key(text_hash: &[u8; 32], model_version: &str) -> String {
    let mut out = String::with_capacity(64 + 1 + model_version.len());
    for byte in text_hash {
        out.push_str(&format!("{:02x}", byte));
    }
    out.push(':');
    out.push_str(model_version);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_hash_text_determinism() {
        let text = "The quarterly report shows revenue growth.";

        let hash1 = hash_text(text);
        let hash2 = hash_text(text);

        assert_eq!(hash1, hash2);
    }

    #[test]
    fn test_hash_text_uniqueness() {
        let texts = ["cat", "Cat", "cat ", "dog"];

        let hashes: HashSet<_> = texts.iter().map(|t| hash_text(t)).collect();

        assert_eq!(hashes.len(), texts.len());
    }

    #[test]
    fn test_hash_text_empty_string() {
        let hash = hash_text("");
        assert!(!hash.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_hash_text_hex_matches_bytes() {
        let hex = hash_text_hex("abc");
        assert_eq!(hex.len(), 64);
        assert_eq!(&embedding_key(&hash_text("abc"), "m")[..64], hex.as_str());
    }

    #[test]
    fn test_hash_to_u64_determinism() {
        assert_eq!(hash_to_u64(b"principal-1"), hash_to_u64(b"principal-1"));
        assert_ne!(hash_to_u64(b"principal-1"), hash_to_u64(b"principal-2"));
    }

    #[test]
    fn test_hash_record_key_separator_prevents_ambiguity() {
        assert_ne!(hash_record_key("ab", "cd"), hash_record_key("abc", "d"));
        assert_ne!(hash_record_key("a", "bcd"), hash_record_key("ab", "cd"));
    }

    #[test]
    fn test_embedding_key_is_version_scoped() {
        let hash = hash_text("identical text");

        let v1 = embedding_key(&hash, "model-v1");
        let v2 = embedding_key(&hash, "model-v2");

        assert_ne!(v1, v2);
        assert!(v1.ends_with(":model-v1"));
    }
}
