//! Hashing functions.

use crate::types::HashId;

/// Trait for 128-bit hash functions.
///
/// The cache layers treat keys as opaque; these providers exist for callers
/// that derive keys from payload content. Implementations are injected, never
/// looked up through global state.
pub trait HashFunction: Send + Sync {
    /// Hash data into a 128-bit id.
    fn hash_id(&self, data: &[u8]) -> HashId;

    /// Hash data and return the hex form of the id.
    fn hash_hex(&self, data: &[u8]) -> String {
        self.hash_id(data).to_hex()
    }
}

/// XXHash3 hasher - extremely fast, non-cryptographic.
pub struct XxHash3;

impl XxHash3 {
    /// Create a new XXHash3 hasher.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for XxHash3 {
    fn default() -> Self {
        Self::new()
    }
}

impl HashFunction for XxHash3 {
    fn hash_id(&self, data: &[u8]) -> HashId {
        HashId::new(xxhash_rust::xxh3::xxh3_128(data).to_le_bytes())
    }
}

/// Blake3 hasher - cryptographically secure, still fast.
///
/// The 256-bit digest is truncated to the 128-bit key width.
pub struct Blake3Hasher;

impl Blake3Hasher {
    /// Create a new Blake3 hasher.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for Blake3Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl HashFunction for Blake3Hasher {
    fn hash_id(&self, data: &[u8]) -> HashId {
        let hash = blake3::hash(data);
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash.as_bytes()[..16]);
        HashId::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xxhash3_deterministic() {
        let hasher = XxHash3::new();
        let data = b"hello world";

        assert_eq!(hasher.hash_id(data), hasher.hash_id(data));
    }

    #[test]
    fn test_blake3_deterministic() {
        let hasher = Blake3Hasher::new();
        let data = b"hello world";

        assert_eq!(hasher.hash_id(data), hasher.hash_id(data));
    }

    #[test]
    fn test_distinct_inputs_distinct_ids() {
        let hasher = Blake3Hasher::new();
        assert_ne!(hasher.hash_id(b"a"), hasher.hash_id(b"b"));
    }

    #[test]
    fn test_hash_hex_matches_id() {
        let hasher = XxHash3::new();
        let id = hasher.hash_id(b"payload");
        assert_eq!(hasher.hash_hex(b"payload"), id.to_hex());
    }
}
