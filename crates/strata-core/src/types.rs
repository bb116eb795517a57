//! Common types for strata.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 128-bit content hash used as a cache key.
///
/// The value is opaque: equality, ordering and hashing are bitwise, and the
/// cache never interprets the bytes. Keys are produced by an external
/// collaborator (see [`crate::hashing::HashFunction`] for the providers
/// shipped with this crate).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HashId([u8; 16]);

impl HashId {
    /// The all-zero id. Used as the default archive fingerprint.
    pub const ZERO: Self = Self([0u8; 16]);

    /// Create an id from raw bytes.
    #[must_use]
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Render as a 32-character lowercase hex string.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a 32-character hex string.
    ///
    /// Returns `None` if the input does not decode to exactly 16 bytes.
    #[must_use]
    pub fn from_hex(s: &str) -> Option<Self> {
        let decoded = hex::decode(s).ok()?;
        let bytes: [u8; 16] = decoded.try_into().ok()?;
        Some(Self(bytes))
    }
}

impl fmt::Display for HashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for HashId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HashId({})", self.to_hex())
    }
}

impl From<[u8; 16]> for HashId {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let id = HashId::new([0xab; 16]);
        let hex = id.to_hex();
        assert_eq!(hex.len(), 32);
        assert_eq!(HashId::from_hex(&hex), Some(id));
    }

    #[test]
    fn test_from_hex_rejects_bad_input() {
        assert!(HashId::from_hex("not hex").is_none());
        assert!(HashId::from_hex("abcd").is_none());
    }

    #[test]
    fn test_ordering_is_bitwise() {
        let lo = HashId::new([0u8; 16]);
        let hi = HashId::new([0xff; 16]);
        assert!(lo < hi);
        assert_eq!(lo, HashId::ZERO);
    }

    #[test]
    fn test_display_is_hex() {
        let id = HashId::new([0x01; 16]);
        assert_eq!(format!("{}", id), "01".repeat(16));
    }
}
