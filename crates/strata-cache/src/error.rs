//! Error types for cache layer operations.
//!
//! `NotFound` and `NotReady` are normal control-flow signals: a miss tells
//! the caller to consult the next layer or recompute, and a not-ready entry
//! tells it to wait or retry. Only `Io`, `Corrupt` and the compression
//! variants indicate genuine faults.

use strata_core::HashId;
use thiserror::Error;

/// Result type alias for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors that can occur during cache layer operations.
#[derive(Error, Debug)]
pub enum CacheError {
    /// No entry for this key in the layer.
    #[error("entry not found: {0}")]
    NotFound(HashId),

    /// Entry exists but is still reserved or empty.
    #[error("entry not ready: {0}")]
    NotReady(HashId),

    /// A ready entry already exists for this key; data is never overwritten.
    #[error("entry already exists: {0}")]
    AlreadyExists(HashId),

    /// Entry was flagged bad and awaits removal.
    #[error("entry marked bad: {0}")]
    EntryBad(HashId),

    /// Operation not supported by this layer.
    #[error("operation not supported by this layer")]
    Unsupported,

    /// The layer budget is exhausted and eviction could not make room.
    #[error("cache budget exceeded")]
    CapacityExceeded,

    /// The query token was produced by a different layer instance or a
    /// since-evicted entry.
    #[error("query token does not belong to this layer")]
    InvalidToken,

    /// Caller buffer and payload sizes disagree.
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Bytes required.
        expected: usize,
        /// Bytes provided.
        actual: usize,
    },

    /// Timed out waiting for a reserved entry.
    #[error("timed out waiting for entry: {0}")]
    WaitTimeout(HashId),

    /// Archive record damage.
    #[error("archive corrupt: {0}")]
    Corrupt(String),

    /// Compression failure.
    #[error("compression error: {0}")]
    Compression(String),

    /// Decompression failure.
    #[error("decompression error: {0}")]
    Decompression(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_key() {
        let id = HashId::new([0xaa; 16]);
        let msg = format!("{}", CacheError::NotFound(id));
        assert!(msg.contains(&id.to_hex()));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: CacheError = io.into();
        assert!(matches!(err, CacheError::Io(_)));
    }
}
