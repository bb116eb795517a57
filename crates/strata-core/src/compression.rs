//! Compression abstractions.

use crate::error::{Result, StrataError};

/// Trait for compression algorithms.
pub trait Compressor: Send + Sync {
    /// Compress data.
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress data.
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;

    /// Decompress with known output size.
    fn decompress_exact(&self, data: &[u8], output_size: usize) -> Result<Vec<u8>> {
        let decompressed = self.decompress(data)?;
        if decompressed.len() != output_size {
            return Err(StrataError::Decompression(format!(
                "Expected {} bytes, got {}",
                output_size,
                decompressed.len()
            )));
        }
        Ok(decompressed)
    }
}

/// Zstd compressor with configurable level.
///
/// Decompression speed is independent of the level used to compress, which
/// lets callers pick a level per workload without affecting readers.
pub struct ZstdCompressor {
    level: i32,
}

impl ZstdCompressor {
    /// Create a new Zstd compressor with default level (3).
    #[must_use]
    pub fn new() -> Self {
        Self::with_level(3)
    }

    /// Create a new Zstd compressor with specified level.
    ///
    /// Level ranges from -7 (fastest) to 22 (best compression).
    /// Typical values: 1-4 for fast, 5-9 for balanced, 10+ for max compression.
    #[must_use]
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }

    /// The configured compression level.
    #[must_use]
    pub fn level(&self) -> i32 {
        self.level
    }
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compressor for ZstdCompressor {
    fn compress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::encode_all(data, self.level).map_err(|e| StrataError::Compression(e.to_string()))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::decode_all(data).map_err(|e| StrataError::Decompression(e.to_string()))
    }
}
