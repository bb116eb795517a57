//! Transparent compression layer.
//!
//! Wraps exactly one next layer. Stores compress the payload and forward the
//! compressed bytes while recording the original size, so callers downstream
//! of the wrapper keep seeing the logical (uncompressed) size through
//! [`QueryResult::data_size`]. Loads fetch the stored bytes from the next
//! layer and decompress into the caller's buffer.
//!
//! Each stored payload carries a one-byte frame marker, so incompressible
//! input can be kept raw and `decompress_only` mode can pass new stores
//! through untouched while still decoding records compressed earlier.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strata_core::{Compressor, HashId, ZstdCompressor};

use crate::error::{CacheError, CacheResult};
use crate::layer::{
    CacheLayer, ChainLink, LoadPolicy, QueryFlags, QueryResult, StoreParams, StorePolicy,
};

const FRAME_RAW: u8 = 0;
const FRAME_ZSTD: u8 = 1;

/// Fast zstd level; the default store path.
const FAST_LEVEL: i32 = 1;
/// High-ratio zstd level; trades store-time CPU for ratio. Decompression
/// speed is unaffected by which level produced the stream.
const HIGH_LEVEL: i32 = 19;

/// Configuration for [`CompressingCacheLayer`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CompressingLayerConfig {
    /// Use the high-compression level instead of the fast one.
    pub high_compression: bool,
    /// Pass stores through uncompressed, but keep decompressing on load.
    /// Supports migration away from compressed archives.
    pub decompress_only: bool,
}

impl CompressingLayerConfig {
    /// Create a config with fast compression enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the high-compression level.
    #[must_use]
    pub fn with_high_compression(mut self, high: bool) -> Self {
        self.high_compression = high;
        self
    }

    /// Disable compression on store while keeping decompression on load.
    #[must_use]
    pub fn with_decompress_only(mut self, decompress_only: bool) -> Self {
        self.decompress_only = decompress_only;
        self
    }
}

/// Cache layer that compresses payloads in flight.
///
/// # Example
///
/// ```
/// use strata_cache::compress::{CompressingCacheLayer, CompressingLayerConfig};
/// use strata_cache::layer::{CacheLayer, QueryFlags, StoreParams};
/// use strata_cache::memory::{MemoryCacheLayer, MemoryLayerConfig};
/// use strata_core::HashId;
///
/// let store = MemoryCacheLayer::new(MemoryLayerConfig::new());
/// let layer = CompressingCacheLayer::new(CompressingLayerConfig::new(), store);
///
/// let key = HashId::new([3; 16]);
/// let payload = vec![0u8; 4096];
/// layer.store(&key, &payload, StoreParams::new()).unwrap();
///
/// let token = layer.query(&key, QueryFlags::new()).unwrap();
/// assert_eq!(token.data_size(), 4096);
/// assert!(token.store_size() <= 4096);
///
/// let mut out = vec![0u8; token.data_size()];
/// layer.load(&token, &mut out).unwrap();
/// assert_eq!(out, payload);
/// ```
pub struct CompressingCacheLayer {
    config: CompressingLayerConfig,
    compressor: ZstdCompressor,
    chain: ChainLink,
}

impl CompressingCacheLayer {
    /// Create a compressing wrapper in front of `next`.
    #[must_use]
    pub fn new(config: CompressingLayerConfig, next: Arc<dyn CacheLayer>) -> Arc<Self> {
        let level = if config.high_compression {
            HIGH_LEVEL
        } else {
            FAST_LEVEL
        };
        let layer = Arc::new(Self {
            config,
            compressor: ZstdCompressor::with_level(level),
            chain: ChainLink::new(),
        });
        layer.chain.set_next(Some(next));
        layer
    }

    fn next(&self) -> CacheResult<Arc<dyn CacheLayer>> {
        self.chain.next().ok_or(CacheError::Unsupported)
    }

    /// Frame the payload for storage: compressed when it pays off, raw
    /// otherwise (and always raw in `decompress_only` mode).
    fn encode(&self, data: &[u8]) -> CacheResult<Vec<u8>> {
        if !self.config.decompress_only {
            let compressed = self
                .compressor
                .compress(data)
                .map_err(|e| CacheError::Compression(e.to_string()))?;
            if compressed.len() < data.len() {
                let mut framed = Vec::with_capacity(compressed.len() + 1);
                framed.push(FRAME_ZSTD);
                framed.extend_from_slice(&compressed);
                return Ok(framed);
            }
        }
        let mut framed = Vec::with_capacity(data.len() + 1);
        framed.push(FRAME_RAW);
        framed.extend_from_slice(data);
        Ok(framed)
    }
}

impl CacheLayer for CompressingCacheLayer {
    fn query(&self, id: &HashId, flags: QueryFlags) -> CacheResult<QueryResult> {
        let chained = self.next()?.query(id, flags)?;
        Ok(QueryResult::wrap(chained, self.chain.tag()))
    }

    fn store(
        &self,
        id: &HashId,
        data: &[u8],
        params: StoreParams,
    ) -> CacheResult<()> {
        let next = self.next()?;
        if self.chain.store_policy().skip {
            return next.store(id, data, params);
        }
        let logical = params.data_size.unwrap_or(data.len());
        let framed = self.encode(data)?;
        next.store(id, &framed, StoreParams::new().with_data_size(logical))
    }

    fn load(&self, token: &QueryResult, out: &mut [u8]) -> CacheResult<()> {
        token.check_layer(self.chain.tag())?;
        let chained = token.inner().ok_or(CacheError::InvalidToken)?;
        let next = self.next()?;
        if self.chain.load_policy().skip {
            return next.load(chained, out);
        }

        let mut stored = vec![0u8; token.store_size()];
        next.load(chained, &mut stored)?;
        let Some((&marker, body)) = stored.split_first() else {
            return Err(CacheError::Corrupt("empty compressed record".to_string()));
        };

        match marker {
            FRAME_RAW => {
                if out.len() < body.len() {
                    return Err(CacheError::SizeMismatch {
                        expected: body.len(),
                        actual: out.len(),
                    });
                }
                out[..body.len()].copy_from_slice(body);
                Ok(())
            }
            FRAME_ZSTD => {
                if out.len() < token.data_size() {
                    return Err(CacheError::SizeMismatch {
                        expected: token.data_size(),
                        actual: out.len(),
                    });
                }
                let raw = self
                    .compressor
                    .decompress_exact(body, token.data_size())
                    .map_err(|e| CacheError::Decompression(e.to_string()))?;
                out[..raw.len()].copy_from_slice(&raw);
                Ok(())
            }
            other => Err(CacheError::Corrupt(format!(
                "unknown compression frame marker {other}"
            ))),
        }
    }

    fn evict(&self, id: &HashId) -> CacheResult<()> {
        self.next()?.evict(id)
    }

    fn mark_bad(&self, id: &HashId) -> CacheResult<()> {
        self.next()?.mark_bad(id)
    }

    fn wait_for_entry(
        &self,
        id: &HashId,
        timeout: Option<Duration>,
    ) -> CacheResult<()> {
        self.next()?.wait_for_entry(id, timeout)
    }

    fn acquire_ref(&self, token: &QueryResult) -> CacheResult<()> {
        token.check_layer(self.chain.tag())?;
        let chained = token.inner().ok_or(CacheError::InvalidToken)?;
        self.next()?.acquire_ref(chained)
    }

    fn release_ref(&self, token: &QueryResult) -> CacheResult<()> {
        token.check_layer(self.chain.tag())?;
        let chained = token.inner().ok_or(CacheError::InvalidToken)?;
        self.next()?.release_ref(chained)
    }

    fn link(&self, next: Arc<dyn CacheLayer>) {
        self.chain.set_next(Some(next));
    }

    fn next_layer(&self) -> Option<Arc<dyn CacheLayer>> {
        self.chain.next()
    }

    fn set_load_policy(&self, policy: LoadPolicy) {
        self.chain.set_load_policy(policy);
    }

    fn set_store_policy(&self, policy: StorePolicy) {
        self.chain.set_store_policy(policy);
    }

    fn load_policy(&self) -> LoadPolicy {
        self.chain.load_policy()
    }

    fn store_policy(&self) -> StorePolicy {
        self.chain.store_policy()
    }

    fn layer_tag(&self) -> u64 {
        self.chain.tag()
    }
}
