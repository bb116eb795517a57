//! # strata-cache
//!
//! A layered content-addressable blob cache keyed by 128-bit hashes.
//!
//! ## Features
//!
//! - **Chained layers**: queries fall through linked layers on a miss, with
//!   optional promotion of deep hits into shallower layers
//! - **In-flight reservation**: a miss can atomically claim a slot so only
//!   one producer computes a payload while others wait
//! - **Transparent compression**: a wrapper layer compresses in flight while
//!   callers keep seeing logical sizes
//! - **Pinning**: reference counts keep entries resident while a caller
//!   reads them zero-copy
//!
//! ## Quick Start
//!
//! ```
//! use strata_cache::layer::{CacheLayer, QueryFlags, StoreParams};
//! use strata_cache::memory::{MemoryCacheLayer, MemoryLayerConfig};
//! use strata_core::HashId;
//!
//! let cache = MemoryCacheLayer::new(MemoryLayerConfig::new());
//! let key = HashId::new([42; 16]);
//!
//! cache.store(&key, b"compiled pipeline", StoreParams::new()).unwrap();
//!
//! let token = cache.query(&key, QueryFlags::new()).unwrap();
//! let mut buf = vec![0u8; token.store_size()];
//! cache.load(&token, &mut buf).unwrap();
//! ```
//!
//! ## Architecture
//!
//! ```text
//!   caller
//!     |
//!     v
//!  +-------------------+     +-------------------+
//!  | TrackingCacheLayer| --> |CompressingCache-  |
//!  |  (audit keys)     |     |Layer (zstd)       |
//!  +-------------------+     +---------+---------+
//!                                      |
//!                                      v
//!                            +-------------------+
//!                            | MemoryCacheLayer  |
//!                            | (LRU, budgets,    |
//!                            |  reservation)     |
//!                            +---------+---------+
//!                                      | miss / pass_data
//!                                      v
//!                            +-------------------+
//!                            | ArchiveCacheLayer |
//!                            | (single file,     |
//!                            |  scan-built index)|
//!                            +-------------------+
//! ```
//!
//! Every layer implements the same [`layer::CacheLayer`] contract; chains
//! are composition over `Arc<dyn CacheLayer>`, configured per direction with
//! [`layer::LoadPolicy`] and [`layer::StorePolicy`].
//!
//! ## Modules
//!
//! - [`layer`]: the polymorphic layer contract, tokens and policies
//! - [`memory`]: in-process store with LRU eviction and reservation
//! - [`archive`]: persistent single-file store
//! - [`compress`]: transparent compression wrapper
//! - [`tracking`]: key-audit wrapper
//! - [`metrics`]: per-layer counters

pub mod archive;
pub mod compress;
pub mod error;
pub mod layer;
pub mod memory;
pub mod metrics;
pub mod tracking;

// Re-export commonly used types
pub use archive::{ArchiveCacheLayer, ArchiveLayerConfig};
pub use compress::{CompressingCacheLayer, CompressingLayerConfig};
pub use error::{CacheError, CacheResult};
pub use layer::{
    CacheLayer, EntryState, LoadPolicy, QueryFlags, QueryResult, StoreParams, StorePolicy,
};
pub use memory::{LayerStats, MemoryCacheLayer, MemoryLayerConfig};
pub use metrics::{LayerMetrics, MetricsSnapshot};
pub use tracking::TrackingCacheLayer;
