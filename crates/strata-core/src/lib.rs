//! # strata-core
//!
//! Core infrastructure for the strata layered cache.
//!
//! Provides shared abstractions for:
//! - The 128-bit [`HashId`] cache key
//! - Hashing providers (xxhash, blake3)
//! - Compression (zstd)

pub mod compression;
pub mod error;
pub mod hashing;
pub mod types;

pub use compression::{Compressor, ZstdCompressor};
pub use error::{Result, StrataError};
pub use hashing::{Blake3Hasher, HashFunction, XxHash3};
pub use types::HashId;
