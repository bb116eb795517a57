//! Integration tests for strata-cache.
//!
//! Exercises end-to-end chain workflows: store, fall-through, promotion,
//! reservation, compression and tracking.

use std::sync::Arc;
use std::time::Duration;

use strata_cache::{
    ArchiveCacheLayer, ArchiveLayerConfig, CacheError, CacheLayer, CompressingCacheLayer,
    CompressingLayerConfig, LoadPolicy, MemoryCacheLayer, MemoryLayerConfig, QueryFlags,
    StoreParams, StorePolicy, TrackingCacheLayer,
};
use strata_core::{Blake3Hasher, HashFunction, HashId};
use tempfile::TempDir;

/// Generate a synthetic, compressible payload.
fn generate_payload(size: usize) -> Vec<u8> {
    (0..size).map(|i| (i % 251) as u8).collect()
}

fn key(b: u8) -> HashId {
    HashId::new([b; 16])
}

// ============================================================================
// Single-layer round trips
// ============================================================================

#[test]
fn test_memory_roundtrip_with_content_key() {
    let cache = MemoryCacheLayer::new(MemoryLayerConfig::new());
    let payload = generate_payload(2048);
    let id = Blake3Hasher::new().hash_id(&payload);

    cache.store(&id, &payload, StoreParams::new()).unwrap();

    let token = cache.query(&id, QueryFlags::new()).unwrap();
    assert_eq!(token.data_size(), payload.len());

    let mut buf = vec![0u8; token.store_size()];
    cache.load(&token, &mut buf).unwrap();
    assert_eq!(buf, payload);
}

#[test]
fn test_archive_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let cache =
        ArchiveCacheLayer::open(ArchiveLayerConfig::new(tmp.path().join("cache.arc"))).unwrap();
    let payload = generate_payload(4096);
    let id = key(1);

    cache.store(&id, &payload, StoreParams::new()).unwrap();

    let token = cache.query(&id, QueryFlags::new()).unwrap();
    let mut buf = vec![0u8; token.store_size()];
    cache.load(&token, &mut buf).unwrap();
    assert_eq!(buf, payload);
}

#[test]
fn test_no_double_store() {
    let cache = MemoryCacheLayer::new(MemoryLayerConfig::new());
    let id = key(2);

    cache.store(&id, b"original", StoreParams::new()).unwrap();
    assert!(matches!(
        cache.store(&id, b"intruder", StoreParams::new()),
        Err(CacheError::AlreadyExists(_))
    ));

    let token = cache.query(&id, QueryFlags::new()).unwrap();
    let mut buf = vec![0u8; token.store_size()];
    cache.load(&token, &mut buf).unwrap();
    assert_eq!(&buf, b"original");
}

// ============================================================================
// Chain fallback and promotion
// ============================================================================

#[test]
fn test_chain_fallback_requires_pass_data() {
    let tmp = TempDir::new().unwrap();
    let back =
        ArchiveCacheLayer::open(ArchiveLayerConfig::new(tmp.path().join("back.arc"))).unwrap();
    let id = key(3);
    back.store(&id, b"deep data", StoreParams::new()).unwrap();

    let front = MemoryCacheLayer::new(MemoryLayerConfig::new());
    front.link(back);

    // Policy bit cleared: the chain is not consulted.
    assert!(matches!(
        front.query(&id, QueryFlags::new()),
        Err(CacheError::NotFound(_))
    ));

    // Policy bit set: the deep hit is surfaced through the front layer.
    front.set_load_policy(LoadPolicy::new().with_pass_data(true));
    let token = front.query(&id, QueryFlags::new()).unwrap();
    assert_eq!(token.data_size(), 9);

    let mut buf = vec![0u8; token.store_size()];
    front.load(&token, &mut buf).unwrap();
    assert_eq!(&buf, b"deep data");
}

#[test]
fn test_load_on_query_promotes_into_front() {
    let tmp = TempDir::new().unwrap();
    let back =
        ArchiveCacheLayer::open(ArchiveLayerConfig::new(tmp.path().join("back.arc"))).unwrap();
    let id = key(4);
    back.store(&id, b"promoted", StoreParams::new()).unwrap();

    let front = MemoryCacheLayer::new(MemoryLayerConfig::new());
    front.link(back);
    front.set_load_policy(
        LoadPolicy::new().with_pass_data(true).with_load_on_query(true),
    );

    assert_eq!(front.stats().entries, 0);
    let token = front.query(&id, QueryFlags::new()).unwrap();
    assert_eq!(front.stats().entries, 1);

    let mut buf = vec![0u8; token.store_size()];
    front.load(&token, &mut buf).unwrap();
    assert_eq!(&buf, b"promoted");

    // The promoted copy now answers without the chain.
    front.set_load_policy(LoadPolicy::new());
    assert!(front.query(&id, QueryFlags::new()).is_ok());
}

#[test]
fn test_store_propagates_down_chain() {
    let tmp = TempDir::new().unwrap();
    let back =
        ArchiveCacheLayer::open(ArchiveLayerConfig::new(tmp.path().join("back.arc"))).unwrap();
    let front = MemoryCacheLayer::new(MemoryLayerConfig::new());
    front.link(back.clone());
    front.set_store_policy(StorePolicy::new().with_pass_calls(true));

    let id = key(5);
    front.store(&id, b"everywhere", StoreParams::new()).unwrap();

    assert!(back.query(&id, QueryFlags::new()).is_ok());
}

// ============================================================================
// Reservation
// ============================================================================

#[test]
fn test_reservation_then_fill() {
    let cache = MemoryCacheLayer::new(MemoryLayerConfig::new());
    let id = key(6);

    let reserved = cache
        .query(&id, QueryFlags::new().with_reserve_on_miss(true))
        .unwrap();
    assert!(reserved.is_reserved());

    // A second reserving query must observe the pending reservation, not
    // create another one.
    assert!(matches!(
        cache.query(&id, QueryFlags::new().with_reserve_on_miss(true)),
        Err(CacheError::NotReady(_))
    ));

    cache.store(&id, b"computed", StoreParams::new()).unwrap();

    let token = cache.query(&id, QueryFlags::new()).unwrap();
    assert!(!token.is_reserved());
    let mut buf = vec![0u8; token.store_size()];
    cache.load(&token, &mut buf).unwrap();
    assert_eq!(&buf, b"computed");
}

#[test]
fn test_waiters_unblock_when_reservation_fills() {
    let cache = MemoryCacheLayer::new(MemoryLayerConfig::new());
    let id = key(7);
    cache
        .query(&id, QueryFlags::new().with_reserve_on_miss(true))
        .unwrap();

    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                cache.wait_for_entry(&id, Some(Duration::from_secs(5)))?;
                let token = cache.query(&id, QueryFlags::new())?;
                let mut buf = vec![0u8; token.store_size()];
                cache.load(&token, &mut buf)?;
                Ok::<Vec<u8>, CacheError>(buf)
            })
        })
        .collect();

    std::thread::sleep(Duration::from_millis(30));
    cache.store(&id, b"finally here", StoreParams::new()).unwrap();

    for waiter in waiters {
        assert_eq!(waiter.join().unwrap().unwrap(), b"finally here");
    }
}

// ============================================================================
// Eviction and pinning
// ============================================================================

#[test]
fn test_eviction_budget_held_under_churn() {
    let cache = MemoryCacheLayer::new(MemoryLayerConfig::new().with_max_entries(8));

    for b in 0..32u8 {
        cache.store(&key(b), &generate_payload(64), StoreParams::new()).unwrap();
        assert!(cache.stats().entries <= 8);
    }
    assert_eq!(cache.stats().entries, 8);

    // The most recent stores survived.
    assert!(cache.query(&key(31), QueryFlags::new()).is_ok());
    assert!(matches!(
        cache.query(&key(0), QueryFlags::new()),
        Err(CacheError::NotFound(_))
    ));
}

#[test]
fn test_pinned_entry_never_evicted() {
    let cache = MemoryCacheLayer::new(MemoryLayerConfig::new().with_max_entries(4));
    let pinned = key(100);
    cache.store(&pinned, b"precious", StoreParams::new()).unwrap();
    let token = cache
        .query(&pinned, QueryFlags::new().with_acquire_ref(true))
        .unwrap();

    // Heavy churn; the pinned entry stays put even as the oldest.
    for b in 0..64u8 {
        cache.store(&key(b), &generate_payload(32), StoreParams::new()).unwrap();
    }
    assert!(cache.query(&pinned, QueryFlags::new()).is_ok());

    let bytes = cache.cached_data(&token).unwrap();
    assert_eq!(bytes.as_ref(), b"precious");
    cache.release_ref(&token).unwrap();
}

// ============================================================================
// Compression transparency
// ============================================================================

#[test]
fn test_compression_transparent_both_levels() {
    for high in [false, true] {
        let store = MemoryCacheLayer::new(MemoryLayerConfig::new());
        let cache = CompressingCacheLayer::new(
            CompressingLayerConfig::new().with_high_compression(high),
            store,
        );
        let payload = generate_payload(16 * 1024);
        let id = key(8);

        cache.store(&id, &payload, StoreParams::new()).unwrap();

        let token = cache.query(&id, QueryFlags::new()).unwrap();
        assert_eq!(token.data_size(), payload.len());
        assert!(token.store_size() <= payload.len());

        let mut out = vec![0u8; token.data_size()];
        cache.load(&token, &mut out).unwrap();
        assert_eq!(out, payload);
    }
}

#[test]
fn test_compressed_archive_roundtrip() {
    let tmp = TempDir::new().unwrap();
    let payload = generate_payload(32 * 1024);
    let id = key(9);

    {
        let back =
            ArchiveCacheLayer::open(ArchiveLayerConfig::new(tmp.path().join("zip.arc"))).unwrap();
        let cache = CompressingCacheLayer::new(CompressingLayerConfig::new(), back);
        cache.store(&id, &payload, StoreParams::new()).unwrap();
    }

    // Reopen: the archive holds compressed bytes, the wrapper restores them.
    let back =
        ArchiveCacheLayer::open(ArchiveLayerConfig::new(tmp.path().join("zip.arc"))).unwrap();
    let cache = CompressingCacheLayer::new(CompressingLayerConfig::new(), back);

    let token = cache.query(&id, QueryFlags::new()).unwrap();
    assert_eq!(token.data_size(), payload.len());
    assert!(token.store_size() < payload.len());

    let mut out = vec![0u8; token.data_size()];
    cache.load(&token, &mut out).unwrap();
    assert_eq!(out, payload);
}

// ============================================================================
// Tracking
// ============================================================================

#[test]
fn test_tracking_completeness() {
    let store = MemoryCacheLayer::new(MemoryLayerConfig::new());
    let tracker = TrackingCacheLayer::new(store);

    let mut expected = Vec::new();
    for b in 0..10u8 {
        let id = key(b);
        if b % 2 == 0 {
            tracker.store(&id, b"even", StoreParams::new()).unwrap();
        } else {
            let _ = tracker.query(&id, QueryFlags::new());
        }
        expected.push(id);
    }
    expected.sort();

    assert_eq!(tracker.tracked_hashes(), expected);
}

// ============================================================================
// Full chain
// ============================================================================

#[test]
fn test_full_stack_roundtrip_and_warm_restart() {
    let tmp = TempDir::new().unwrap();
    let archive_path = tmp.path().join("stack.arc");
    let payload = generate_payload(8 * 1024);
    let id = key(10);

    // First run: tracking -> compression -> memory -> archive.
    {
        let archive =
            ArchiveCacheLayer::open(ArchiveLayerConfig::new(&archive_path)).unwrap();
        let memory = MemoryCacheLayer::new(MemoryLayerConfig::new());
        memory.link(archive);
        memory.set_store_policy(StorePolicy::new().with_pass_calls(true));
        let compress = CompressingCacheLayer::new(CompressingLayerConfig::new(), memory);
        let cache = TrackingCacheLayer::new(compress);

        cache.store(&id, &payload, StoreParams::new()).unwrap();

        let token = cache.query(&id, QueryFlags::new()).unwrap();
        let mut out = vec![0u8; token.data_size()];
        cache.load(&token, &mut out).unwrap();
        assert_eq!(out, payload);
        assert_eq!(cache.tracked_hashes(), vec![id]);
    }

    // Second run: cold memory layer, the archive answers through the chain
    // and the hit is promoted into memory.
    let archive = ArchiveCacheLayer::open(ArchiveLayerConfig::new(&archive_path)).unwrap();
    let memory = MemoryCacheLayer::new(MemoryLayerConfig::new());
    memory.link(archive);
    memory.set_load_policy(
        LoadPolicy::new().with_pass_data(true).with_load_on_query(true),
    );
    let cache = CompressingCacheLayer::new(CompressingLayerConfig::new(), memory.clone());

    let token = cache.query(&id, QueryFlags::new()).unwrap();
    assert_eq!(token.data_size(), payload.len());

    let mut out = vec![0u8; token.data_size()];
    cache.load(&token, &mut out).unwrap();
    assert_eq!(out, payload);

    // The compressed record now lives in the memory layer too.
    assert_eq!(memory.stats().entries, 1);
}

#[test]
fn test_error_kinds_are_caller_signals() {
    let cache = MemoryCacheLayer::new(MemoryLayerConfig::new());
    let id = key(11);

    // Miss -> recompute-and-store is the expected reaction.
    let miss = cache.query(&id, QueryFlags::new()).unwrap_err();
    assert!(matches!(miss, CacheError::NotFound(_)));

    cache.store(&id, b"value", StoreParams::new()).unwrap();
    cache.mark_bad(&id).unwrap();

    // A bad (and thus removed) entry reads as a plain miss afterwards.
    assert!(matches!(
        cache.query(&id, QueryFlags::new()),
        Err(CacheError::NotFound(_))
    ));
}
