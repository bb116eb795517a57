//! Pass-through layer that records every hash key it sees.
//!
//! Query, store and load all forward unconditionally to the next layer; the
//! only local state is the set of observed keys, snapshot via
//! [`TrackingCacheLayer::tracked_hashes`]. Useful for auditing which entries
//! a session touched, e.g. to pre-warm an archive on the next run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use strata_core::HashId;

use crate::error::{CacheError, CacheResult};
use crate::layer::{
    CacheLayer, ChainLink, LoadPolicy, QueryFlags, QueryResult, StoreParams, StorePolicy,
};

/// Pass-through cache layer that records observed keys.
pub struct TrackingCacheLayer {
    chain: ChainLink,
    seen: Mutex<HashSet<HashId>>,
}

impl TrackingCacheLayer {
    /// Create a tracking wrapper in front of `next`.
    #[must_use]
    pub fn new(next: Arc<dyn CacheLayer>) -> Arc<Self> {
        let layer = Arc::new(Self {
            chain: ChainLink::new(),
            seen: Mutex::new(HashSet::new()),
        });
        layer.chain.set_next(Some(next));
        layer
    }

    /// Snapshot of every key observed so far, in sorted order.
    #[must_use]
    pub fn tracked_hashes(&self) -> Vec<HashId> {
        let mut keys: Vec<HashId> = self.seen.lock().iter().copied().collect();
        keys.sort();
        keys
    }

    /// Forget all recorded keys.
    pub fn clear_tracked(&self) {
        self.seen.lock().clear();
    }

    fn record(&self, id: &HashId) {
        self.seen.lock().insert(*id);
    }

    fn next(&self) -> CacheResult<Arc<dyn CacheLayer>> {
        self.chain.next().ok_or(CacheError::Unsupported)
    }
}

impl CacheLayer for TrackingCacheLayer {
    fn query(&self, id: &HashId, flags: QueryFlags) -> CacheResult<QueryResult> {
        self.record(id);
        let chained = self.next()?.query(id, flags)?;
        Ok(QueryResult::wrap(chained, self.chain.tag()))
    }

    fn store(&self, id: &HashId, data: &[u8], params: StoreParams) -> CacheResult<()> {
        self.record(id);
        self.next()?.store(id, data, params)
    }

    fn load(&self, token: &QueryResult, out: &mut [u8]) -> CacheResult<()> {
        token.check_layer(self.chain.tag())?;
        let chained = token.inner().ok_or(CacheError::InvalidToken)?;
        self.next()?.load(chained, out)
    }

    fn evict(&self, id: &HashId) -> CacheResult<()> {
        self.next()?.evict(id)
    }

    fn mark_bad(&self, id: &HashId) -> CacheResult<()> {
        self.next()?.mark_bad(id)
    }

    fn wait_for_entry(&self, id: &HashId, timeout: Option<Duration>) -> CacheResult<()> {
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

    fn cached_data(&self, token: &QueryResult) -> CacheResult<Bytes> {
        token.check_layer(self.chain.tag())?;
        let chained = token.inner().ok_or(CacheError::InvalidToken)?;
        self.next()?.cached_data(chained)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryCacheLayer, MemoryLayerConfig};

    fn key(b: u8) -> HashId {
        HashId::new([b; 16])
    }

    #[test]
    fn test_records_stores_and_queries() {
        let store = MemoryCacheLayer::new(MemoryLayerConfig::new());
        let tracker = TrackingCacheLayer::new(store);

        tracker.store(&key(1), b"a", StoreParams::new()).unwrap();
        tracker.store(&key(2), b"b", StoreParams::new()).unwrap();
        // A miss still counts as an observation.
        let _ = tracker.query(&key(3), QueryFlags::new());
        // Re-touching a key does not duplicate it.
        tracker.query(&key(1), QueryFlags::new()).unwrap();

        let tracked = tracker.tracked_hashes();
        assert_eq!(tracked, vec![key(1), key(2), key(3)]);
    }

    #[test]
    fn test_pass_through_is_transparent() {
        let store = MemoryCacheLayer::new(MemoryLayerConfig::new());
        let tracker = TrackingCacheLayer::new(store.clone());
        let id = key(4);

        tracker.store(&id, b"payload", StoreParams::new()).unwrap();

        // Bytes live in the next layer, not the tracker.
        assert_eq!(store.stats().entries, 1);

        let token = tracker.query(&id, QueryFlags::new()).unwrap();
        let mut buf = vec![0u8; token.store_size()];
        tracker.load(&token, &mut buf).unwrap();
        assert_eq!(&buf, b"payload");
    }

    #[test]
    fn test_clear_tracked() {
        let store = MemoryCacheLayer::new(MemoryLayerConfig::new());
        let tracker = TrackingCacheLayer::new(store);

        tracker.store(&key(5), b"x", StoreParams::new()).unwrap();
        assert_eq!(tracker.tracked_hashes().len(), 1);

        tracker.clear_tracked();
        assert!(tracker.tracked_hashes().is_empty());
    }
}
