//! The cache layer contract.
//!
//! Every concrete layer implements [`CacheLayer`]: a thread-safe,
//! synchronous query/store/load surface keyed by 128-bit [`HashId`]s.
//! Layers chain through [`CacheLayer::link`]; per-direction policies decide
//! whether a miss falls through to the next layer, whether stores propagate
//! down the chain, and whether data found deeper is promoted at query time.
//!
//! # Thread Safety
//!
//! Implementations must be `Send + Sync`. All operations execute on the
//! calling thread; the only blocking point is [`CacheLayer::wait_for_entry`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::RwLock;
use strata_core::HashId;

use crate::error::{CacheError, CacheResult};

/// Lifecycle state of a cache entry.
///
/// Transitions: `Reserved -> Ready -> (evicted)`, or
/// `Reserved | Ready -> Bad -> (evicted once unpinned)`. Never backward
/// out of `Bad`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Slot claimed via a reserving query; payload not yet stored.
    Reserved,
    /// Payload stored and readable.
    Ready,
    /// Flagged unusable; removed once the pin count reaches zero.
    Bad,
}

/// Flags controlling a single [`CacheLayer::query`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryFlags {
    /// Atomically create a `Reserved` entry when the key is missing. The
    /// reserving caller receives a result with [`QueryResult::is_reserved`]
    /// set; concurrent queries for the same key observe
    /// [`CacheError::NotReady`] until a store completes the entry.
    pub reserve_on_miss: bool,
    /// Pin the entry as an atomic part of a successful query. The pin must
    /// later be dropped with [`CacheLayer::release_ref`].
    pub acquire_ref: bool,
}

impl QueryFlags {
    /// Flags for a plain lookup.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the entry when the key is missing.
    #[must_use]
    pub fn with_reserve_on_miss(mut self, reserve: bool) -> Self {
        self.reserve_on_miss = reserve;
        self
    }

    /// Pin the entry on a successful query.
    #[must_use]
    pub fn with_acquire_ref(mut self, acquire: bool) -> Self {
        self.acquire_ref = acquire;
        self
    }
}

/// Per-store parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreParams {
    /// Logical (uncompressed) payload size when it differs from the stored
    /// representation's length. `None` means the payload is stored verbatim.
    pub data_size: Option<usize>,
}

impl StoreParams {
    /// Parameters for a verbatim store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a logical size for a transformed (e.g. compressed) payload.
    #[must_use]
    pub fn with_data_size(mut self, data_size: usize) -> Self {
        self.data_size = Some(data_size);
        self
    }
}

/// Load-direction chain policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadPolicy {
    /// On a local miss, consult the next layer.
    pub pass_data: bool,
    /// Propagate non-query calls (evict, mark_bad) down the chain.
    pub pass_calls: bool,
    /// Bypass this layer entirely; queries go straight to the next layer.
    pub skip: bool,
    /// When a miss is answered by the next layer, copy the data into this
    /// layer at query time instead of serving loads through the chain.
    pub load_on_query: bool,
}

impl LoadPolicy {
    /// Policy with every bit cleared.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Consult the next layer on a miss.
    #[must_use]
    pub fn with_pass_data(mut self, pass: bool) -> Self {
        self.pass_data = pass;
        self
    }

    /// Propagate non-query calls down the chain.
    #[must_use]
    pub fn with_pass_calls(mut self, pass: bool) -> Self {
        self.pass_calls = pass;
        self
    }

    /// Bypass this layer entirely.
    #[must_use]
    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Promote chain hits into this layer at query time.
    #[must_use]
    pub fn with_load_on_query(mut self, load: bool) -> Self {
        self.load_on_query = load;
        self
    }
}

/// Store-direction chain policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct StorePolicy {
    /// Forward stores to the next layer after storing locally.
    pub pass_calls: bool,
    /// Bypass this layer entirely; stores go straight to the next layer.
    pub skip: bool,
    /// Defer forwarding stores, coalescing them until an explicit flush.
    /// Local query/load still answer for not-yet-forwarded entries.
    pub batch_store: bool,
}

impl StorePolicy {
    /// Policy with every bit cleared.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward stores to the next layer.
    #[must_use]
    pub fn with_pass_calls(mut self, pass: bool) -> Self {
        self.pass_calls = pass;
        self
    }

    /// Bypass this layer entirely.
    #[must_use]
    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    /// Defer forwarding stores until an explicit flush.
    #[must_use]
    pub fn with_batch_store(mut self, batch: bool) -> Self {
        self.batch_store = batch;
        self
    }
}

/// The result of a successful [`CacheLayer::query`].
///
/// A token is valid only against the layer instance that produced it, and
/// only while the underlying entry survives; token-taking calls return
/// [`CacheError::InvalidToken`] for a foreign token and
/// [`CacheError::NotFound`] for a stale one. When a query is answered by a
/// deeper layer in the chain, the token delegates transparently: `load` on
/// the queried layer reaches the layer that actually holds the bytes.
#[derive(Debug, Clone)]
pub struct QueryResult {
    id: HashId,
    data_size: usize,
    store_size: usize,
    promotion_size: usize,
    reserved: bool,
    layer_tag: u64,
    slot: u64,
    inner: Option<Box<QueryResult>>,
}

impl QueryResult {
    pub(crate) fn direct(
        id: HashId,
        data_size: usize,
        store_size: usize,
        promotion_size: usize,
        reserved: bool,
        layer_tag: u64,
        slot: u64,
    ) -> Self {
        Self {
            id,
            data_size,
            store_size,
            promotion_size,
            reserved,
            layer_tag,
            slot,
            inner: None,
        }
    }

    /// Re-tag a token produced by the next layer so the caller can keep
    /// talking to the layer it queried.
    pub(crate) fn wrap(inner: QueryResult, layer_tag: u64) -> Self {
        Self {
            id: inner.id,
            data_size: inner.data_size,
            store_size: inner.store_size,
            promotion_size: inner.promotion_size,
            reserved: inner.reserved,
            layer_tag,
            slot: 0,
            inner: Some(Box::new(inner)),
        }
    }

    /// The key this token refers to.
    #[must_use]
    pub fn id(&self) -> HashId {
        self.id
    }

    /// Logical (uncompressed) payload size.
    #[must_use]
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// Bytes physically stored; differs from [`Self::data_size`] under
    /// compression.
    #[must_use]
    pub fn store_size(&self) -> usize {
        self.store_size
    }

    /// Size hint for copying this entry into a shallower layer.
    #[must_use]
    pub fn promotion_size(&self) -> usize {
        self.promotion_size
    }

    /// Whether this query created a reservation rather than finding data.
    #[must_use]
    pub fn is_reserved(&self) -> bool {
        self.reserved
    }

    pub(crate) fn slot(&self) -> u64 {
        self.slot
    }

    pub(crate) fn inner(&self) -> Option<&QueryResult> {
        self.inner.as_deref()
    }

    pub(crate) fn check_layer(&self, tag: u64) -> CacheResult<()> {
        if self.layer_tag == tag {
            Ok(())
        } else {
            Err(CacheError::InvalidToken)
        }
    }
}

static NEXT_LAYER_TAG: AtomicU64 = AtomicU64::new(1);

/// Chain state embedded by every concrete layer: the next-layer pointer,
/// the per-direction policies, and this instance's token tag.
pub(crate) struct ChainLink {
    tag: u64,
    next: RwLock<Option<Arc<dyn CacheLayer>>>,
    load_policy: RwLock<LoadPolicy>,
    store_policy: RwLock<StorePolicy>,
}

impl ChainLink {
    pub(crate) fn new() -> Self {
        Self {
            tag: NEXT_LAYER_TAG.fetch_add(1, Ordering::Relaxed),
            next: RwLock::new(None),
            load_policy: RwLock::new(LoadPolicy::default()),
            store_policy: RwLock::new(StorePolicy::default()),
        }
    }

    pub(crate) fn tag(&self) -> u64 {
        self.tag
    }

    pub(crate) fn next(&self) -> Option<Arc<dyn CacheLayer>> {
        self.next.read().clone()
    }

    pub(crate) fn set_next(&self, next: Option<Arc<dyn CacheLayer>>) {
        *self.next.write() = next;
    }

    pub(crate) fn load_policy(&self) -> LoadPolicy {
        *self.load_policy.read()
    }

    pub(crate) fn set_load_policy(&self, policy: LoadPolicy) {
        *self.load_policy.write() = policy;
    }

    pub(crate) fn store_policy(&self) -> StorePolicy {
        *self.store_policy.read()
    }

    pub(crate) fn set_store_policy(&self, policy: StorePolicy) {
        *self.store_policy.write() = policy;
    }
}

/// Trait for cache layer implementations.
///
/// Concrete layers answer queries from their own storage and, depending on
/// policy, fall through to a linked next layer. The next layer is a
/// separately owned handle; linking never transfers ownership.
pub trait CacheLayer: Send + Sync {
    /// Look up an entry by key.
    ///
    /// Returns a token for a ready entry, `Err(NotReady)` while a
    /// reservation is pending, and `Err(NotFound)` on a miss. With
    /// [`QueryFlags::reserve_on_miss`] a miss atomically creates a
    /// `Reserved` entry instead and the returned token reports
    /// [`QueryResult::is_reserved`].
    fn query(&self, id: &HashId, flags: QueryFlags) -> CacheResult<QueryResult>;

    /// Store a payload under a key.
    ///
    /// Creates a ready entry, or completes a pending reservation. A ready
    /// entry is never overwritten: `Err(AlreadyExists)`.
    fn store(&self, id: &HashId, data: &[u8], params: StoreParams) -> CacheResult<()>;

    /// Copy the entry's stored bytes into `out`.
    ///
    /// `out` must hold at least [`QueryResult::store_size`] bytes (layers
    /// that transform payloads, like the compressing layer, instead fill
    /// [`QueryResult::data_size`] bytes).
    fn load(&self, token: &QueryResult, out: &mut [u8]) -> CacheResult<()>;

    /// Remove an entry. A pinned entry is flagged bad instead and removed
    /// once the last pin drops.
    fn evict(&self, id: &HashId) -> CacheResult<()>;

    /// Flag an entry unusable. Removal is deferred until the pin count
    /// reaches zero; waiters on the entry are woken.
    fn mark_bad(&self, id: &HashId) -> CacheResult<()>;

    /// Block until a reserved entry becomes ready or bad.
    ///
    /// `None` waits unboundedly; `Some(d)` returns `Err(WaitTimeout)` once
    /// `d` elapses. Layers without waiting support return
    /// `Err(Unsupported)`.
    fn wait_for_entry(&self, id: &HashId, timeout: Option<Duration>) -> CacheResult<()>;

    /// Pin the entry behind a token, preventing eviction.
    fn acquire_ref(&self, _token: &QueryResult) -> CacheResult<()> {
        Err(CacheError::Unsupported)
    }

    /// Drop a pin acquired via [`Self::acquire_ref`] or
    /// [`QueryFlags::acquire_ref`].
    fn release_ref(&self, _token: &QueryResult) -> CacheResult<()> {
        Err(CacheError::Unsupported)
    }

    /// Zero-copy handle to the entry's stored bytes. Only meaningful while
    /// a pin is held.
    fn cached_data(&self, _token: &QueryResult) -> CacheResult<Bytes> {
        Err(CacheError::Unsupported)
    }

    /// Link the next layer in the chain (replacing any previous link).
    fn link(&self, next: Arc<dyn CacheLayer>);

    /// The currently linked next layer, if any.
    fn next_layer(&self) -> Option<Arc<dyn CacheLayer>>;

    /// Set the load-direction policy.
    fn set_load_policy(&self, policy: LoadPolicy);

    /// Set the store-direction policy.
    fn set_store_policy(&self, policy: StorePolicy);

    /// The current load-direction policy.
    fn load_policy(&self) -> LoadPolicy;

    /// The current store-direction policy.
    fn store_policy(&self) -> StorePolicy;

    /// Identity tag of this layer instance, as stamped into its tokens.
    fn layer_tag(&self) -> u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_flags_builder() {
        let flags = QueryFlags::new()
            .with_reserve_on_miss(true)
            .with_acquire_ref(true);
        assert!(flags.reserve_on_miss);
        assert!(flags.acquire_ref);
    }

    #[test]
    fn test_policy_builders() {
        let load = LoadPolicy::new().with_pass_data(true).with_load_on_query(true);
        assert!(load.pass_data);
        assert!(load.load_on_query);
        assert!(!load.skip);

        let store = StorePolicy::new().with_pass_calls(true).with_batch_store(true);
        assert!(store.pass_calls);
        assert!(store.batch_store);
    }

    #[test]
    fn test_token_layer_check() {
        let id = HashId::new([1; 16]);
        let token = QueryResult::direct(id, 8, 8, 8, false, 7, 0);
        assert!(token.check_layer(7).is_ok());
        assert!(matches!(
            token.check_layer(8),
            Err(CacheError::InvalidToken)
        ));
    }

    #[test]
    fn test_wrap_keeps_sizes_and_retags() {
        let id = HashId::new([2; 16]);
        let inner = QueryResult::direct(id, 100, 40, 40, false, 3, 11);
        let outer = QueryResult::wrap(inner, 9);

        assert_eq!(outer.data_size(), 100);
        assert_eq!(outer.store_size(), 40);
        assert!(outer.check_layer(9).is_ok());
        assert_eq!(outer.inner().unwrap().slot(), 11);
    }

    #[test]
    fn test_chain_link_tags_are_unique() {
        let a = ChainLink::new();
        let b = ChainLink::new();
        assert_ne!(a.tag(), b.tag());
    }
}
