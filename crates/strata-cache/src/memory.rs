//! In-process memory cache layer.
//!
//! A mutex-guarded key-to-slot map with LRU eviction, entry/byte budgets,
//! reservation-before-data semantics and pin counting. Typically the first
//! layer of a chain, with an archive layer linked behind it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use strata_core::HashId;
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::layer::{
    CacheLayer, ChainLink, EntryState, LoadPolicy, QueryFlags, QueryResult, StoreParams,
    StorePolicy,
};
use crate::metrics::{LayerMetrics, MetricsSnapshot};

/// Configuration for [`MemoryCacheLayer`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MemoryLayerConfig {
    /// Maximum number of resident entries (reservations included).
    pub max_entries: usize,
    /// Maximum resident payload bytes.
    pub max_bytes: u64,
    /// Evict least-recently-used unpinned entries to make room; when false,
    /// a store that would exceed a budget fails instead.
    pub evict_on_full: bool,
    /// Replace an existing entry when a store for the same key carries
    /// different bytes, instead of returning `AlreadyExists`.
    pub evict_duplicates: bool,
}

impl MemoryLayerConfig {
    /// Create a config with default budgets (4096 entries, 256 MiB).
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_entries: 4096,
            max_bytes: 256 * 1024 * 1024,
            evict_on_full: true,
            evict_duplicates: false,
        }
    }

    /// Set the maximum entry count.
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Set the maximum resident bytes.
    #[must_use]
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Enable or disable eviction under pressure.
    #[must_use]
    pub fn with_evict_on_full(mut self, evict: bool) -> Self {
        self.evict_on_full = evict;
        self
    }

    /// Enable or disable replacement of byte-different duplicates.
    #[must_use]
    pub fn with_evict_duplicates(mut self, evict: bool) -> Self {
        self.evict_duplicates = evict;
        self
    }
}

impl Default for MemoryLayerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Resident usage of a memory layer.
#[derive(Clone, Debug, Serialize)]
pub struct LayerStats {
    /// Number of resident entries.
    pub entries: usize,
    /// Resident payload bytes.
    pub resident_bytes: u64,
    /// Configured entry budget.
    pub max_entries: usize,
    /// Configured byte budget.
    pub max_bytes: u64,
    /// Byte-budget utilization (0.0 to 1.0).
    pub utilization: f64,
}

struct Slot {
    payload: Bytes,
    data_size: usize,
    store_size: usize,
    promotion_size: usize,
    state: EntryState,
    pins: u32,
    slot_id: u64,
}

/// Node in the LRU linked list.
struct LruNode {
    prev: Option<HashId>,
    next: Option<HashId>,
}

/// Doubly-linked LRU ordering over keys; head is most recently used.
struct LruList {
    nodes: HashMap<HashId, LruNode>,
    head: Option<HashId>,
    tail: Option<HashId>,
}

impl LruList {
    fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            head: None,
            tail: None,
        }
    }

    fn push_front(&mut self, id: HashId) {
        let node = LruNode {
            prev: None,
            next: self.head,
        };

        if let Some(old_head) = self.head {
            if let Some(old_node) = self.nodes.get_mut(&old_head) {
                old_node.prev = Some(id);
            }
        }

        self.nodes.insert(id, node);
        self.head = Some(id);

        if self.tail.is_none() {
            self.tail = Some(id);
        }
    }

    fn remove(&mut self, id: &HashId) {
        if let Some(node) = self.nodes.remove(id) {
            match node.prev {
                Some(prev) => {
                    if let Some(prev_node) = self.nodes.get_mut(&prev) {
                        prev_node.next = node.next;
                    }
                }
                None => self.head = node.next,
            }

            match node.next {
                Some(next) => {
                    if let Some(next_node) = self.nodes.get_mut(&next) {
                        next_node.prev = node.prev;
                    }
                }
                None => self.tail = node.prev,
            }
        }
    }

    fn touch(&mut self, id: &HashId) {
        if self.head == Some(*id) {
            return;
        }
        if self.nodes.contains_key(id) {
            self.remove(id);
            self.push_front(*id);
        }
    }

    fn tail(&self) -> Option<HashId> {
        self.tail
    }

    fn prev_of(&self, id: &HashId) -> Option<HashId> {
        self.nodes.get(id).and_then(|n| n.prev)
    }
}

struct MemoryInner {
    slots: HashMap<HashId, Slot>,
    lru: LruList,
    total_bytes: u64,
    next_slot_id: u64,
    pending: Vec<(HashId, Bytes, usize)>,
}

/// In-process hash-map-backed cache layer.
///
/// # Example
///
/// ```
/// use strata_cache::layer::{CacheLayer, QueryFlags, StoreParams};
/// use strata_cache::memory::{MemoryCacheLayer, MemoryLayerConfig};
/// use strata_core::HashId;
///
/// let layer = MemoryCacheLayer::new(MemoryLayerConfig::new());
/// let key = HashId::new([7; 16]);
///
/// layer.store(&key, b"payload", StoreParams::new()).unwrap();
///
/// let token = layer.query(&key, QueryFlags::new()).unwrap();
/// let mut buf = vec![0u8; token.store_size()];
/// layer.load(&token, &mut buf).unwrap();
/// assert_eq!(&buf, b"payload");
/// ```
pub struct MemoryCacheLayer {
    config: MemoryLayerConfig,
    inner: Mutex<MemoryInner>,
    ready: Condvar,
    chain: ChainLink,
    metrics: LayerMetrics,
}

impl MemoryCacheLayer {
    /// Create a new memory layer with the given budgets.
    #[must_use]
    pub fn new(config: MemoryLayerConfig) -> Arc<Self> {
        debug!(
            max_entries = config.max_entries,
            max_bytes = config.max_bytes,
            "memory cache layer created"
        );
        Arc::new(Self {
            config,
            inner: Mutex::new(MemoryInner {
                slots: HashMap::new(),
                lru: LruList::new(),
                total_bytes: 0,
                next_slot_id: 1,
                pending: Vec::new(),
            }),
            ready: Condvar::new(),
            chain: ChainLink::new(),
            metrics: LayerMetrics::new(),
        })
    }

    /// Snapshot of this layer's metrics.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Resident usage against the configured budgets.
    #[must_use]
    pub fn stats(&self) -> LayerStats {
        let inner = self.inner.lock();
        LayerStats {
            entries: inner.slots.len(),
            resident_bytes: inner.total_bytes,
            max_entries: self.config.max_entries,
            max_bytes: self.config.max_bytes,
            utilization: if self.config.max_bytes > 0 {
                inner.total_bytes as f64 / self.config.max_bytes as f64
            } else {
                0.0
            },
        }
    }

    /// Forward every store deferred under `StorePolicy::batch_store` to the
    /// next layer. A no-op when nothing is pending or no layer is linked.
    pub fn flush_batched(&self) -> CacheResult<()> {
        let drained = {
            let mut inner = self.inner.lock();
            std::mem::take(&mut inner.pending)
        };
        if drained.is_empty() {
            return Ok(());
        }
        let Some(next) = self.chain.next() else {
            return Ok(());
        };
        debug!(count = drained.len(), "flushing batched stores");
        for (id, payload, data_size) in drained {
            match next.store(&id, &payload, StoreParams::new().with_data_size(data_size)) {
                Ok(()) | Err(CacheError::AlreadyExists(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn fits(&self, inner: &MemoryInner, extra_bytes: u64, extra_entries: usize) -> bool {
        inner.slots.len() + extra_entries <= self.config.max_entries
            && inner.total_bytes + extra_bytes <= self.config.max_bytes
    }

    fn remove_slot(&self, inner: &mut MemoryInner, id: &HashId) -> u64 {
        match inner.slots.remove(id) {
            Some(slot) => {
                inner.lru.remove(id);
                let freed = slot.payload.len() as u64;
                inner.total_bytes -= freed;
                freed
            }
            None => 0,
        }
    }

    /// Evict LRU victims until `extra_bytes`/`extra_entries` fit, skipping
    /// reserved, bad and pinned entries. Returns false when the budget
    /// cannot be met.
    fn make_room(&self, inner: &mut MemoryInner, extra_bytes: u64, extra_entries: usize) -> bool {
        while !self.fits(inner, extra_bytes, extra_entries) {
            if !self.config.evict_on_full {
                return false;
            }
            let mut victim = None;
            let mut cursor = inner.lru.tail();
            while let Some(id) = cursor {
                let evictable = inner
                    .slots
                    .get(&id)
                    .map_or(false, |s| s.state == EntryState::Ready && s.pins == 0);
                if evictable {
                    victim = Some(id);
                    break;
                }
                cursor = inner.lru.prev_of(&id);
            }
            match victim {
                Some(id) => {
                    let freed = self.remove_slot(inner, &id);
                    debug!(%id, freed, "evicted entry under pressure");
                    self.metrics.record_eviction(freed);
                }
                None => return false,
            }
        }
        true
    }

    fn insert_slot(&self, inner: &mut MemoryInner, id: &HashId, payload: Bytes, data_size: usize) {
        let len = payload.len();
        let slot_id = inner.next_slot_id;
        inner.next_slot_id += 1;
        inner.total_bytes += len as u64;
        inner.slots.insert(
            *id,
            Slot {
                payload,
                data_size,
                store_size: len,
                promotion_size: len,
                state: EntryState::Ready,
                pins: 0,
                slot_id,
            },
        );
        inner.lru.push_front(*id);
    }

    fn store_locked(
        &self,
        inner: &mut MemoryInner,
        id: &HashId,
        payload: Bytes,
        data_size: usize,
    ) -> CacheResult<()> {
        let incoming = payload.len() as u64;
        let existing = inner
            .slots
            .get(id)
            .map(|s| (s.state, s.pins, s.payload.clone()));

        match existing {
            Some((EntryState::Bad, _, _)) => Err(CacheError::EntryBad(*id)),
            Some((EntryState::Ready, pins, old)) => {
                if !self.config.evict_duplicates || old.as_ref() == payload.as_ref() {
                    return Err(CacheError::AlreadyExists(*id));
                }
                if pins > 0 {
                    // Never yank pinned data out from under a reader.
                    return Err(CacheError::AlreadyExists(*id));
                }
                let freed = self.remove_slot(inner, id);
                self.metrics.record_eviction(freed);
                if !self.make_room(inner, incoming, 1) {
                    return Err(CacheError::CapacityExceeded);
                }
                self.insert_slot(inner, id, payload, data_size);
                Ok(())
            }
            Some((EntryState::Reserved, _, _)) => {
                // The slot is already counted; only its payload bytes are new.
                if !self.make_room(inner, incoming, 0) {
                    return Err(CacheError::CapacityExceeded);
                }
                let Some(slot) = inner.slots.get_mut(id) else {
                    return Err(CacheError::NotFound(*id));
                };
                let len = payload.len();
                slot.payload = payload;
                slot.data_size = data_size;
                slot.store_size = len;
                slot.promotion_size = len;
                slot.state = EntryState::Ready;
                inner.total_bytes += incoming;
                inner.lru.touch(id);
                Ok(())
            }
            None => {
                if !self.make_room(inner, incoming, 1) {
                    return Err(CacheError::CapacityExceeded);
                }
                self.insert_slot(inner, id, payload, data_size);
                Ok(())
            }
        }
    }

    fn reserve(&self, id: &HashId, flags: QueryFlags) -> CacheResult<QueryResult> {
        let mut inner = self.inner.lock();
        // Another thread may have won the race since our miss; re-check.
        if let Some(slot) = inner.slots.get_mut(id) {
            return match slot.state {
                EntryState::Bad => Err(CacheError::EntryBad(*id)),
                EntryState::Reserved => Err(CacheError::NotReady(*id)),
                EntryState::Ready if slot.data_size == 0 => Err(CacheError::NotReady(*id)),
                EntryState::Ready => {
                    if flags.acquire_ref {
                        slot.pins += 1;
                    }
                    let token = QueryResult::direct(
                        *id,
                        slot.data_size,
                        slot.store_size,
                        slot.promotion_size,
                        false,
                        self.chain.tag(),
                        slot.slot_id,
                    );
                    inner.lru.touch(id);
                    Ok(token)
                }
            };
        }

        if !self.make_room(&mut inner, 0, 1) {
            return Err(CacheError::CapacityExceeded);
        }
        let slot_id = inner.next_slot_id;
        inner.next_slot_id += 1;
        inner.slots.insert(
            *id,
            Slot {
                payload: Bytes::new(),
                data_size: 0,
                store_size: 0,
                promotion_size: 0,
                state: EntryState::Reserved,
                pins: u32::from(flags.acquire_ref),
                slot_id,
            },
        );
        inner.lru.push_front(*id);
        Ok(QueryResult::direct(
            *id,
            0,
            0,
            0,
            true,
            self.chain.tag(),
            slot_id,
        ))
    }

    /// Copy an entry found in the next layer into this one and hand back a
    /// local token. Promotion failure is not fatal; the caller falls back to
    /// the chained token.
    fn promote(
        &self,
        next: &Arc<dyn CacheLayer>,
        chained: &QueryResult,
        flags: QueryFlags,
    ) -> CacheResult<QueryResult> {
        let size = chained.store_size().max(chained.promotion_size());
        let mut buf = vec![0u8; size];
        next.load(chained, &mut buf)?;
        buf.truncate(chained.store_size());
        let payload = Bytes::from(buf);
        let id = chained.id();

        let token = {
            let mut inner = self.inner.lock();
            match self.store_locked(&mut inner, &id, payload, chained.data_size()) {
                Ok(()) | Err(CacheError::AlreadyExists(_)) => {}
                Err(e) => return Err(e),
            }
            let Some(slot) = inner.slots.get_mut(&id) else {
                return Err(CacheError::NotFound(id));
            };
            if slot.state != EntryState::Ready {
                return Err(CacheError::NotReady(id));
            }
            if flags.acquire_ref {
                slot.pins += 1;
            }
            QueryResult::direct(
                id,
                slot.data_size,
                slot.store_size,
                slot.promotion_size,
                false,
                self.chain.tag(),
                slot.slot_id,
            )
        };
        self.ready.notify_all();
        debug!(%id, "promoted entry from next layer");
        Ok(token)
    }
}

impl CacheLayer for MemoryCacheLayer {
    fn query(&self, id: &HashId, flags: QueryFlags) -> CacheResult<QueryResult> {
        let load_policy = self.chain.load_policy();
        if load_policy.skip {
            return match self.chain.next() {
                Some(next) => next
                    .query(id, flags)
                    .map(|chained| QueryResult::wrap(chained, self.chain.tag())),
                None => Err(CacheError::Unsupported),
            };
        }

        {
            let mut inner = self.inner.lock();
            let hit = match inner.slots.get_mut(id) {
                Some(slot) => match slot.state {
                    EntryState::Bad => return Err(CacheError::EntryBad(*id)),
                    EntryState::Reserved => return Err(CacheError::NotReady(*id)),
                    EntryState::Ready if slot.data_size == 0 => {
                        return Err(CacheError::NotReady(*id))
                    }
                    EntryState::Ready => {
                        if flags.acquire_ref {
                            slot.pins += 1;
                        }
                        Some((
                            slot.data_size,
                            slot.store_size,
                            slot.promotion_size,
                            slot.slot_id,
                        ))
                    }
                },
                None => None,
            };
            if let Some((data_size, store_size, promotion_size, slot_id)) = hit {
                inner.lru.touch(id);
                drop(inner);
                self.metrics.record_hit(data_size as u64);
                return Ok(QueryResult::direct(
                    *id,
                    data_size,
                    store_size,
                    promotion_size,
                    false,
                    self.chain.tag(),
                    slot_id,
                ));
            }
        }

        self.metrics.record_miss();

        if load_policy.pass_data {
            if let Some(next) = self.chain.next() {
                match next.query(id, QueryFlags::new()) {
                    Ok(chained) => {
                        if load_policy.load_on_query {
                            if let Ok(token) = self.promote(&next, &chained, flags) {
                                return Ok(token);
                            }
                        }
                        if flags.acquire_ref {
                            // Pin the entry where it actually lives.
                            match next.acquire_ref(&chained) {
                                Ok(()) | Err(CacheError::Unsupported) => {}
                                Err(e) => return Err(e),
                            }
                        }
                        return Ok(QueryResult::wrap(chained, self.chain.tag()));
                    }
                    Err(CacheError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        if flags.reserve_on_miss {
            return self.reserve(id, flags);
        }
        Err(CacheError::NotFound(*id))
    }

    fn store(&self, id: &HashId, data: &[u8], params: StoreParams) -> CacheResult<()> {
        let store_policy = self.chain.store_policy();
        if store_policy.skip {
            return match self.chain.next() {
                Some(next) => next.store(id, data, params),
                None => Err(CacheError::Unsupported),
            };
        }

        let payload = Bytes::copy_from_slice(data);
        let data_size = params.data_size.unwrap_or(data.len());

        let forward = {
            let mut inner = self.inner.lock();
            self.store_locked(&mut inner, id, payload.clone(), data_size)?;
            if store_policy.batch_store {
                inner.pending.push((*id, payload, data_size));
                false
            } else {
                store_policy.pass_calls
            }
        };
        self.ready.notify_all();
        self.metrics.record_store(data.len() as u64);

        if forward {
            if let Some(next) = self.chain.next() {
                match next.store(id, data, params) {
                    Ok(()) | Err(CacheError::AlreadyExists(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(())
    }

    fn load(&self, token: &QueryResult, out: &mut [u8]) -> CacheResult<()> {
        token.check_layer(self.chain.tag())?;
        if let Some(chained) = token.inner() {
            let next = self.chain.next().ok_or(CacheError::InvalidToken)?;
            return next.load(chained, out);
        }

        let id = token.id();
        let payload = {
            let inner = self.inner.lock();
            let slot = inner.slots.get(&id).ok_or(CacheError::NotFound(id))?;
            if slot.slot_id != token.slot() {
                return Err(CacheError::NotFound(id));
            }
            match slot.state {
                EntryState::Reserved => return Err(CacheError::NotReady(id)),
                EntryState::Bad => return Err(CacheError::EntryBad(id)),
                EntryState::Ready => slot.payload.clone(),
            }
        };

        if out.len() < payload.len() {
            return Err(CacheError::SizeMismatch {
                expected: payload.len(),
                actual: out.len(),
            });
        }
        out[..payload.len()].copy_from_slice(&payload);
        Ok(())
    }

    fn evict(&self, id: &HashId) -> CacheResult<()> {
        let found = {
            let mut inner = self.inner.lock();
            let pins = inner.slots.get(id).map(|s| s.pins);
            match pins {
                None => false,
                Some(pins) if pins > 0 => {
                    // Deferred: flag bad, removed when the last pin drops.
                    if let Some(slot) = inner.slots.get_mut(id) {
                        slot.state = EntryState::Bad;
                    }
                    true
                }
                Some(_) => {
                    let freed = self.remove_slot(&mut inner, id);
                    self.metrics.record_eviction(freed);
                    true
                }
            }
        };
        self.ready.notify_all();

        if self.chain.load_policy().pass_calls || self.chain.store_policy().pass_calls {
            if let Some(next) = self.chain.next() {
                match next.evict(id) {
                    Ok(()) | Err(CacheError::NotFound(_)) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        if found {
            Ok(())
        } else {
            Err(CacheError::NotFound(*id))
        }
    }

    fn mark_bad(&self, id: &HashId) -> CacheResult<()> {
        let found = {
            let mut inner = self.inner.lock();
            let pins = inner.slots.get(id).map(|s| s.pins);
            match pins {
                None => false,
                Some(pins) => {
                    if let Some(slot) = inner.slots.get_mut(id) {
                        slot.state = EntryState::Bad;
                    }
                    if pins == 0 {
                        let freed = self.remove_slot(&mut inner, id);
                        self.metrics.record_eviction(freed);
                    }
                    true
                }
            }
        };
        self.ready.notify_all();

        if self.chain.load_policy().pass_calls || self.chain.store_policy().pass_calls {
            if let Some(next) = self.chain.next() {
                match next.mark_bad(id) {
                    Ok(()) | Err(CacheError::NotFound(_)) | Err(CacheError::Unsupported) => {}
                    Err(e) => return Err(e),
                }
            }
        }

        if found {
            Ok(())
        } else {
            Err(CacheError::NotFound(*id))
        }
    }

    fn wait_for_entry(&self, id: &HashId, timeout: Option<Duration>) -> CacheResult<()> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut inner = self.inner.lock();
        loop {
            match inner.slots.get(id) {
                None => return Err(CacheError::NotFound(*id)),
                Some(slot) => match slot.state {
                    EntryState::Bad => return Err(CacheError::EntryBad(*id)),
                    EntryState::Ready if slot.data_size > 0 => return Ok(()),
                    _ => {}
                },
            }
            match deadline {
                Some(d) => {
                    if Instant::now() >= d {
                        return Err(CacheError::WaitTimeout(*id));
                    }
                    let _ = self.ready.wait_until(&mut inner, d);
                }
                None => self.ready.wait(&mut inner),
            }
        }
    }

    fn acquire_ref(&self, token: &QueryResult) -> CacheResult<()> {
        token.check_layer(self.chain.tag())?;
        if let Some(chained) = token.inner() {
            let next = self.chain.next().ok_or(CacheError::InvalidToken)?;
            return next.acquire_ref(chained);
        }
        let id = token.id();
        let mut inner = self.inner.lock();
        let slot = inner.slots.get_mut(&id).ok_or(CacheError::NotFound(id))?;
        if slot.slot_id != token.slot() {
            return Err(CacheError::NotFound(id));
        }
        slot.pins += 1;
        Ok(())
    }

    fn release_ref(&self, token: &QueryResult) -> CacheResult<()> {
        token.check_layer(self.chain.tag())?;
        if let Some(chained) = token.inner() {
            let next = self.chain.next().ok_or(CacheError::InvalidToken)?;
            return next.release_ref(chained);
        }
        let id = token.id();
        let mut inner = self.inner.lock();
        let (pins, state) = {
            let Some(slot) = inner.slots.get_mut(&id) else {
                return Err(CacheError::NotFound(id));
            };
            if slot.slot_id != token.slot() {
                return Err(CacheError::NotFound(id));
            }
            slot.pins = slot.pins.saturating_sub(1);
            (slot.pins, slot.state)
        };
        if pins == 0 && state == EntryState::Bad {
            let freed = self.remove_slot(&mut inner, &id);
            self.metrics.record_eviction(freed);
        }
        Ok(())
    }

    fn cached_data(&self, token: &QueryResult) -> CacheResult<Bytes> {
        token.check_layer(self.chain.tag())?;
        if let Some(chained) = token.inner() {
            let next = self.chain.next().ok_or(CacheError::InvalidToken)?;
            return next.cached_data(chained);
        }
        let id = token.id();
        let inner = self.inner.lock();
        let slot = inner.slots.get(&id).ok_or(CacheError::NotFound(id))?;
        if slot.slot_id != token.slot() {
            return Err(CacheError::NotFound(id));
        }
        match slot.state {
            EntryState::Reserved => Err(CacheError::NotReady(id)),
            EntryState::Bad => Err(CacheError::EntryBad(id)),
            EntryState::Ready => Ok(slot.payload.clone()),
        }
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
