//! Archive-file-backed cache layer.
//!
//! Persists entries into a single backing file as appended records, each
//! carrying the hash key, a 128-bit fingerprint and a 32-bit data-type
//! discriminator so heterogeneous or version-scoped data can share one
//! archive. An in-memory index is rebuilt by scanning the file at open;
//! the latest record for a key wins, which makes reservation fills and
//! tombstones plain appends.
//!
//! The layer adds no cross-process locking of the shared file; external
//! synchronization is the owning application's responsibility. It is
//! typically linked behind a [`crate::memory::MemoryCacheLayer`] so repeated
//! lookups avoid file I/O.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strata_core::HashId;
use tracing::{info, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::error::{CacheError, CacheResult};
use crate::layer::{
    CacheLayer, ChainLink, EntryState, LoadPolicy, QueryFlags, QueryResult, StoreParams,
    StorePolicy,
};
use crate::metrics::{LayerMetrics, MetricsSnapshot};

const RECORD_MAGIC: u32 = 0x5352_4543; // "SREC"
const RECORD_VERSION: u16 = 1;
const FLAG_RESERVED: u16 = 1 << 0;
const FLAG_TOMBSTONE: u16 = 1 << 1;

/// magic + version + flags + hash + fingerprint + data_type + data_size +
/// store_size + checksum
const HEADER_LEN: usize = 4 + 2 + 2 + 16 + 16 + 4 + 8 + 8 + 8;

/// Configuration for [`ArchiveCacheLayer`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ArchiveLayerConfig {
    /// Path of the backing archive file (created if missing).
    pub path: PathBuf,
    /// Data-type discriminator mixed into record matching.
    pub data_type: u32,
    /// Identity fingerprint mixed into record matching; records written
    /// under a different fingerprint are invisible to this layer.
    pub fingerprint: HashId,
    /// Sync the file after every append.
    pub sync_writes: bool,
}

impl ArchiveLayerConfig {
    /// Create a config for the given archive path.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            data_type: 0,
            fingerprint: HashId::ZERO,
            sync_writes: false,
        }
    }

    /// Set the data-type discriminator.
    #[must_use]
    pub fn with_data_type(mut self, data_type: u32) -> Self {
        self.data_type = data_type;
        self
    }

    /// Set the identity fingerprint.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: HashId) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    /// Sync the file after every append.
    #[must_use]
    pub fn with_sync_writes(mut self, sync: bool) -> Self {
        self.sync_writes = sync;
        self
    }
}

#[derive(Clone, Copy)]
struct IndexEntry {
    /// Payload offset within the file.
    offset: u64,
    data_size: usize,
    store_size: usize,
    checksum: u64,
    state: EntryState,
}

struct ArchiveInner {
    file: File,
    index: HashMap<HashId, IndexEntry>,
    /// End of the last valid record; appends land here.
    end: u64,
}

/// Persistent cache layer backed by a single archive file.
///
/// # Example
///
/// ```no_run
/// use strata_cache::archive::{ArchiveCacheLayer, ArchiveLayerConfig};
/// use strata_cache::layer::{CacheLayer, QueryFlags, StoreParams};
/// use strata_core::HashId;
///
/// # fn main() -> strata_cache::error::CacheResult<()> {
/// let layer = ArchiveCacheLayer::open(ArchiveLayerConfig::new("/tmp/pipelines.arc"))?;
/// let key = HashId::new([1; 16]);
///
/// layer.store(&key, b"compiled blob", StoreParams::new())?;
/// let token = layer.query(&key, QueryFlags::new())?;
/// # Ok(())
/// # }
/// ```
pub struct ArchiveCacheLayer {
    config: ArchiveLayerConfig,
    inner: Mutex<ArchiveInner>,
    chain: ChainLink,
    metrics: LayerMetrics,
}

impl ArchiveCacheLayer {
    /// Open (or create) the backing archive and rebuild the index.
    ///
    /// A torn trailing append is dropped with a warning; corruption anywhere
    /// earlier in the file surfaces as [`CacheError::Corrupt`].
    pub fn open(config: ArchiveLayerConfig) -> CacheResult<Arc<Self>> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&config.path)?;

        let (index, end) = Self::scan(&mut file, &config)?;
        info!(
            path = %config.path.display(),
            entries = index.len(),
            bytes = end,
            "archive opened"
        );

        Ok(Arc::new(Self {
            config,
            inner: Mutex::new(ArchiveInner { file, index, end }),
            chain: ChainLink::new(),
            metrics: LayerMetrics::new(),
        }))
    }

    /// Snapshot of this layer's metrics.
    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Number of indexed entries visible to this layer's scope.
    #[must_use]
    pub fn entries(&self) -> usize {
        self.inner.lock().index.len()
    }

    fn scan(
        file: &mut File,
        config: &ArchiveLayerConfig,
    ) -> CacheResult<(HashMap<HashId, IndexEntry>, u64)> {
        let file_len = file.metadata()?.len();
        let mut index = HashMap::new();
        let mut offset = 0u64;
        let mut header = [0u8; HEADER_LEN];

        file.seek(SeekFrom::Start(0))?;
        while offset + HEADER_LEN as u64 <= file_len {
            file.read_exact(&mut header)?;

            let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            if magic != RECORD_MAGIC {
                return Err(CacheError::Corrupt(format!(
                    "bad record magic {magic:#x} at offset {offset}"
                )));
            }
            let version = u16::from_le_bytes([header[4], header[5]]);
            if version != RECORD_VERSION {
                return Err(CacheError::Corrupt(format!(
                    "unsupported record version {version} at offset {offset}"
                )));
            }
            let flags = u16::from_le_bytes([header[6], header[7]]);
            let mut hash = [0u8; 16];
            hash.copy_from_slice(&header[8..24]);
            let hash = HashId::new(hash);
            let mut fingerprint = [0u8; 16];
            fingerprint.copy_from_slice(&header[24..40]);
            let fingerprint = HashId::new(fingerprint);
            let data_type =
                u32::from_le_bytes([header[40], header[41], header[42], header[43]]);
            let mut word = [0u8; 8];
            word.copy_from_slice(&header[44..52]);
            let data_size = u64::from_le_bytes(word);
            word.copy_from_slice(&header[52..60]);
            let store_size = u64::from_le_bytes(word);
            word.copy_from_slice(&header[60..68]);
            let checksum = u64::from_le_bytes(word);

            let payload_end = offset + HEADER_LEN as u64 + store_size;
            if payload_end > file_len {
                warn!(offset, "dropping torn record at end of archive");
                file.set_len(offset)?;
                return Ok((index, offset));
            }
            file.seek(SeekFrom::Current(store_size as i64))?;

            if fingerprint == config.fingerprint && data_type == config.data_type {
                if flags & FLAG_TOMBSTONE != 0 {
                    index.remove(&hash);
                } else if flags & FLAG_RESERVED != 0 {
                    index.insert(
                        hash,
                        IndexEntry {
                            offset: offset + HEADER_LEN as u64,
                            data_size: 0,
                            store_size: 0,
                            checksum: 0,
                            state: EntryState::Reserved,
                        },
                    );
                } else {
                    index.insert(
                        hash,
                        IndexEntry {
                            offset: offset + HEADER_LEN as u64,
                            data_size: data_size as usize,
                            store_size: store_size as usize,
                            checksum,
                            state: EntryState::Ready,
                        },
                    );
                }
            }
            offset = payload_end;
        }

        if offset < file_len {
            warn!(offset, "dropping torn record header at end of archive");
            file.set_len(offset)?;
        }
        Ok((index, offset))
    }

    /// Append a record at the current end and return its payload offset.
    fn append_record(
        &self,
        inner: &mut ArchiveInner,
        id: &HashId,
        flags: u16,
        data_size: usize,
        payload: &[u8],
        checksum: u64,
    ) -> CacheResult<u64> {
        let mut header = [0u8; HEADER_LEN];
        header[0..4].copy_from_slice(&RECORD_MAGIC.to_le_bytes());
        header[4..6].copy_from_slice(&RECORD_VERSION.to_le_bytes());
        header[6..8].copy_from_slice(&flags.to_le_bytes());
        header[8..24].copy_from_slice(id.as_bytes());
        header[24..40].copy_from_slice(self.config.fingerprint.as_bytes());
        header[40..44].copy_from_slice(&self.config.data_type.to_le_bytes());
        header[44..52].copy_from_slice(&(data_size as u64).to_le_bytes());
        header[52..60].copy_from_slice(&(payload.len() as u64).to_le_bytes());
        header[60..68].copy_from_slice(&checksum.to_le_bytes());

        inner.file.seek(SeekFrom::Start(inner.end))?;
        inner.file.write_all(&header)?;
        inner.file.write_all(payload)?;
        if self.config.sync_writes {
            inner.file.sync_all()?;
        }

        let payload_offset = inner.end + HEADER_LEN as u64;
        inner.end = payload_offset + payload.len() as u64;
        Ok(payload_offset)
    }
}

impl CacheLayer for ArchiveCacheLayer {
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
            let inner = self.inner.lock();
            if let Some(entry) = inner.index.get(id) {
                return match entry.state {
                    EntryState::Bad => Err(CacheError::EntryBad(*id)),
                    EntryState::Reserved => Err(CacheError::NotReady(*id)),
                    EntryState::Ready if entry.data_size == 0 => Err(CacheError::NotReady(*id)),
                    EntryState::Ready => {
                        self.metrics.record_hit(entry.data_size as u64);
                        Ok(QueryResult::direct(
                            *id,
                            entry.data_size,
                            entry.store_size,
                            entry.store_size,
                            false,
                            self.chain.tag(),
                            entry.offset,
                        ))
                    }
                };
            }
        }

        self.metrics.record_miss();

        if load_policy.pass_data {
            if let Some(next) = self.chain.next() {
                match next.query(id, QueryFlags::new()) {
                    Ok(chained) => {
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
            let mut inner = self.inner.lock();
            // Re-check under the lock; a concurrent reserver may have won.
            if let Some(entry) = inner.index.get(id) {
                return match entry.state {
                    EntryState::Reserved => Err(CacheError::NotReady(*id)),
                    EntryState::Bad => Err(CacheError::EntryBad(*id)),
                    EntryState::Ready if entry.data_size == 0 => Err(CacheError::NotReady(*id)),
                    EntryState::Ready => Ok(QueryResult::direct(
                        *id,
                        entry.data_size,
                        entry.store_size,
                        entry.store_size,
                        false,
                        self.chain.tag(),
                        entry.offset,
                    )),
                };
            }
            let offset = self.append_record(&mut inner, id, FLAG_RESERVED, 0, &[], 0)?;
            inner.index.insert(
                *id,
                IndexEntry {
                    offset,
                    data_size: 0,
                    store_size: 0,
                    checksum: 0,
                    state: EntryState::Reserved,
                },
            );
            return Ok(QueryResult::direct(
                *id,
                0,
                0,
                0,
                true,
                self.chain.tag(),
                offset,
            ));
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

        let data_size = params.data_size.unwrap_or(data.len());
        {
            let mut inner = self.inner.lock();
            match inner.index.get(id).map(|e| e.state) {
                Some(EntryState::Ready) => return Err(CacheError::AlreadyExists(*id)),
                Some(EntryState::Bad) => return Err(CacheError::EntryBad(*id)),
                Some(EntryState::Reserved) | None => {}
            }

            let checksum = xxh3_64(data);
            let offset = self.append_record(&mut inner, id, 0, data_size, data, checksum)?;
            inner.index.insert(
                *id,
                IndexEntry {
                    offset,
                    data_size,
                    store_size: data.len(),
                    checksum,
                    state: EntryState::Ready,
                },
            );
        }
        self.metrics.record_store(data.len() as u64);

        if store_policy.pass_calls {
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
        let mut inner = self.inner.lock();
        let entry = *inner.index.get(&id).ok_or(CacheError::NotFound(id))?;
        if entry.offset != token.slot() {
            return Err(CacheError::NotFound(id));
        }
        match entry.state {
            EntryState::Reserved => return Err(CacheError::NotReady(id)),
            EntryState::Bad => return Err(CacheError::EntryBad(id)),
            EntryState::Ready => {}
        }
        if out.len() < entry.store_size {
            return Err(CacheError::SizeMismatch {
                expected: entry.store_size,
                actual: out.len(),
            });
        }

        inner.file.seek(SeekFrom::Start(entry.offset))?;
        inner.file.read_exact(&mut out[..entry.store_size])?;

        if xxh3_64(&out[..entry.store_size]) != entry.checksum {
            return Err(CacheError::Corrupt(format!(
                "payload checksum mismatch for {id}"
            )));
        }
        Ok(())
    }

    fn evict(&self, id: &HashId) -> CacheResult<()> {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.index.remove(id) else {
            return Err(CacheError::NotFound(*id));
        };
        self.append_record(&mut inner, id, FLAG_TOMBSTONE, 0, &[], 0)?;
        self.metrics.record_eviction(entry.store_size as u64);
        Ok(())
    }

    fn mark_bad(&self, id: &HashId) -> CacheResult<()> {
        // No pinning here, so a bad entry is removable immediately; the
        // tombstone makes the verdict durable.
        self.evict(id)
    }

    fn wait_for_entry(&self, _id: &HashId, _timeout: Option<Duration>) -> CacheResult<()> {
        Err(CacheError::Unsupported)
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
