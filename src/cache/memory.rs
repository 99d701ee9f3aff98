//! In-process tier: bounded LRU over [`CachedEmbedding`]s.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use moka::policy::EvictionPolicy;
use moka::sync::Cache;

use super::error::CacheResult;
use super::tier::CacheTier;
use super::types::{CacheKey, CacheTierKind, CachedEmbedding, Principal};
use crate::constants::DEFAULT_MEMORY_CAPACITY;

#[derive(Debug)]
struct Slot {
    entry: CachedEmbedding,
    access_count: AtomicU64,
    last_accessed: AtomicI64,
}

impl Slot {
    fn new(entry: CachedEmbedding) -> Self {
        Self {
            access_count: AtomicU64::new(entry.access_count),
            last_accessed: AtomicI64::new(entry.last_accessed),
            entry,
        }
    }

    fn snapshot(&self) -> CachedEmbedding {
        CachedEmbedding {
            access_count: self.access_count.load(Ordering::Relaxed),
            last_accessed: self.last_accessed.load(Ordering::Relaxed),
            ..self.entry.clone()
        }
    }
}

/// Memory tier backed by a `moka` cache with strict LRU eviction.
///
/// Every hit bumps the entry's access count and last-access time.
pub struct MemoryTier {
    entries: Cache<CacheKey, Arc<Slot>>,
    capacity: u64,
}

impl MemoryTier {
    /// Creates a tier holding at most `capacity` entries.
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .eviction_policy(EvictionPolicy::lru())
                .build(),
            capacity,
        }
    }

    #[inline]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of entries after applying pending evictions.
    pub fn len(&self) -> usize {
        self.entries.run_pending_tasks();
        self.entries.entry_count() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` without touching recency.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn lookup(&self, key: &CacheKey) -> Option<CachedEmbedding> {
        let slot = self.entries.get(key)?;
        slot.access_count.fetch_add(1, Ordering::Relaxed);
        slot.last_accessed
            .store(chrono::Utc::now().timestamp_millis(), Ordering::Relaxed);
        Some(slot.snapshot())
    }

    pub fn insert(&self, key: CacheKey, entry: CachedEmbedding) {
        self.entries.insert(key, Arc::new(Slot::new(entry)));
        self.entries.run_pending_tasks();
    }

    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries.remove(key).is_some()
    }
}

impl Default for MemoryTier {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CAPACITY)
    }
}

impl std::fmt::Debug for MemoryTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryTier")
            .field("entries", &self.entries.entry_count())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn kind(&self) -> CacheTierKind {
        CacheTierKind::Memory
    }

    async fn get(
        &self,
        key: &CacheKey,
        _principal: Option<&Principal>,
    ) -> CacheResult<Option<CachedEmbedding>> {
        Ok(self.lookup(key))
    }

    async fn set(
        &self,
        key: &CacheKey,
        entry: &CachedEmbedding,
        _principal: Option<&Principal>,
    ) -> CacheResult<()> {
        self.insert(key.clone(), entry.clone());
        Ok(())
    }

    async fn remove(&self, key: &CacheKey, _principal: Option<&Principal>) -> CacheResult<bool> {
        Ok(self.invalidate(key))
    }

    async fn clear(&self) -> CacheResult<usize> {
        let removed = self.len();
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
        Ok(removed)
    }

    async fn purge_expired(&self, ttl: Duration, now_ms: i64) -> CacheResult<usize> {
        let expired: Vec<Arc<CacheKey>> = self
            .entries
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired(ttl, now_ms))
            .map(|(key, _)| key)
            .collect();

        for key in &expired {
            self.entries.invalidate(key.as_ref());
        }
        self.entries.run_pending_tasks();
        Ok(expired.len())
    }

    async fn size(&self) -> CacheResult<usize> {
        Ok(self.len())
    }
}
