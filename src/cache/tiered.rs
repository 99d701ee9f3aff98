//! Tiered embedding cache: memory, then persistent, then remote.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use tracing::{debug, instrument, warn};

use super::error::{CacheError, CacheResult};
use super::memory::MemoryTier;
use super::persistent::PersistentTier;
use super::remote::{RemoteCacheClient, RemoteTier};
use super::tier::CacheTier;
use super::types::{
    CacheKey, CacheLookupResult, CacheStats, CacheTierKind, CachedEmbedding, Principal, TierStats,
};
use crate::constants::{DEFAULT_CACHE_TTL, DEFAULT_MEMORY_CAPACITY};
use crate::embedding::EmbeddingVector;
use crate::storage::RecordStore;

#[derive(Debug, Clone)]
/// Configuration for [`TieredEmbeddingCache`].
pub struct TieredCacheConfig {
    /// Max entries in the memory tier.
    pub memory_capacity: u64,
    /// Entries older than this are treated as absent in every tier.
    pub ttl: Duration,
}

impl Default for TieredCacheConfig {
    fn default() -> Self {
        Self {
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            ttl: DEFAULT_CACHE_TTL,
        }
    }
}

impl TieredCacheConfig {
    pub fn with_memory_capacity(mut self, capacity: u64) -> Self {
        self.memory_capacity = capacity;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn validate(&self) -> CacheResult<()> {
        if self.memory_capacity == 0 {
            return Err(CacheError::InvalidConfig {
                reason: "memory_capacity must be > 0".to_string(),
            });
        }
        if self.ttl.is_zero() {
            return Err(CacheError::InvalidConfig {
                reason: "ttl must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

struct TierSlot {
    tier: Arc<dyn CacheTier>,
    hits: AtomicU64,
    read_failures: AtomicU64,
    write_failures: AtomicU64,
}

impl TierSlot {
    fn new(tier: Arc<dyn CacheTier>) -> Self {
        Self {
            tier,
            hits: AtomicU64::new(0),
            read_failures: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
        }
    }

    fn kind(&self) -> CacheTierKind {
        self.tier.kind()
    }

    fn usable(&self, principal: Option<&Principal>) -> bool {
        principal.is_some() || !self.tier.requires_principal()
    }

    fn record_write_failure(&self, error: &CacheError, operation: &'static str) {
        self.write_failures.fetch_add(1, Ordering::Relaxed);
        warn!(tier = %self.kind(), operation, error = %error, "Cache tier write failed");
    }
}

/// Embedding cache over an ordered list of [`CacheTier`]s.
///
/// Reads walk the tiers fastest first and promote a hit into every faster tier. Writes go
/// to every usable tier; a failing tier is counted in [`CacheStats`] and never surfaces as
/// an error. Tiers that need a principal are skipped while none is set.
pub struct TieredEmbeddingCache {
    tiers: Vec<TierSlot>,
    memory: Arc<MemoryTier>,
    ttl: Duration,
    principal: RwLock<Option<Principal>>,
    total_requests: AtomicU64,
    total_hits: AtomicU64,
    misses: AtomicU64,
    expired: AtomicU64,
}

impl std::fmt::Debug for TieredEmbeddingCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredEmbeddingCache")
            .field(
                "tiers",
                &self.tiers.iter().map(TierSlot::kind).collect::<Vec<_>>(),
            )
            .field("ttl", &self.ttl)
            .field("memory", &self.memory)
            .finish_non_exhaustive()
    }
}

impl TieredEmbeddingCache {
    /// Creates a cache with only the memory tier.
    pub fn new(config: TieredCacheConfig) -> CacheResult<Self> {
        config.validate()?;
        Ok(Self::build(config.memory_capacity, config.ttl))
    }

    /// Memory-only cache with the default TTL.
    pub fn in_memory(capacity: u64) -> Self {
        Self::build(capacity.max(1), DEFAULT_CACHE_TTL)
    }

    fn build(memory_capacity: u64, ttl: Duration) -> Self {
        let memory = Arc::new(MemoryTier::new(memory_capacity));
        Self {
            tiers: vec![TierSlot::new(memory.clone())],
            memory,
            ttl,
            principal: RwLock::new(None),
            total_requests: AtomicU64::new(0),
            total_hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    /// Adds a tier; tiers are kept ordered by [`CacheTierKind`].
    pub fn with_tier(mut self, tier: Arc<dyn CacheTier>) -> Self {
        self.tiers.push(TierSlot::new(tier));
        self.tiers.sort_by_key(TierSlot::kind);
        self
    }

    /// Adds a persistent tier over `store`.
    pub fn with_persistent<S: RecordStore>(self, store: S) -> Self {
        self.with_tier(Arc::new(PersistentTier::new(store)))
    }

    /// Adds a remote tier over `client`.
    pub fn with_remote<C: RemoteCacheClient + 'static>(self, client: C) -> Self {
        self.with_tier(Arc::new(RemoteTier::new(client)))
    }

    #[inline]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Kinds of the configured tiers, fastest first.
    pub fn tier_kinds(&self) -> Vec<CacheTierKind> {
        self.tiers.iter().map(TierSlot::kind).collect()
    }

    /// The memory tier.
    pub fn memory(&self) -> &MemoryTier {
        &self.memory
    }

    /// Sets the authenticated caller, enabling principal-scoped tiers.
    pub fn set_principal(&self, principal: Principal) {
        debug!(user_id = %principal.user_id, "Cache principal set");
        *self.principal.write() = Some(principal);
    }

    /// Returns to anonymous access; principal-scoped tiers are skipped.
    pub fn clear_principal(&self) {
        *self.principal.write() = None;
    }

    pub fn principal(&self) -> Option<Principal> {
        self.principal.read().clone()
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    /// Looks `text` up under `model_version`, tier by tier.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn lookup(&self, text: &str, model_version: &str) -> CacheLookupResult {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let key = CacheKey::new(text, model_version);
        let principal = self.principal();
        let principal = principal.as_ref();
        let mut saw_expired = false;

        for (position, slot) in self.tiers.iter().enumerate() {
            if !slot.usable(principal) {
                continue;
            }

            let entry = match slot.tier.get(&key, principal).await {
                Ok(Some(entry)) => entry,
                Ok(None) => continue,
                Err(e) => {
                    slot.read_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(tier = %slot.kind(), error = %e, "Cache tier read failed");
                    continue;
                }
            };

            if entry.is_expired(self.ttl, Self::now_ms()) {
                saw_expired = true;
                debug!(tier = %slot.kind(), "Expired cache entry");
                if let Err(e) = slot.tier.remove(&key, principal).await {
                    slot.record_write_failure(&e, "remove_expired");
                }
                continue;
            }

            slot.hits.fetch_add(1, Ordering::Relaxed);
            self.total_hits.fetch_add(1, Ordering::Relaxed);

            for faster in &self.tiers[..position] {
                if !faster.usable(principal) {
                    continue;
                }
                if let Err(e) = faster.tier.set(&key, &entry, principal).await {
                    faster.record_write_failure(&e, "promote");
                }
            }

            debug!(tier = %slot.kind(), "Cache hit");
            return CacheLookupResult::Hit {
                embedding: entry.embedding,
                tier: slot.kind(),
            };
        }

        if saw_expired {
            self.expired.fetch_add(1, Ordering::Relaxed);
            CacheLookupResult::Expired
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            CacheLookupResult::Miss
        }
    }

    /// Returns the cached embedding, or `None` on a miss or an expired entry.
    pub async fn get(&self, text: &str, model_version: &str) -> Option<EmbeddingVector> {
        self.lookup(text, model_version).await.into_embedding()
    }

    /// Writes `embedding` for `text` to every usable tier. Never fails.
    #[instrument(skip(self, text, embedding), fields(text_len = text.len(), model_version = embedding.model_version()))]
    pub async fn set(&self, text: &str, embedding: &EmbeddingVector) {
        let key = CacheKey::new(text, embedding.model_version());
        let entry = CachedEmbedding::new(embedding.clone(), Self::now_ms());
        let principal = self.principal();
        let principal = principal.as_ref();

        for slot in &self.tiers {
            if !slot.usable(principal) {
                continue;
            }
            if let Err(e) = slot.tier.set(&key, &entry, principal).await {
                slot.record_write_failure(&e, "set");
            }
        }
    }

    /// Removes `text` under `model_version` from every usable tier.
    pub async fn remove(&self, text: &str, model_version: &str) -> bool {
        let key = CacheKey::new(text, model_version);
        let principal = self.principal();
        let principal = principal.as_ref();
        let mut removed = false;

        for slot in &self.tiers {
            if !slot.usable(principal) {
                continue;
            }
            match slot.tier.remove(&key, principal).await {
                Ok(hit) => removed |= hit,
                Err(e) => slot.record_write_failure(&e, "remove"),
            }
        }
        removed
    }

    /// Empties the memory and persistent tiers; returns the number of entries removed.
    pub async fn clear(&self) -> usize {
        let mut removed = 0;
        for slot in &self.tiers {
            match slot.tier.clear().await {
                Ok(count) => removed += count,
                Err(e) => slot.record_write_failure(&e, "clear"),
            }
        }
        debug!(removed, "Cache cleared");
        removed
    }

    /// Drops entries older than the TTL; returns the number removed.
    pub async fn purge_expired(&self) -> usize {
        let now_ms = Self::now_ms();
        let mut removed = 0;
        for slot in &self.tiers {
            match slot.tier.purge_expired(self.ttl, now_ms).await {
                Ok(count) => removed += count,
                Err(e) => slot.record_write_failure(&e, "purge_expired"),
            }
        }
        removed
    }

    pub async fn stats(&self) -> CacheStats {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_hits = self.total_hits.load(Ordering::Relaxed);

        let mut tiers = Vec::with_capacity(self.tiers.len());
        for slot in &self.tiers {
            let size = match slot.tier.size().await {
                Ok(size) => size,
                Err(e) => {
                    slot.read_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(tier = %slot.kind(), error = %e, "Cache tier size unavailable");
                    0
                }
            };
            tiers.push(TierStats {
                kind: slot.kind(),
                size,
                hits: slot.hits.load(Ordering::Relaxed),
                read_failures: slot.read_failures.load(Ordering::Relaxed),
                write_failures: slot.write_failures.load(Ordering::Relaxed),
            });
        }

        CacheStats {
            total_requests,
            total_hits,
            misses: self.misses.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            hit_rate: if total_requests == 0 {
                0.0
            } else {
                total_hits as f64 / total_requests as f64
            },
            tiers,
        }
    }
}
