use std::time::Duration;

use async_trait::async_trait;

use super::error::CacheResult;
use super::types::{CacheKey, CacheTierKind, CachedEmbedding, Principal};

/// One level of the embedding cache.
///
/// Tiers store what they are given; expiry decisions belong to the caller, which passes
/// the TTL to [`purge_expired`](Self::purge_expired).
#[async_trait]
pub trait CacheTier: Send + Sync {
    fn kind(&self) -> CacheTierKind;

    /// Tiers that return `true` are skipped when no [`Principal`] is set.
    fn requires_principal(&self) -> bool {
        false
    }

    async fn get(
        &self,
        key: &CacheKey,
        principal: Option<&Principal>,
    ) -> CacheResult<Option<CachedEmbedding>>;

    async fn set(
        &self,
        key: &CacheKey,
        entry: &CachedEmbedding,
        principal: Option<&Principal>,
    ) -> CacheResult<()>;

    async fn remove(&self, key: &CacheKey, principal: Option<&Principal>) -> CacheResult<bool>;

    /// Drops every entry this tier owns; returns the number removed.
    async fn clear(&self) -> CacheResult<usize>;

    /// Drops entries older than `ttl`; returns the number removed.
    async fn purge_expired(&self, ttl: Duration, now_ms: i64) -> CacheResult<usize>;

    async fn size(&self) -> CacheResult<usize>;
}
