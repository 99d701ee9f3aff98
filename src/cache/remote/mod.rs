//! Optional shared tier reached over the network, scoped to an authenticated principal.

pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use http::{DEFAULT_REMOTE_TIMEOUT, HttpRemoteCache};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockRemoteCache;

use std::time::Duration;

use async_trait::async_trait;

use super::error::CacheResult;
use super::tier::CacheTier;
use super::types::{CacheKey, CacheTierKind, CachedEmbedding, Principal};

/// Client for a remote embedding cache. Keys are [`CacheKey::storage_key`] strings.
#[async_trait]
pub trait RemoteCacheClient: Send + Sync {
    async fn fetch(&self, key: &str, principal: &Principal)
    -> CacheResult<Option<CachedEmbedding>>;

    async fn store(
        &self,
        key: &str,
        entry: &CachedEmbedding,
        principal: &Principal,
    ) -> CacheResult<()>;

    async fn delete(&self, key: &str, principal: &Principal) -> CacheResult<bool>;
}

/// Adapts a [`RemoteCacheClient`] to the [`CacheTier`] interface.
///
/// Without a principal every operation is a silent no-op. The remote store is shared and
/// owned elsewhere, so `clear`, `purge_expired` and `size` do not touch it.
#[derive(Debug, Clone)]
pub struct RemoteTier<C: RemoteCacheClient> {
    client: C,
}

impl<C: RemoteCacheClient> RemoteTier<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

#[async_trait]
impl<C: RemoteCacheClient> CacheTier for RemoteTier<C> {
    fn kind(&self) -> CacheTierKind {
        CacheTierKind::Remote
    }

    fn requires_principal(&self) -> bool {
        true
    }

    async fn get(
        &self,
        key: &CacheKey,
        principal: Option<&Principal>,
    ) -> CacheResult<Option<CachedEmbedding>> {
        match principal {
            Some(principal) => self.client.fetch(&key.storage_key(), principal).await,
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &CacheKey,
        entry: &CachedEmbedding,
        principal: Option<&Principal>,
    ) -> CacheResult<()> {
        match principal {
            Some(principal) => {
                self.client
                    .store(&key.storage_key(), entry, principal)
                    .await
            }
            None => Ok(()),
        }
    }

    async fn remove(&self, key: &CacheKey, principal: Option<&Principal>) -> CacheResult<bool> {
        match principal {
            Some(principal) => self.client.delete(&key.storage_key(), principal).await,
            None => Ok(false),
        }
    }

    async fn clear(&self) -> CacheResult<usize> {
        Ok(0)
    }

    async fn purge_expired(&self, _ttl: Duration, _now_ms: i64) -> CacheResult<usize> {
        Ok(0)
    }

    async fn size(&self) -> CacheResult<usize> {
        Ok(0)
    }
}
