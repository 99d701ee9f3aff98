//! Local durable tier over a [`RecordStore`].

use std::time::Duration;

use async_trait::async_trait;
use rkyv::util::AlignedVec;
use tracing::debug;

use super::error::{CacheError, CacheResult};
use super::tier::CacheTier;
use super::types::{CacheKey, CacheTierKind, CachedEmbedding, Principal};
use crate::storage::RecordStore;

/// Collection holding cached embeddings.
pub const EMBEDDING_COLLECTION: &str = "embeddings";

fn encode(entry: &CachedEmbedding) -> CacheResult<Vec<u8>> {
    rkyv::to_bytes::<rkyv::rancor::Error>(entry)
        .map(|bytes| bytes.to_vec())
        .map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })
}

fn decode(bytes: &[u8]) -> CacheResult<CachedEmbedding> {
    let mut aligned = AlignedVec::<16>::with_capacity(bytes.len());
    aligned.extend_from_slice(bytes);
    rkyv::from_bytes::<CachedEmbedding, rkyv::rancor::Error>(&aligned).map_err(|e| {
        CacheError::Serialization {
            reason: e.to_string(),
        }
    })
}

/// Cache tier persisting rkyv-encoded entries, indexed by model version.
#[derive(Debug, Clone)]
pub struct PersistentTier<S: RecordStore> {
    store: S,
}

impl<S: RecordStore> PersistentTier<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S: RecordStore> CacheTier for PersistentTier<S> {
    fn kind(&self) -> CacheTierKind {
        CacheTierKind::Persistent
    }

    async fn get(
        &self,
        key: &CacheKey,
        _principal: Option<&Principal>,
    ) -> CacheResult<Option<CachedEmbedding>> {
        match self
            .store
            .get(EMBEDDING_COLLECTION, &key.storage_key())
            .await?
        {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &CacheKey,
        entry: &CachedEmbedding,
        _principal: Option<&Principal>,
    ) -> CacheResult<()> {
        let payload = encode(entry)?;
        self.store
            .put(
                EMBEDDING_COLLECTION,
                &key.storage_key(),
                Some(key.model_version()),
                payload,
            )
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &CacheKey, _principal: Option<&Principal>) -> CacheResult<bool> {
        Ok(self
            .store
            .delete(EMBEDDING_COLLECTION, &key.storage_key())
            .await?)
    }

    async fn clear(&self) -> CacheResult<usize> {
        Ok(self.store.clear(EMBEDDING_COLLECTION).await?)
    }

    async fn purge_expired(&self, ttl: Duration, now_ms: i64) -> CacheResult<usize> {
        let mut removed = 0;
        for storage_key in self.store.keys(EMBEDDING_COLLECTION).await? {
            let Some(bytes) = self.store.get(EMBEDDING_COLLECTION, &storage_key).await? else {
                continue;
            };
            let expired = match decode(&bytes) {
                Ok(entry) => entry.is_expired(ttl, now_ms),
                Err(_) => true,
            };
            if expired && self.store.delete(EMBEDDING_COLLECTION, &storage_key).await? {
                removed += 1;
            }
        }
        debug!(removed, "Purged expired persistent entries");
        Ok(removed)
    }

    async fn size(&self) -> CacheResult<usize> {
        Ok(self.store.count(EMBEDDING_COLLECTION).await?)
    }
}
