use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::RemoteCacheClient;
use crate::cache::error::{CacheError, CacheResult};
use crate::cache::types::{CachedEmbedding, Principal};

/// In-memory remote cache partitioned by user id. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockRemoteCache {
    entries: Arc<Mutex<HashMap<(String, String), CachedEmbedding>>>,
    fail: Arc<AtomicBool>,
    fetches: Arc<AtomicUsize>,
    stores: Arc<AtomicUsize>,
}

impl MockRemoteCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call fail with a remote error until reset.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn store_count(&self) -> usize {
        self.stores.load(Ordering::SeqCst)
    }

    /// Entries stored for `user_id`.
    pub fn len_for(&self, user_id: &str) -> usize {
        self.entries
            .lock()
            .keys()
            .filter(|(user, _)| user == user_id)
            .count()
    }

    /// Seeds an entry directly.
    pub fn insert(&self, user_id: &str, key: &str, entry: CachedEmbedding) {
        self.entries
            .lock()
            .insert((user_id.to_string(), key.to_string()), entry);
    }

    fn check(&self) -> CacheResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CacheError::Remote {
                reason: "mock remote unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteCacheClient for MockRemoteCache {
    async fn fetch(
        &self,
        key: &str,
        principal: &Principal,
    ) -> CacheResult<Option<CachedEmbedding>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self
            .entries
            .lock()
            .get(&(principal.user_id.clone(), key.to_string()))
            .cloned())
    }

    async fn store(
        &self,
        key: &str,
        entry: &CachedEmbedding,
        principal: &Principal,
    ) -> CacheResult<()> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.entries
            .lock()
            .insert((principal.user_id.clone(), key.to_string()), entry.clone());
        Ok(())
    }

    async fn delete(&self, key: &str, principal: &Principal) -> CacheResult<bool> {
        self.check()?;
        Ok(self
            .entries
            .lock()
            .remove(&(principal.user_id.clone(), key.to_string()))
            .is_some())
    }
}
