use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::stream::{self, StreamExt};
use moka::policy::EvictionPolicy;
use moka::sync::Cache;
use parking_lot::Mutex;
use rkyv::util::AlignedVec;
use tracing::{debug, info, instrument, warn};

use super::error::{VectorStoreError, VectorStoreResult};
use super::model::{SearchOptions, StoredVector, VectorMatch, VectorStoreStats};
use crate::constants::DEFAULT_VECTOR_CACHE_CAPACITY;
use crate::similarity::cosine_similarity;
use crate::storage::RecordStore;

/// Collection holding vector records, indexed by document id.
pub const VECTOR_COLLECTION: &str = "vectors";

/// Collection holding free-form JSON metadata.
pub const METADATA_COLLECTION: &str = "metadata";

const DEFAULT_WRITE_CONCURRENCY: usize = 16;

#[derive(Debug, Clone)]
/// Configuration for [`VectorStore`].
pub struct VectorStoreConfig {
    /// Max records in the read cache.
    pub cache_capacity: u64,
    /// When set, records and queries of any other length are rejected.
    pub dimension: Option<usize>,
    /// Max concurrent writes in [`VectorStore::store_batch`].
    pub write_concurrency: usize,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_VECTOR_CACHE_CAPACITY,
            dimension: None,
            write_concurrency: DEFAULT_WRITE_CONCURRENCY,
        }
    }
}

impl VectorStoreConfig {
    pub fn with_cache_capacity(mut self, capacity: u64) -> Self {
        self.cache_capacity = capacity;
        self
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = Some(dimension);
        self
    }

    pub fn with_write_concurrency(mut self, concurrency: usize) -> Self {
        self.write_concurrency = concurrency;
        self
    }
}

fn encode(record: &StoredVector) -> VectorStoreResult<Vec<u8>> {
    rkyv::to_bytes::<rkyv::rancor::Error>(record)
        .map(|bytes| bytes.to_vec())
        .map_err(|e| VectorStoreError::Serialization {
            reason: e.to_string(),
        })
}

fn decode(bytes: &[u8]) -> VectorStoreResult<StoredVector> {
    let mut aligned = AlignedVec::<16>::with_capacity(bytes.len());
    aligned.extend_from_slice(bytes);
    rkyv::from_bytes::<StoredVector, rkyv::rancor::Error>(&aligned).map_err(|e| {
        VectorStoreError::Serialization {
            reason: e.to_string(),
        }
    })
}

/// Vector records over a [`RecordStore`], fronted by a bounded LRU read cache.
///
/// Similarity search scores every candidate record (brute force).
///
/// Every completed write or delete bumps a generation counter; a read only fills the cache
/// if no write completed while it was loading from the backing store.
pub struct VectorStore<S: RecordStore> {
    store: S,
    config: VectorStoreConfig,
    cache: Cache<String, Arc<StoredVector>>,
    generation: Mutex<u64>,
    cache_lookups: AtomicU64,
    cache_hits: AtomicU64,
    total_searches: AtomicU64,
}

impl<S: RecordStore> std::fmt::Debug for VectorStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("config", &self.config)
            .field("cached", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl<S: RecordStore> VectorStore<S> {
    pub fn new(store: S, config: VectorStoreConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.cache_capacity)
            .eviction_policy(EvictionPolicy::lru())
            .build();
        Self {
            store,
            config,
            cache,
            generation: Mutex::new(0),
            cache_lookups: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            total_searches: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &VectorStoreConfig {
        &self.config
    }

    pub fn backing_store(&self) -> &S {
        &self.store
    }

    fn check_dimension(&self, actual: usize) -> VectorStoreResult<()> {
        match self.config.dimension {
            Some(expected) if expected != actual => {
                Err(VectorStoreError::DimensionMismatch { expected, actual })
            }
            _ => Ok(()),
        }
    }

    fn validate(&self, record: &StoredVector) -> VectorStoreResult<()> {
        let invalid = |reason: &str| VectorStoreError::InvalidVector {
            id: record.id.clone(),
            reason: reason.to_string(),
        };

        if record.id.is_empty() {
            return Err(invalid("id is empty"));
        }
        if record.document_id.is_empty() {
            return Err(invalid("document_id is empty"));
        }
        if record.vector.is_empty() {
            return Err(invalid("vector is empty"));
        }
        if record.vector.iter().any(|v| !v.is_finite()) {
            return Err(invalid("vector contains non-finite values"));
        }
        self.check_dimension(record.vector.len())
    }

    fn cache_insert(&self, record: StoredVector) {
        self.cache.insert(record.id.clone(), Arc::new(record));
        self.cache.run_pending_tasks();
    }

    /// Applies a cache update for a write that has reached the backing store.
    fn after_write(&self, update: impl FnOnce(&Cache<String, Arc<StoredVector>>)) {
        let mut generation = self.generation.lock();
        *generation += 1;
        update(&self.cache);
        self.cache.run_pending_tasks();
    }

    async fn write(&self, record: StoredVector) -> VectorStoreResult<()> {
        let payload = encode(&record)?;
        self.store
            .put(
                VECTOR_COLLECTION,
                &record.id,
                Some(&record.document_id),
                payload,
            )
            .await?;
        self.after_write(|cache| cache.insert(record.id.clone(), Arc::new(record)));
        Ok(())
    }

    /// Upserts one record.
    #[instrument(skip(self, record), fields(id = %record.id, document_id = %record.document_id))]
    pub async fn store(&self, record: StoredVector) -> VectorStoreResult<()> {
        self.validate(&record)?;
        self.write(record).await
    }

    /// Upserts several records. Every record is validated before any is written; within
    /// the batch, the last record for an id wins.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn store_batch(&self, records: Vec<StoredVector>) -> VectorStoreResult<usize> {
        for record in &records {
            self.validate(record)?;
        }

        let mut latest: HashMap<String, usize> = HashMap::with_capacity(records.len());
        for (position, record) in records.iter().enumerate() {
            latest.insert(record.id.clone(), position);
        }
        let unique: Vec<StoredVector> = records
            .into_iter()
            .enumerate()
            .filter(|(position, record)| latest.get(&record.id) == Some(position))
            .map(|(_, record)| record)
            .collect();

        let written = unique.len();
        let outcomes: Vec<VectorStoreResult<()>> =
            stream::iter(unique.into_iter().map(|record| self.write(record)))
                .buffer_unordered(self.config.write_concurrency.max(1))
                .collect()
                .await;
        outcomes.into_iter().collect::<VectorStoreResult<Vec<()>>>()?;

        debug!(written, "Stored vector batch");
        Ok(written)
    }

    /// Returns the record with `id`, if any.
    pub async fn get(&self, id: &str) -> VectorStoreResult<Option<StoredVector>> {
        self.cache_lookups.fetch_add(1, Ordering::Relaxed);
        if let Some(record) = self.cache.get(id) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(Some(record.as_ref().clone()));
        }

        let started = *self.generation.lock();
        let Some(bytes) = self.store.get(VECTOR_COLLECTION, id).await? else {
            return Ok(None);
        };
        let record = decode(&bytes)?;

        {
            let generation = self.generation.lock();
            if *generation == started {
                self.cache_insert(record.clone());
            }
        }
        Ok(Some(record))
    }

    async fn load_many(&self, ids: &[String]) -> VectorStoreResult<Vec<StoredVector>> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.get(id).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(VectorStoreError::Serialization { reason }) => {
                    warn!(id = %id, reason = %reason, "Skipping undecodable vector record");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(records)
    }

    /// All records of `document_id`, ordered by id.
    pub async fn get_by_document(&self, document_id: &str) -> VectorStoreResult<Vec<StoredVector>> {
        let ids = self
            .store
            .keys_by_index(VECTOR_COLLECTION, document_id)
            .await?;
        self.load_many(&ids).await
    }

    /// Records scoring at least `options.threshold` against `query`, best first, at most
    /// `options.top_k`. Ties are ordered by id.
    #[instrument(skip(self, query, options), fields(dim = query.len(), top_k = options.top_k))]
    pub async fn find_similar(
        &self,
        query: &[f32],
        options: &SearchOptions,
    ) -> VectorStoreResult<Vec<VectorMatch>> {
        if query.is_empty() {
            return Err(VectorStoreError::InvalidQuery {
                reason: "query vector is empty".to_string(),
            });
        }
        self.check_dimension(query.len())?;
        self.total_searches.fetch_add(1, Ordering::Relaxed);

        let candidate_ids: Vec<String> = if options.document_ids.is_empty() {
            self.store.keys(VECTOR_COLLECTION).await?
        } else {
            let mut ids = BTreeSet::new();
            for document_id in &options.document_ids {
                ids.extend(
                    self.store
                        .keys_by_index(VECTOR_COLLECTION, document_id)
                        .await?,
                );
            }
            ids.into_iter().collect()
        };

        let candidate_ids: Vec<String> = candidate_ids
            .into_iter()
            .filter(|id| !options.exclude_ids.contains(id))
            .collect();

        let mut matches = Vec::new();
        let mut skipped = 0usize;
        for record in self.load_many(&candidate_ids).await? {
            if record.vector.len() != query.len() {
                skipped += 1;
                continue;
            }
            let score = cosine_similarity(query, &record.vector)?;
            if score >= options.threshold {
                matches.push(VectorMatch { record, score });
            }
        }

        if skipped > 0 {
            warn!(skipped, "Skipped records with a different dimension");
        }

        matches.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        matches.truncate(options.top_k);

        debug!(
            candidates = candidate_ids.len(),
            matched = matches.len(),
            "Similarity search complete"
        );
        Ok(matches)
    }

    /// Removes one record; returns `false` if it did not exist.
    pub async fn delete(&self, id: &str) -> VectorStoreResult<bool> {
        let deleted = self.store.delete(VECTOR_COLLECTION, id).await?;
        self.after_write(|cache| cache.invalidate(id));
        Ok(deleted)
    }

    /// Removes every record of `document_id`; returns the number removed.
    #[instrument(skip(self))]
    pub async fn delete_by_document(&self, document_id: &str) -> VectorStoreResult<usize> {
        let ids = self
            .store
            .keys_by_index(VECTOR_COLLECTION, document_id)
            .await?;

        let mut removed = 0;
        for id in &ids {
            if self.delete(id).await? {
                removed += 1;
            }
        }

        debug!(removed, "Deleted document vectors");
        Ok(removed)
    }

    /// Replaces the records of `document_id` with `records`; returns `(stored, removed)`.
    ///
    /// New records are written before stale ones are removed. When a write fails the
    /// previous records are put back (best effort) and the write error is returned.
    #[instrument(skip(self, records), fields(count = records.len()))]
    pub async fn replace_document(
        &self,
        document_id: &str,
        records: Vec<StoredVector>,
    ) -> VectorStoreResult<(usize, usize)> {
        for record in &records {
            self.validate(record)?;
            if record.document_id != document_id {
                return Err(VectorStoreError::InvalidVector {
                    id: record.id.clone(),
                    reason: format!("belongs to document '{}'", record.document_id),
                });
            }
        }

        let previous = self.get_by_document(document_id).await?;
        let new_ids: HashSet<String> = records.iter().map(|r| r.id.clone()).collect();

        let stored = match self.store_batch(records).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Replacing document failed, restoring previous records");
                self.restore(&new_ids, previous).await;
                return Err(e);
            }
        };

        let mut removed = 0;
        for record in previous.iter().filter(|r| !new_ids.contains(&r.id)) {
            if self.delete(&record.id).await? {
                removed += 1;
            }
        }

        debug!(stored, removed, "Replaced document vectors");
        Ok((stored, removed))
    }

    async fn restore(&self, attempted: &HashSet<String>, previous: Vec<StoredVector>) {
        let kept: HashSet<&str> = previous.iter().map(|r| r.id.as_str()).collect();
        for id in attempted.iter().filter(|id| !kept.contains(id.as_str())) {
            if let Err(e) = self.delete(id).await {
                warn!(id = %id, error = %e, "Failed to remove partially written record");
            }
        }
        for record in previous {
            let id = record.id.clone();
            if let Err(e) = self.write(record).await {
                warn!(id = %id, error = %e, "Failed to restore previous record");
            }
        }
    }

    /// Removes every vector record. Metadata is kept.
    pub async fn clear(&self) -> VectorStoreResult<usize> {
        let removed = self.store.clear(VECTOR_COLLECTION).await?;
        self.after_write(|cache| cache.invalidate_all());
        info!(removed, "Vector store cleared");
        Ok(removed)
    }

    pub async fn count(&self) -> VectorStoreResult<usize> {
        Ok(self.store.count(VECTOR_COLLECTION).await?)
    }

    /// Distinct document ids with at least one record, sorted.
    pub async fn list_documents(&self) -> VectorStoreResult<Vec<String>> {
        Ok(self.store.index_values(VECTOR_COLLECTION).await?)
    }

    pub async fn set_metadata(&self, key: &str, value: &serde_json::Value) -> VectorStoreResult<()> {
        let payload = serde_json::to_vec(value).map_err(|e| VectorStoreError::Serialization {
            reason: e.to_string(),
        })?;
        self.store
            .put(METADATA_COLLECTION, key, None, payload)
            .await?;
        Ok(())
    }

    pub async fn get_metadata(&self, key: &str) -> VectorStoreResult<Option<serde_json::Value>> {
        let Some(bytes) = self.store.get(METADATA_COLLECTION, key).await? else {
            return Ok(None);
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| VectorStoreError::Serialization {
                reason: e.to_string(),
            })
    }

    pub async fn delete_metadata(&self, key: &str) -> VectorStoreResult<bool> {
        Ok(self.store.delete(METADATA_COLLECTION, key).await?)
    }

    pub async fn stats(&self) -> VectorStoreResult<VectorStoreStats> {
        let lookups = self.cache_lookups.load(Ordering::Relaxed);
        let hits = self.cache_hits.load(Ordering::Relaxed);
        self.cache.run_pending_tasks();

        Ok(VectorStoreStats {
            total_vectors: self.count().await?,
            cache_size: self.cache.entry_count() as usize,
            cache_hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            total_searches: self.total_searches.load(Ordering::Relaxed),
        })
    }
}
