use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::json;
use tempfile::TempDir;
use tokio::sync::Notify;

use super::*;
use crate::storage::{DiskStore, MemoryStore, RecordStore, StorageResult};

fn record(id: &str, document_id: &str, vector: Vec<f32>) -> StoredVector {
    StoredVector::new(id, document_id, id, format!("text of {}", id), vector)
}

fn memory_store() -> VectorStore<MemoryStore> {
    VectorStore::new(MemoryStore::new(), VectorStoreConfig::default())
}

async fn seeded() -> VectorStore<MemoryStore> {
    let store = memory_store();
    store
        .store_batch(vec![
            record("a#0", "a", vec![1.0, 0.0, 0.0]),
            record("a#1", "a", vec![0.8, 0.6, 0.0]),
            record("b#0", "b", vec![0.0, 1.0, 0.0]),
            record("b#1", "b", vec![0.6, 0.0, 0.8]),
            record("c#0", "c", vec![0.0, 0.0, 1.0]),
        ])
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn test_store_and_get() {
    let store = memory_store();
    let rec = record("p1", "doc", vec![0.1, 0.2]).with_metadata("lang", "en");

    store.store(rec.clone()).await.unwrap();

    assert_eq!(store.get("p1").await.unwrap(), Some(rec));
    assert!(store.get("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_store_is_upsert() {
    let store = memory_store();
    store.store(record("p1", "doc", vec![1.0, 0.0])).await.unwrap();
    store
        .store(record("p1", "doc", vec![0.0, 1.0]).with_metadata("v", "2"))
        .await
        .unwrap();

    let loaded = store.get("p1").await.unwrap().unwrap();
    assert_eq!(loaded.vector, vec![0.0, 1.0]);
    assert_eq!(loaded.metadata.get("v").map(String::as_str), Some("2"));
    assert_eq!(store.count().await.unwrap(), 1);
}

#[tokio::test]
async fn test_store_batch_last_write_wins() {
    let store = memory_store();
    let written = store
        .store_batch(vec![
            record("dup", "doc", vec![1.0, 0.0]),
            record("other", "doc", vec![0.5, 0.5]),
            record("dup", "doc", vec![0.0, 1.0]),
        ])
        .await
        .unwrap();

    assert_eq!(written, 2);
    assert_eq!(store.get("dup").await.unwrap().unwrap().vector, vec![0.0, 1.0]);
}

#[tokio::test]
async fn test_store_batch_validates_before_writing() {
    let store = memory_store();
    let result = store
        .store_batch(vec![
            record("ok", "doc", vec![1.0]),
            record("bad", "doc", vec![]),
        ])
        .await;

    assert!(matches!(result, Err(VectorStoreError::InvalidVector { .. })));
    assert_eq!(store.count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_rejects_invalid_records() {
    let store = memory_store();
    assert!(store.store(record("", "doc", vec![1.0])).await.is_err());
    assert!(store.store(record("id", "", vec![1.0])).await.is_err());
    assert!(store.store(record("id", "doc", vec![f32::NAN])).await.is_err());
}

#[tokio::test]
async fn test_dimension_enforced_when_configured() {
    let store = VectorStore::new(
        MemoryStore::new(),
        VectorStoreConfig::default().with_dimension(3),
    );

    let err = store.store(record("p", "d", vec![1.0, 0.0])).await.unwrap_err();
    assert!(matches!(
        err,
        VectorStoreError::DimensionMismatch {
            expected: 3,
            actual: 2
        }
    ));

    let err = store
        .find_similar(&[1.0, 0.0], &SearchOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, VectorStoreError::DimensionMismatch { .. }));
}

#[tokio::test]
async fn test_get_by_document() {
    let store = seeded().await;

    let a = store.get_by_document("a").await.unwrap();
    let ids: Vec<&str> = a.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["a#0", "a#1"]);

    assert!(store.get_by_document("zzz").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_find_similar_sorted_and_truncated() {
    let store = seeded().await;

    let matches = store
        .find_similar(&[1.0, 0.0, 0.0], &SearchOptions::new(0.0, 3))
        .await
        .unwrap();

    let ids: Vec<&str> = matches.iter().map(|m| m.record.id.as_str()).collect();
    assert_eq!(ids, vec!["a#0", "a#1", "b#1"]);
    assert!((matches[0].score - 1.0).abs() < 1e-6);
    for pair in matches.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[tokio::test]
async fn test_find_similar_threshold_monotonic() {
    let store = seeded().await;
    let query = [0.7, 0.7, 0.1];

    let strict = store
        .find_similar(&query, &SearchOptions::new(0.9, 100))
        .await
        .unwrap();
    let loose = store
        .find_similar(&query, &SearchOptions::new(0.1, 100))
        .await
        .unwrap();

    assert!(strict.len() <= loose.len());
    assert!(strict.iter().all(|m| m.score >= 0.9));
    assert!(loose.iter().all(|m| m.score >= 0.1));
}

#[tokio::test]
async fn test_find_similar_document_filter_and_exclusions() {
    let store = seeded().await;

    let matches = store
        .find_similar(
            &[1.0, 0.0, 0.0],
            &SearchOptions::new(-1.0, 10).with_document("b"),
        )
        .await
        .unwrap();
    assert!(matches.iter().all(|m| m.record.document_id == "b"));
    assert_eq!(matches.len(), 2);

    let matches = store
        .find_similar(
            &[1.0, 0.0, 0.0],
            &SearchOptions::new(-1.0, 10)
                .with_documents(["a", "c"])
                .excluding("a#0"),
        )
        .await
        .unwrap();
    let ids: Vec<&str> = matches.iter().map(|m| m.record.id.as_str()).collect();
    assert_eq!(ids, vec!["a#1", "c#0"]);
}

#[tokio::test]
async fn test_find_similar_rejects_empty_query() {
    let store = seeded().await;
    let result = store.find_similar(&[], &SearchOptions::default()).await;
    assert!(matches!(result, Err(VectorStoreError::InvalidQuery { .. })));
}

#[tokio::test]
async fn test_find_similar_on_empty_store() {
    let store = memory_store();
    let matches = store
        .find_similar(&[1.0, 0.0], &SearchOptions::default())
        .await
        .unwrap();
    assert!(matches.is_empty());
}

#[tokio::test]
async fn test_delete_by_document_cascades_exactly() {
    let store = seeded().await;

    assert_eq!(store.delete_by_document("a").await.unwrap(), 2);
    assert!(store.get("a#0").await.unwrap().is_none());
    assert!(store.get("a#1").await.unwrap().is_none());
    assert!(store.get("b#0").await.unwrap().is_some());
    assert_eq!(store.count().await.unwrap(), 3);
    assert_eq!(store.list_documents().await.unwrap(), vec!["b", "c"]);

    assert_eq!(store.delete_by_document("a").await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_and_clear() {
    let store = seeded().await;

    assert!(store.delete("c#0").await.unwrap());
    assert!(!store.delete("c#0").await.unwrap());

    store.set_metadata("progress", &json!({"done": 4})).await.unwrap();
    assert_eq!(store.clear().await.unwrap(), 4);
    assert_eq!(store.count().await.unwrap(), 0);
    assert!(store.get("a#0").await.unwrap().is_none());
    assert_eq!(
        store.get_metadata("progress").await.unwrap(),
        Some(json!({"done": 4}))
    );
}

#[tokio::test]
async fn test_metadata_round_trip() {
    let store = memory_store();
    assert!(store.get_metadata("k").await.unwrap().is_none());

    store
        .set_metadata("index:progress", &json!({"indexed": ["a", "b"], "total": 2}))
        .await
        .unwrap();
    assert_eq!(
        store.get_metadata("index:progress").await.unwrap(),
        Some(json!({"indexed": ["a", "b"], "total": 2}))
    );

    assert!(store.delete_metadata("index:progress").await.unwrap());
    assert!(store.get_metadata("index:progress").await.unwrap().is_none());
}

#[tokio::test]
async fn test_stats_track_cache_and_searches() {
    let store = seeded().await;

    store.get("a#0").await.unwrap();
    store
        .find_similar(&[1.0, 0.0, 0.0], &SearchOptions::default())
        .await
        .unwrap();

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.total_vectors, 5);
    assert_eq!(stats.cache_size, 5);
    assert_eq!(stats.total_searches, 1);
    assert_eq!(stats.cache_hit_rate, 1.0);
}

#[tokio::test]
async fn test_read_cache_is_bounded() {
    let store = VectorStore::new(
        MemoryStore::new(),
        VectorStoreConfig::default().with_cache_capacity(2),
    );
    for i in 0..6 {
        store
            .store(record(&format!("p{}", i), "doc", vec![i as f32 + 1.0]))
            .await
            .unwrap();
    }

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.cache_size, 2);
    assert_eq!(stats.total_vectors, 6);

    let loaded = store.get("p0").await.unwrap();
    assert!(loaded.is_some());
}

#[tokio::test]
async fn test_disk_backed_store_survives_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let store = VectorStore::new(DiskStore::new(dir.path()), VectorStoreConfig::default());
        store
            .store_batch(vec![
                record("d#0", "d", vec![1.0, 0.0]),
                record("d#1", "d", vec![0.0, 1.0]),
            ])
            .await
            .unwrap();
        store.set_metadata("version", &json!(1)).await.unwrap();
    }

    let reopened = VectorStore::new(DiskStore::new(dir.path()), VectorStoreConfig::default());
    assert_eq!(reopened.count().await.unwrap(), 2);
    assert_eq!(reopened.list_documents().await.unwrap(), vec!["d"]);
    assert_eq!(reopened.get_metadata("version").await.unwrap(), Some(json!(1)));

    let matches = reopened
        .find_similar(&[0.0, 1.0], &SearchOptions::new(0.5, 5))
        .await
        .unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0].record.id, "d#1");
}

/// Pauses the next armed `get` after it has read from the inner store.
#[derive(Clone, Default)]
struct GatedStore {
    inner: MemoryStore,
    armed: Arc<AtomicBool>,
    reached: Arc<Notify>,
    release: Arc<Notify>,
}

impl GatedStore {
    fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl RecordStore for GatedStore {
    async fn get(&self, collection: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let bytes = self.inner.get(collection, key).await?;
        if self.armed.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.release.notified().await;
        }
        Ok(bytes)
    }

    async fn put(
        &self,
        collection: &str,
        key: &str,
        index_key: Option<&str>,
        payload: Vec<u8>,
    ) -> StorageResult<()> {
        self.inner.put(collection, key, index_key, payload).await
    }

    async fn delete(&self, collection: &str, key: &str) -> StorageResult<bool> {
        self.inner.delete(collection, key).await
    }

    async fn clear(&self, collection: &str) -> StorageResult<usize> {
        self.inner.clear(collection).await
    }

    async fn keys(&self, collection: &str) -> StorageResult<Vec<String>> {
        self.inner.keys(collection).await
    }

    async fn keys_by_index(&self, collection: &str, index_key: &str) -> StorageResult<Vec<String>> {
        self.inner.keys_by_index(collection, index_key).await
    }

    async fn index_values(&self, collection: &str) -> StorageResult<Vec<String>> {
        self.inner.index_values(collection).await
    }
}

/// A store over `gated` whose read cache starts empty, with `p1` already persisted.
async fn gated_with_p1() -> (Arc<VectorStore<GatedStore>>, GatedStore) {
    let gated = GatedStore::default();
    VectorStore::new(gated.inner.clone(), VectorStoreConfig::default())
        .store(record("p1", "doc", vec![1.0, 0.0]))
        .await
        .unwrap();
    let store = Arc::new(VectorStore::new(gated.clone(), VectorStoreConfig::default()));
    (store, gated)
}

#[tokio::test]
async fn test_delete_during_read_does_not_leave_stale_cache_entry() {
    let (store, gated) = gated_with_p1().await;

    gated.arm();
    let reader = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.get("p1").await }
    });
    gated.reached.notified().await;

    assert!(store.delete("p1").await.unwrap());
    gated.release.notify_one();
    reader.await.unwrap().unwrap();

    assert!(store.get("p1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_store_during_read_does_not_leave_stale_cache_entry() {
    let (store, gated) = gated_with_p1().await;

    gated.arm();
    let reader = tokio::spawn({
        let store = Arc::clone(&store);
        async move { store.get("p1").await }
    });
    gated.reached.notified().await;

    store
        .store(record("p1", "doc", vec![0.0, 1.0]))
        .await
        .unwrap();
    gated.release.notify_one();
    let seen = reader.await.unwrap().unwrap().unwrap();
    assert_eq!(seen.vector, vec![1.0, 0.0]);

    let current = store.get("p1").await.unwrap().unwrap();
    assert_eq!(current.vector, vec![0.0, 1.0]);
}

#[tokio::test]
async fn test_replace_document_removes_stale_records() {
    let store = seeded().await;

    let (stored, removed) = store
        .replace_document("a", vec![record("a#0", "a", vec![0.0, 0.0, 1.0])])
        .await
        .unwrap();

    assert_eq!((stored, removed), (1, 1));
    let ids: Vec<String> = store
        .get_by_document("a")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert_eq!(ids, vec!["a#0"]);
    assert_eq!(store.get_by_document("b").await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_replace_document_restores_previous_records_on_write_failure() {
    let store = seeded().await;
    let before = store.get_by_document("a").await.unwrap();

    store.backing_store().fail_nth_put(2);
    let result = store
        .replace_document(
            "a",
            vec![
                record("a#0", "a", vec![0.0, 0.0, 1.0]),
                record("a#1", "a", vec![0.0, 1.0, 0.0]),
                record("a#2", "a", vec![0.5, 0.5, 0.0]),
            ],
        )
        .await;

    assert!(matches!(result, Err(VectorStoreError::Storage(_))));
    assert_eq!(store.get_by_document("a").await.unwrap(), before);
    assert_eq!(store.count().await.unwrap(), 5);
}

#[tokio::test]
async fn test_replace_document_rejects_foreign_records() {
    let store = seeded().await;

    let result = store
        .replace_document("a", vec![record("b#9", "b", vec![1.0, 0.0, 0.0])])
        .await;

    assert!(matches!(result, Err(VectorStoreError::InvalidVector { .. })));
    assert_eq!(store.get_by_document("a").await.unwrap().len(), 2);
}
