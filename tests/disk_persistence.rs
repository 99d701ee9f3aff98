//! Integration tests for state that must survive a restart.

mod common;

use std::sync::atomic::Ordering;

use common::fixtures::{assembler, create_batch_vectors, keyword_model, sample_documents};
use sieve::cache::{CacheTierKind, TieredEmbeddingCache};
use sieve::rag::RetrievalOptions;
use sieve::storage::DiskStore;
use sieve::vectordb::{SearchOptions, VectorStore, VectorStoreConfig};
use tempfile::TempDir;

async fn disk_stores(dir: &TempDir) -> (DiskStore, DiskStore) {
    let cache = DiskStore::new(dir.path().join("cache"));
    cache.ensure_root().await.unwrap();
    let vectors = DiskStore::new(dir.path().join("vectors"));
    vectors.ensure_root().await.unwrap();
    (cache, vectors)
}

#[tokio::test]
async fn test_index_survives_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let (cache, vectors) = disk_stores(&dir).await;
        let rag = assembler(
            keyword_model(),
            vectors,
            TieredEmbeddingCache::in_memory(100).with_persistent(cache),
        );
        let report = rag.index_documents(&sample_documents()).await;
        assert!(report.is_complete());
    }

    let (cache, vectors) = disk_stores(&dir).await;
    let rag = assembler(
        keyword_model(),
        vectors,
        TieredEmbeddingCache::in_memory(100).with_persistent(cache),
    );

    assert_eq!(
        rag.store().list_documents().await.unwrap(),
        vec!["finance", "pets", "rust"]
    );
    let chunks = rag
        .retrieve("invoice and tax", &RetrievalOptions::default())
        .await
        .unwrap();
    assert!(!chunks.is_empty());
    assert!(chunks.iter().all(|c| c.document_id() == Some("finance")));
}

#[tokio::test]
async fn test_persistent_cache_avoids_recomputation_after_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let (cache, vectors) = disk_stores(&dir).await;
        let rag = assembler(
            keyword_model(),
            vectors,
            TieredEmbeddingCache::in_memory(100).with_persistent(cache),
        );
        rag.index_documents(&sample_documents()).await;
    }

    let model = keyword_model();
    let calls = model.calls();
    let (cache, vectors) = disk_stores(&dir).await;
    let rag = assembler(
        model,
        vectors,
        TieredEmbeddingCache::in_memory(100).with_persistent(cache),
    );

    let report = rag.index_documents(&sample_documents()).await;
    assert!(report.is_complete());
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let stats = rag.cache().stats().await;
    let persistent = stats.tier(CacheTierKind::Persistent).unwrap();
    assert!(persistent.hits > 0);
    assert!(persistent.size > 0);
}

#[tokio::test]
async fn test_removal_survives_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let (_, vectors) = disk_stores(&dir).await;
        let rag = assembler(
            keyword_model(),
            vectors,
            TieredEmbeddingCache::in_memory(100),
        );
        rag.index_documents(&sample_documents()).await;
        assert!(rag.remove_document("rust").await.unwrap() > 0);
    }

    let (_, vectors) = disk_stores(&dir).await;
    let store = VectorStore::new(vectors, VectorStoreConfig::default());
    assert_eq!(store.list_documents().await.unwrap(), vec!["finance", "pets"]);
    assert!(store.get_by_document("rust").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_vector_store_reopen_keeps_search_results() {
    let dir = TempDir::new().unwrap();
    let records = create_batch_vectors(12, 3);
    let query = records[4].vector.clone();

    let before = {
        let (_, vectors) = disk_stores(&dir).await;
        let store = VectorStore::new(vectors, VectorStoreConfig::default());
        assert_eq!(store.store_batch(records).await.unwrap(), 12);
        store
            .find_similar(&query, &SearchOptions::new(-1.0, 5))
            .await
            .unwrap()
    };

    let (_, vectors) = disk_stores(&dir).await;
    let store = VectorStore::new(vectors, VectorStoreConfig::default());
    let after = store
        .find_similar(&query, &SearchOptions::new(-1.0, 5))
        .await
        .unwrap();

    assert_eq!(store.count().await.unwrap(), 12);
    assert_eq!(after.len(), 5);
    assert_eq!(after[0].record.id, "vec-4");
    assert_eq!(
        before.iter().map(|m| &m.record.id).collect::<Vec<_>>(),
        after.iter().map(|m| &m.record.id).collect::<Vec<_>>()
    );
}

#[tokio::test]
async fn test_corrupted_record_is_skipped_on_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let (_, vectors) = disk_stores(&dir).await;
        let store = VectorStore::new(vectors, VectorStoreConfig::default());
        store.store_batch(create_batch_vectors(4, 2)).await.unwrap();
    }

    let collection_dir = std::fs::read_dir(dir.path().join("vectors"))
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| path.is_dir())
        .expect("vector collection directory");
    let victim = std::fs::read_dir(&collection_dir)
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .find(|path| path.extension().is_some_and(|ext| ext == "rkyv"))
        .expect("record file");
    std::fs::write(&victim, b"not an archive").unwrap();

    let (_, vectors) = disk_stores(&dir).await;
    let store = VectorStore::new(vectors, VectorStoreConfig::default());
    let query = common::fixtures::generate_deterministic_vector(0, 10);

    let matches = store
        .find_similar(&query, &SearchOptions::new(-1.0, 10))
        .await
        .unwrap();
    assert_eq!(matches.len(), 3);
}
