use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::embedding::EmbeddingVector;
use crate::storage::MemoryStore;

fn embedding(text: &str, version: &str) -> EmbeddingVector {
    EmbeddingVector::new(text, vec![0.6, 0.8, 0.0], version)
}

fn layered(store: MemoryStore, remote: MockRemoteCache) -> TieredEmbeddingCache {
    TieredEmbeddingCache::new(TieredCacheConfig::default())
        .unwrap()
        .with_remote(remote)
        .with_persistent(store)
}

#[test]
fn test_config_validation() {
    assert!(TieredCacheConfig::default().validate().is_ok());
    assert!(
        TieredCacheConfig::default()
            .with_memory_capacity(0)
            .validate()
            .is_err()
    );
    assert!(
        TieredEmbeddingCache::new(TieredCacheConfig::default().with_ttl(Duration::ZERO)).is_err()
    );
}

#[test]
fn test_tiers_are_ordered_fastest_first() {
    let cache = layered(MemoryStore::new(), MockRemoteCache::new());
    assert_eq!(
        cache.tier_kinds(),
        vec![
            CacheTierKind::Memory,
            CacheTierKind::Persistent,
            CacheTierKind::Remote
        ]
    );
}

#[tokio::test]
async fn test_set_then_get_returns_equal_embedding() {
    let cache = TieredEmbeddingCache::in_memory(10);
    let emb = embedding("hello", "v1");

    cache.set("hello", &emb).await;
    let hit = cache.get("hello", "v1").await;

    assert_eq!(hit, Some(emb));
}

#[tokio::test]
async fn test_miss_on_every_tier_returns_none() {
    let cache = layered(MemoryStore::new(), MockRemoteCache::new());
    assert_eq!(
        cache.lookup("never stored", "v1").await,
        CacheLookupResult::Miss
    );
}

#[tokio::test]
async fn test_model_versions_do_not_cross() {
    let cache = TieredEmbeddingCache::in_memory(10);
    cache.set("same text", &embedding("same text", "v1")).await;

    assert!(cache.get("same text", "v2").await.is_none());
    assert!(cache.get("same text", "v1").await.is_some());
}

#[tokio::test]
async fn test_expired_entry_is_not_returned() {
    let store = MemoryStore::new();
    let cache = TieredEmbeddingCache::new(
        TieredCacheConfig::default().with_ttl(Duration::from_millis(20)),
    )
    .unwrap()
    .with_persistent(store.clone());

    cache.set("stale", &embedding("stale", "v1")).await;
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(cache.lookup("stale", "v1").await, CacheLookupResult::Expired);
    assert!(cache.get("stale", "v1").await.is_none());

    let stats = cache.stats().await;
    assert_eq!(stats.total_hits, 0);
    assert!(stats.expired >= 1);
    assert_eq!(stats.tier(CacheTierKind::Persistent).unwrap().size, 0);
}

#[tokio::test]
async fn test_expired_entry_in_lower_tier_is_not_promoted() {
    let store = MemoryStore::new();
    let old = CachedEmbedding::new(embedding("old", "v1"), 0);
    PersistentTier::new(store.clone())
        .set(&CacheKey::new("old", "v1"), &old, None)
        .await
        .unwrap();

    let cache = TieredEmbeddingCache::in_memory(10).with_persistent(store);

    assert!(cache.get("old", "v1").await.is_none());
    assert!(cache.memory().is_empty());
}

#[tokio::test]
async fn test_persistent_hit_is_promoted_to_memory() {
    let store = MemoryStore::new();
    let emb = embedding("promote me", "v1");

    {
        let writer = TieredEmbeddingCache::in_memory(10).with_persistent(store.clone());
        writer.set("promote me", &emb).await;
    }

    let cache = TieredEmbeddingCache::in_memory(10).with_persistent(store);
    assert!(cache.memory().is_empty());

    let first = cache.lookup("promote me", "v1").await;
    assert_eq!(first.tier(), Some(CacheTierKind::Persistent));

    let second = cache.lookup("promote me", "v1").await;
    assert_eq!(second.tier(), Some(CacheTierKind::Memory));
    assert_eq!(second.into_embedding(), Some(emb));

    let stats = cache.stats().await;
    assert_eq!(stats.total_requests, 2);
    assert_eq!(stats.total_hits, 2);
    assert_eq!(stats.tier(CacheTierKind::Persistent).unwrap().hits, 1);
    assert_eq!(stats.tier(CacheTierKind::Memory).unwrap().hits, 1);
}

#[tokio::test]
async fn test_remote_hit_is_promoted_to_faster_tiers() {
    let store = MemoryStore::new();
    let remote = MockRemoteCache::new();
    let principal = Principal::new("user-1", "token");
    let key = CacheKey::new("shared", "v1");
    remote.insert(
        "user-1",
        &key.storage_key(),
        CachedEmbedding::new(embedding("shared", "v1"), chrono::Utc::now().timestamp_millis()),
    );

    let cache = layered(store.clone(), remote.clone());
    cache.set_principal(principal);

    let hit = cache.lookup("shared", "v1").await;
    assert_eq!(hit.tier(), Some(CacheTierKind::Remote));

    assert!(cache.memory().contains(&key));
    let persisted = PersistentTier::new(store).get(&key, None).await.unwrap();
    assert!(persisted.is_some());
}

#[tokio::test]
async fn test_anonymous_caller_skips_remote() {
    let remote = MockRemoteCache::new();
    let cache = layered(MemoryStore::new(), remote.clone());

    cache.set("anon", &embedding("anon", "v1")).await;
    assert!(cache.get("missing", "v1").await.is_none());

    assert_eq!(remote.store_count(), 0);
    assert_eq!(remote.fetch_count(), 0);

    cache.set_principal(Principal::new("user-1", "token"));
    cache.set("authed", &embedding("authed", "v1")).await;
    assert_eq!(remote.len_for("user-1"), 1);

    cache.clear_principal();
    assert!(cache.principal().is_none());
}

#[tokio::test]
async fn test_remote_write_failure_does_not_block_other_tiers() {
    let store = MemoryStore::new();
    let remote = MockRemoteCache::new();
    remote.set_failing(true);

    let cache = layered(store.clone(), remote);
    cache.set_principal(Principal::new("user-1", "token"));

    cache.set("resilient", &embedding("resilient", "v1")).await;

    let stats = cache.stats().await;
    assert_eq!(stats.tier(CacheTierKind::Remote).unwrap().write_failures, 1);
    assert_eq!(stats.tier(CacheTierKind::Memory).unwrap().size, 1);
    assert_eq!(stats.tier(CacheTierKind::Persistent).unwrap().size, 1);
    assert!(cache.get("resilient", "v1").await.is_some());
}

#[tokio::test]
async fn test_persistent_read_failure_degrades_to_next_tier() {
    let store = MemoryStore::new();
    let remote = MockRemoteCache::new();
    let key = CacheKey::new("fallback", "v1");
    remote.insert(
        "user-1",
        &key.storage_key(),
        CachedEmbedding::new(embedding("fallback", "v1"), chrono::Utc::now().timestamp_millis()),
    );

    let cache = layered(store.clone(), remote);
    cache.set_principal(Principal::new("user-1", "token"));
    store.set_fail_reads(true);
    store.set_fail_writes(true);

    let hit = cache.lookup("fallback", "v1").await;
    assert_eq!(hit.tier(), Some(CacheTierKind::Remote));

    let stats = cache.stats().await;
    let persistent = stats.tier(CacheTierKind::Persistent).unwrap();
    assert!(persistent.read_failures >= 1);
    assert_eq!(persistent.write_failures, 1);
}

#[tokio::test]
async fn test_hit_rate_statistics() {
    let cache = TieredEmbeddingCache::in_memory(10);
    assert_eq!(cache.stats().await.hit_rate, 0.0);

    cache.set("a", &embedding("a", "v1")).await;
    cache.get("a", "v1").await;
    cache.get("a", "v1").await;
    cache.get("b", "v1").await;
    cache.get("c", "v1").await;

    let stats = cache.stats().await;
    assert_eq!(stats.total_requests, 4);
    assert_eq!(stats.total_hits, 2);
    assert_eq!(stats.misses, 2);
    assert!((stats.hit_rate - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_memory_tier_lru_cap_through_cache() {
    let cache = TieredEmbeddingCache::new(TieredCacheConfig::default().with_memory_capacity(3))
        .unwrap();

    for i in 0..10 {
        let text = format!("text {}", i);
        cache.set(&text, &embedding(&text, "v1")).await;
    }

    let stats = cache.stats().await;
    assert_eq!(stats.tier(CacheTierKind::Memory).unwrap().size, 3);
    assert!(cache.get("text 9", "v1").await.is_some());
    assert!(cache.get("text 0", "v1").await.is_none());
}

#[tokio::test]
async fn test_remove_and_clear() {
    let store = MemoryStore::new();
    let cache = TieredEmbeddingCache::in_memory(10).with_persistent(store);

    cache.set("one", &embedding("one", "v1")).await;
    cache.set("two", &embedding("two", "v1")).await;

    assert!(cache.remove("one", "v1").await);
    assert!(!cache.remove("one", "v1").await);
    assert!(cache.get("one", "v1").await.is_none());

    assert_eq!(cache.clear().await, 2);
    assert!(cache.get("two", "v1").await.is_none());
}

#[tokio::test]
async fn test_purge_expired_across_tiers() {
    let cache = TieredEmbeddingCache::new(
        TieredCacheConfig::default().with_ttl(Duration::from_millis(20)),
    )
    .unwrap()
    .with_persistent(MemoryStore::new());

    cache.set("short lived", &embedding("short lived", "v1")).await;
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(cache.purge_expired().await, 2);
    let stats = cache.stats().await;
    assert!(stats.tiers.iter().all(|t| t.size == 0));
}

#[tokio::test]
async fn test_with_custom_tier() {
    let extra: Arc<dyn CacheTier> = Arc::new(PersistentTier::new(MemoryStore::new()));
    let cache = TieredEmbeddingCache::in_memory(4).with_tier(extra);
    assert_eq!(
        cache.tier_kinds(),
        vec![CacheTierKind::Memory, CacheTierKind::Persistent]
    );
}
