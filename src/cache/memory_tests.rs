use std::time::Duration;

use super::*;
use crate::embedding::EmbeddingVector;

fn entry(text: &str, stored_at: i64) -> CachedEmbedding {
    CachedEmbedding::new(
        EmbeddingVector::with_timestamp(text, vec![1.0, 0.0], "v1", stored_at),
        stored_at,
    )
}

fn key(text: &str) -> CacheKey {
    CacheKey::new(text, "v1")
}

#[test]
fn test_cache_key_separates_model_versions() {
    let a = CacheKey::new("same text", "v1");
    let b = CacheKey::new("same text", "v2");
    assert_eq!(a.text_hash(), b.text_hash());
    assert_ne!(a, b);
    assert_ne!(a.storage_key(), b.storage_key());
    assert!(a.storage_key().ends_with(":v1"));
}

#[test]
fn test_cached_embedding_expiry() {
    let cached = entry("x", 1_000);
    let ttl = Duration::from_millis(500);
    assert!(!cached.is_expired(ttl, 1_500));
    assert!(cached.is_expired(ttl, 1_501));
    assert_eq!(cached.age_ms(500), 0);
}

#[test]
fn test_lookup_result_accessors() {
    let hit = CacheLookupResult::Hit {
        embedding: entry("x", 0).embedding,
        tier: CacheTierKind::Persistent,
    };
    assert!(hit.is_hit());
    assert_eq!(hit.tier(), Some(CacheTierKind::Persistent));
    assert!(hit.into_embedding().is_some());

    assert!(!CacheLookupResult::Expired.is_hit());
    assert!(CacheLookupResult::Miss.into_embedding().is_none());
}

#[test]
fn test_tier_kind_order() {
    assert!(CacheTierKind::Memory < CacheTierKind::Persistent);
    assert!(CacheTierKind::Persistent < CacheTierKind::Remote);
    assert_eq!(CacheTierKind::Remote.to_string(), "remote");
}

#[test]
fn test_principal_debug_redacts_token() {
    let principal = Principal::new("user-1", "super-secret");
    let rendered = format!("{:?}", principal);
    assert!(rendered.contains("user-1"));
    assert!(!rendered.contains("super-secret"));
}

#[test]
fn test_memory_tier_insert_and_lookup() {
    let tier = MemoryTier::new(10);
    assert!(tier.is_empty());

    tier.insert(key("a"), entry("a", 0));
    let found = tier.lookup(&key("a")).unwrap();
    assert_eq!(found.embedding.text(), "a");
    assert_eq!(found.access_count, 1);

    let again = tier.lookup(&key("a")).unwrap();
    assert_eq!(again.access_count, 2);
    assert!(again.last_accessed >= found.last_accessed);

    assert!(tier.lookup(&key("missing")).is_none());
}

#[test]
fn test_memory_tier_evicts_least_recently_used() {
    let tier = MemoryTier::new(2);

    tier.insert(key("a"), entry("a", 0));
    tier.insert(key("b"), entry("b", 0));
    assert!(tier.lookup(&key("a")).is_some());

    tier.insert(key("c"), entry("c", 0));

    assert_eq!(tier.len(), 2);
    assert!(tier.contains(&key("a")));
    assert!(!tier.contains(&key("b")));
    assert!(tier.contains(&key("c")));
}

#[test]
fn test_memory_tier_never_exceeds_capacity() {
    let tier = MemoryTier::new(5);
    for i in 0..50 {
        tier.insert(key(&format!("text {}", i)), entry("t", 0));
    }
    assert_eq!(tier.len(), 5);
    assert_eq!(tier.capacity(), 5);
}

#[tokio::test]
async fn test_memory_tier_purge_and_clear() {
    let tier = MemoryTier::new(10);
    tier.insert(key("old"), entry("old", 0));
    tier.insert(key("new"), entry("new", 10_000));

    let purged = tier
        .purge_expired(Duration::from_millis(5_000), 10_000)
        .await
        .unwrap();
    assert_eq!(purged, 1);
    assert!(!tier.contains(&key("old")));
    assert!(tier.contains(&key("new")));

    assert_eq!(tier.clear().await.unwrap(), 1);
    assert_eq!(tier.size().await.unwrap(), 0);
}

#[tokio::test]
async fn test_persistent_tier_round_trip_keeps_stored_at() {
    let tier = PersistentTier::new(crate::storage::MemoryStore::new());
    let cached = entry("persisted", 1_234);

    tier.set(&key("persisted"), &cached, None).await.unwrap();
    let loaded = tier.get(&key("persisted"), None).await.unwrap().unwrap();

    assert_eq!(loaded, cached);
    assert_eq!(tier.size().await.unwrap(), 1);
    assert!(tier.remove(&key("persisted"), None).await.unwrap());
    assert!(tier.get(&key("persisted"), None).await.unwrap().is_none());
}

#[tokio::test]
async fn test_persistent_tier_purges_expired() {
    let tier = PersistentTier::new(crate::storage::MemoryStore::new());
    tier.set(&key("old"), &entry("old", 0), None).await.unwrap();
    tier.set(&key("new"), &entry("new", 9_000), None).await.unwrap();

    let purged = tier
        .purge_expired(Duration::from_millis(5_000), 10_000)
        .await
        .unwrap();
    assert_eq!(purged, 1);
    assert_eq!(tier.size().await.unwrap(), 1);
}

#[tokio::test]
async fn test_persistent_tier_reports_corrupt_payload() {
    use crate::storage::RecordStore;

    let store = crate::storage::MemoryStore::new();
    store
        .put(EMBEDDING_COLLECTION, &key("bad").storage_key(), None, vec![1, 2, 3])
        .await
        .unwrap();

    let tier = PersistentTier::new(store);
    let result = tier.get(&key("bad"), None).await;
    assert!(matches!(result, Err(CacheError::Serialization { .. })));
}

#[tokio::test]
async fn test_remote_tier_requires_principal() {
    let remote = MockRemoteCache::new();
    let tier = RemoteTier::new(remote.clone());
    let principal = Principal::new("user-1", "token");

    assert!(tier.requires_principal());
    tier.set(&key("r"), &entry("r", 0), None).await.unwrap();
    assert_eq!(remote.store_count(), 0);

    tier.set(&key("r"), &entry("r", 0), Some(&principal))
        .await
        .unwrap();
    assert_eq!(remote.len_for("user-1"), 1);
    assert!(tier.get(&key("r"), None).await.unwrap().is_none());
    assert!(tier.get(&key("r"), Some(&principal)).await.unwrap().is_some());

    let other = Principal::new("user-2", "token");
    assert!(tier.get(&key("r"), Some(&other)).await.unwrap().is_none());
}

#[test]
fn test_http_remote_cache_url_encoding() {
    let client = HttpRemoteCache::new("http://cache.local/api/", DEFAULT_REMOTE_TIMEOUT).unwrap();
    let url = client.entry_url("abc:model v1").unwrap();
    assert_eq!(url.as_str(), "http://cache.local/api/embeddings/abc:model%20v1");
}

#[test]
fn test_http_remote_cache_rejects_bad_config() {
    assert!(matches!(
        HttpRemoteCache::new("not a url", DEFAULT_REMOTE_TIMEOUT),
        Err(CacheError::InvalidConfig { .. })
    ));
    assert!(matches!(
        HttpRemoteCache::new("ftp://cache.local", DEFAULT_REMOTE_TIMEOUT),
        Err(CacheError::InvalidConfig { .. })
    ));
    assert!(matches!(
        HttpRemoteCache::new("http://cache.local", Duration::ZERO),
        Err(CacheError::InvalidConfig { .. })
    ));
}
