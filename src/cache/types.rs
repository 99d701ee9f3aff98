use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingVector;
use crate::hashing::{embedding_key, hash_text};

/// Cache tiers, ordered fastest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CacheTierKind {
    Memory,
    Persistent,
    Remote,
}

impl CacheTierKind {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTierKind::Memory => "memory",
            CacheTierKind::Persistent => "persistent",
            CacheTierKind::Remote => "remote",
        }
    }
}

impl std::fmt::Display for CacheTierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cache key: BLAKE3 hash of the text plus the model version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    text_hash: [u8; 32],
    model_version: String,
}

impl CacheKey {
    pub fn new(text: &str, model_version: &str) -> Self {
        Self {
            text_hash: hash_text(text),
            model_version: model_version.to_string(),
        }
    }

    #[inline]
    pub fn text_hash(&self) -> &[u8; 32] {
        &self.text_hash
    }

    #[inline]
    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// String form used by the persistent and remote tiers.
    pub fn storage_key(&self) -> String {
        embedding_key(&self.text_hash, &self.model_version)
    }
}

/// An embedding as held by a cache tier, with access bookkeeping.
///
/// `stored_at` is the time of the original write; promotion between tiers keeps it, so an
/// entry's age is the same wherever it is found.
#[derive(
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    PartialEq,
)]
pub struct CachedEmbedding {
    pub embedding: EmbeddingVector,
    /// Unix millis of the original write.
    pub stored_at: i64,
    pub access_count: u64,
    /// Unix millis of the last hit.
    pub last_accessed: i64,
}

impl CachedEmbedding {
    pub fn new(embedding: EmbeddingVector, now_ms: i64) -> Self {
        Self {
            embedding,
            stored_at: now_ms,
            access_count: 0,
            last_accessed: now_ms,
        }
    }

    /// Age in millis at `now_ms` (never negative).
    #[inline]
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        (now_ms - self.stored_at).max(0)
    }

    /// `true` once the entry is older than `ttl`.
    #[inline]
    pub fn is_expired(&self, ttl: Duration, now_ms: i64) -> bool {
        self.age_ms(now_ms) as u128 > ttl.as_millis()
    }
}

/// Outcome of a tiered lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookupResult {
    Hit {
        embedding: EmbeddingVector,
        tier: CacheTierKind,
    },
    /// Found only entries older than the TTL.
    Expired,
    Miss,
}

impl CacheLookupResult {
    #[inline]
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookupResult::Hit { .. })
    }

    /// Tier that served the hit.
    #[inline]
    pub fn tier(&self) -> Option<CacheTierKind> {
        match self {
            CacheLookupResult::Hit { tier, .. } => Some(*tier),
            _ => None,
        }
    }

    pub fn into_embedding(self) -> Option<EmbeddingVector> {
        match self {
            CacheLookupResult::Hit { embedding, .. } => Some(embedding),
            CacheLookupResult::Expired | CacheLookupResult::Miss => None,
        }
    }
}

/// Authenticated caller; required for the remote tier.
#[derive(Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub access_token: String,
}

impl Principal {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
        }
    }
}

impl std::fmt::Debug for Principal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Principal")
            .field("user_id", &self.user_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

/// Counters for one tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierStats {
    pub kind: CacheTierKind,
    /// Entries currently held (0 where the tier cannot report it).
    pub size: usize,
    pub hits: u64,
    pub read_failures: u64,
    pub write_failures: u64,
}

/// Snapshot of [`TieredEmbeddingCache`](super::TieredEmbeddingCache) counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub total_requests: u64,
    pub total_hits: u64,
    pub misses: u64,
    pub expired: u64,
    /// `total_hits / total_requests`, or 0 before the first request.
    pub hit_rate: f64,
    pub tiers: Vec<TierStats>,
}

impl CacheStats {
    pub fn tier(&self, kind: CacheTierKind) -> Option<&TierStats> {
        self.tiers.iter().find(|t| t.kind == kind)
    }
}
