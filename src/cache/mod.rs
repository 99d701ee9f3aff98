//! Tiered embedding cache.
//!
//! [`TieredEmbeddingCache`] fronts the embedding model with an ordered chain of
//! [`CacheTier`]s: an in-process LRU ([`MemoryTier`]), a local durable tier
//! ([`PersistentTier`]) and an optional principal-scoped network tier ([`RemoteTier`]).

pub mod error;
pub mod memory;
pub mod persistent;
pub mod remote;
pub mod tier;
pub mod tiered;
pub mod types;

#[cfg(test)]
mod memory_tests;
#[cfg(test)]
mod tiered_tests;

pub use error::{CacheError, CacheResult};
pub use memory::MemoryTier;
pub use persistent::{EMBEDDING_COLLECTION, PersistentTier};
#[cfg(any(test, feature = "mock"))]
pub use remote::MockRemoteCache;
pub use remote::{DEFAULT_REMOTE_TIMEOUT, HttpRemoteCache, RemoteCacheClient, RemoteTier};
pub use tier::CacheTier;
pub use tiered::{TieredCacheConfig, TieredEmbeddingCache};
pub use types::{
    CacheKey, CacheLookupResult, CacheStats, CacheTierKind, CachedEmbedding, Principal, TierStats,
};
