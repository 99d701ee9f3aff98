//! Sieve library crate (used by the CLI and integration tests).
//!
//! # Public API Surface
//!
//! The exports are organized by module:
//!
//! ## Embedding
//! - [`EmbeddingGenerator`], [`GeneratorConfig`] - lazily-initialized text embedding
//! - [`BertEmbedder`], [`StubModel`] - model implementations behind [`EmbeddingModel`]
//! - [`Reranker`], [`RerankerConfig`] - second-pass relevance scoring
//!
//! ## Caching & Storage
//! - [`TieredEmbeddingCache`] - memory, persistent and remote tiers in front of the model
//! - [`RecordStore`], [`DiskStore`], [`MemoryStore`] - persistent store boundary
//!
//! ## Retrieval
//! - [`VectorStore`] - vector records with brute-force similarity search
//! - [`similarity`] - cosine similarity, ranking, matrices, clustering, statistics
//! - [`RagContextAssembler`] - chunking, retrieval, reranking and budget packing
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod cache;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod hashing;
pub mod rag;
pub mod similarity;
pub mod storage;
pub mod vectordb;

#[cfg(any(test, feature = "mock"))]
pub use cache::MockRemoteCache;
pub use cache::{
    CacheError, CacheLookupResult, CacheStats, CacheTier, CacheTierKind, HttpRemoteCache,
    Principal, TieredCacheConfig, TieredEmbeddingCache,
};
pub use config::{Config, ConfigError};
#[cfg(any(test, feature = "mock"))]
pub use embedding::reranker::{MockReranker, MockRerankerBehavior};
#[cfg(any(test, feature = "mock"))]
pub use embedding::{MockLoader, MockModel};
pub use embedding::{
    BertEmbedder, BertEmbedderConfig, BertLoader, EmbeddingError, EmbeddingGenerator,
    EmbeddingModel, EmbeddingVector, GeneratorConfig, ModelLoader, Reranker, RerankerConfig,
    RerankerError, StubLoader, StubModel,
};
pub use hashing::{embedding_key, hash_record_key, hash_text, hash_text_hex, hash_to_u64};
pub use rag::{
    AssembledContext, BatchReport, RagChunk, RagConfig, RagContext, RagContextAssembler,
    RagDocument, RagError, RetrievalOptions, assemble_context_within_budget, estimate_tokens,
    format_context, get_optimal_context_window,
};
pub use similarity::{
    Cluster, FindSimilarOptions, SimilarityError, SimilarityResult, SimilarityStats,
    cosine_similarity,
};
pub use storage::{DiskStore, MemoryStore, RecordStore, StorageError};
pub use vectordb::{
    SearchOptions, StoredVector, VectorMatch, VectorStore, VectorStoreConfig, VectorStoreError,
};
