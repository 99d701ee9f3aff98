//! Cross-cutting, shared constants.
//!
//! The embedding dimension and model version are defaults only: every vector carries its
//! own `model_version`, and each component checks dimensions against its own config.

use std::time::Duration;

/// Output dimension of the default sentence-embedding model (all-MiniLM-L6-v2).
pub const DEFAULT_EMBEDDING_DIM: usize = 384;

/// Model version tag stamped on embeddings produced by the default model.
pub const DEFAULT_MODEL_VERSION: &str = "all-MiniLM-L6-v2";

/// Max tokens fed to the embedding model per text.
pub const DEFAULT_MAX_SEQ_LEN: usize = 256;

/// Max entries held by the in-process embedding cache tier.
pub const DEFAULT_MEMORY_CAPACITY: u64 = 1_000;

/// Max entries held by the vector store read cache.
pub const DEFAULT_VECTOR_CACHE_CAPACITY: u64 = 10_000;

/// Age after which a cached embedding is treated as absent (7 days).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Texts sent to the model per inference call inside a batch.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 32;
