//! Text embedding and reranking.
//!
//! - [`generator`] wraps an [`EmbeddingModel`] with lazy loading, batching and caching.
//! - [`bert`] provides the candle BERT embedder and the classifier head used for reranking.
//! - [`reranker`] scores (query, document) pairs for second-pass ordering.

/// BERT embedder and classifier (candle).
pub mod bert;
/// Device selection (CPU / Metal / CUDA).
pub mod device;
mod error;
pub mod generator;
#[cfg(any(test, feature = "mock"))]
/// Scriptable models for tests.
pub mod mock;
pub mod model;
/// Remote and local rerankers.
pub mod reranker;
mod types;
/// Tokenizer loading helpers.
pub mod utils;


pub use bert::{BertEmbedder, BertEmbedderConfig, BertLoader};
pub use error::EmbeddingError;
pub use generator::{EmbeddingGenerator, GeneratorConfig};
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockLoader, MockModel};
pub use model::{EmbeddingModel, ModelLoader, StubLoader, StubModel};
pub use reranker::{RerankScore, Reranker, RerankerConfig, RerankerError};
pub use types::{BatchEmbedding, EmbeddingVector};
