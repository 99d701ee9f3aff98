use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::vectordb::VectorStoreError;

#[derive(Debug, Error)]
/// Errors returned by [`RagContextAssembler`](super::RagContextAssembler).
///
/// Reranker failures never appear here; retrieval falls back to similarity order instead.
pub enum RagError {
    /// Embedding the query or a chunk failed.
    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Vector store failure.
    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    /// Document produced no chunks to index.
    #[error("document '{document_id}' has no text to index")]
    EmptyDocument {
        /// Offending document.
        document_id: String,
    },

    /// Document rejected before indexing.
    #[error("invalid document: {reason}")]
    InvalidDocument {
        /// Why it was rejected.
        reason: String,
    },

    /// Query text was empty.
    #[error("query text is empty")]
    EmptyQuery,

    /// Invalid configuration.
    #[error("configuration error: {reason}")]
    InvalidConfig {
        /// Error message.
        reason: String,
    },
}

/// Convenience result type for RAG operations.
pub type RagResult<T> = Result<T, RagError>;
