use thiserror::Error;

use crate::similarity::SimilarityError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
/// Errors returned by [`VectorStore`](super::VectorStore) operations.
pub enum VectorStoreError {
    /// Backing store failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Record could not be encoded or decoded.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Error message.
        reason: String,
    },

    /// Record rejected before writing.
    #[error("invalid vector '{id}': {reason}")]
    InvalidVector {
        /// Record id.
        id: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Query rejected before searching.
    #[error("invalid query: {reason}")]
    InvalidQuery {
        /// Why it was rejected.
        reason: String,
    },

    /// Vector length differs from the store's configured dimension.
    #[error("invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured dimension.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// Similarity computation failed.
    #[error("similarity error: {0}")]
    Similarity(#[from] SimilarityError),
}

/// Convenience result type for vector store operations.
pub type VectorStoreResult<T> = Result<T, VectorStoreError>;
