use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
/// Errors raised by individual cache tiers.
///
/// [`TieredEmbeddingCache`](super::TieredEmbeddingCache) absorbs these and counts them in
/// its stats; they only reach callers that use a tier directly.
pub enum CacheError {
    /// Persistent store failure.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Entry could not be encoded or decoded.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Error message.
        reason: String,
    },

    /// Remote request failed before a response arrived.
    #[error("remote cache request failed: {reason}")]
    Remote {
        /// Error message.
        reason: String,
    },

    /// Remote cache answered with a non-success status.
    #[error("remote cache returned HTTP {status}")]
    RemoteStatus {
        /// HTTP status code.
        status: u16,
    },

    /// Remote request exceeded its timeout.
    #[error("remote cache timed out after {timeout_ms}ms")]
    Timeout {
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// Invalid configuration.
    #[error("configuration error: {reason}")]
    InvalidConfig {
        /// Error message.
        reason: String,
    },
}

/// Convenience result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
