use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
/// Errors returned by [`RecordStore`](super::RecordStore) implementations.
pub enum StorageError {
    /// IO error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be serialized.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Underlying failure.
        reason: String,
    },

    /// Record file exists but could not be decoded.
    #[error("corrupted record at {path}: {reason}")]
    Corrupted {
        /// Record file.
        path: PathBuf,
        /// Underlying failure.
        reason: String,
    },

    /// Collection name is empty or not file-system safe.
    #[error("invalid collection name '{name}'")]
    InvalidCollection {
        /// Rejected name.
        name: String,
    },

    /// Storage root is missing or not a directory.
    #[error("storage path unavailable: {path}")]
    Unavailable {
        /// Root path.
        path: PathBuf,
    },

    /// Failure injected by a test store.
    #[error("injected failure: {reason}")]
    Injected {
        /// Description.
        reason: String,
    },
}

/// Convenience result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
