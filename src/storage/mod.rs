//! Persistent key-value store boundary shared by the cache and the vector store.
//!
//! Records live in named collections, carry an opaque payload, and may be tagged with
//! one secondary index value (a document id) for [`RecordStore::keys_by_index`].

pub mod disk;
pub mod error;
pub mod memory;
mod record;

pub use disk::DiskStore;
pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use record::StoredRecord;

use std::future::Future;

/// Async record store.
///
/// `put` is an upsert: writing an existing key replaces its payload and index value.
pub trait RecordStore: Send + Sync + 'static {
    /// Loads the payload stored under `key`.
    fn get(
        &self,
        collection: &str,
        key: &str,
    ) -> impl Future<Output = StorageResult<Option<Vec<u8>>>> + Send;

    /// Stores `payload` under `key`, tagged with `index_key`.
    fn put(
        &self,
        collection: &str,
        key: &str,
        index_key: Option<&str>,
        payload: Vec<u8>,
    ) -> impl Future<Output = StorageResult<()>> + Send;

    /// Removes `key`; returns `false` if it was absent.
    fn delete(&self, collection: &str, key: &str) -> impl Future<Output = StorageResult<bool>> + Send;

    /// Removes every record in `collection`; returns the number removed.
    fn clear(&self, collection: &str) -> impl Future<Output = StorageResult<usize>> + Send;

    /// Lists every key in `collection`.
    fn keys(&self, collection: &str) -> impl Future<Output = StorageResult<Vec<String>>> + Send;

    /// Lists keys tagged with `index_key`.
    fn keys_by_index(
        &self,
        collection: &str,
        index_key: &str,
    ) -> impl Future<Output = StorageResult<Vec<String>>> + Send;

    /// Lists distinct index values in `collection`.
    fn index_values(
        &self,
        collection: &str,
    ) -> impl Future<Output = StorageResult<Vec<String>>> + Send;

    /// Number of records in `collection`.
    fn count(&self, collection: &str) -> impl Future<Output = StorageResult<usize>> + Send {
        async move { Ok(self.keys(collection).await?.len()) }
    }
}

/// Rejects collection names that are empty or would escape the storage root.
pub fn validate_collection(name: &str) -> StorageResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidCollection {
            name: name.to_string(),
        })
    }
}
