//! Durable vector records with brute-force similarity search.

pub mod error;
pub mod model;
mod store;

#[cfg(test)]
mod tests;

pub use error::{VectorStoreError, VectorStoreResult};
pub use model::{SearchOptions, StoredVector, VectorMatch, VectorStoreStats};
pub use store::{METADATA_COLLECTION, VECTOR_COLLECTION, VectorStore, VectorStoreConfig};
