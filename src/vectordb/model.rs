use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// A vector record owned by the [`VectorStore`](super::VectorStore).
#[derive(
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    Serialize,
    Deserialize,
    Debug,
    Clone,
    PartialEq,
)]
pub struct StoredVector {
    pub id: String,
    pub document_id: String,
    pub paragraph_id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: BTreeMap<String, String>,
    /// Unix millis of the last write.
    pub timestamp: i64,
}

impl StoredVector {
    pub fn new(
        id: impl Into<String>,
        document_id: impl Into<String>,
        paragraph_id: impl Into<String>,
        text: impl Into<String>,
        vector: Vec<f32>,
    ) -> Self {
        Self {
            id: id.into(),
            document_id: document_id.into(),
            paragraph_id: paragraph_id.into(),
            text: text.into(),
            vector,
            metadata: BTreeMap::new(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Filters for [`VectorStore::find_similar`](super::VectorStore::find_similar).
#[derive(Debug, Clone)]
pub struct SearchOptions {
    /// Minimum cosine similarity.
    pub threshold: f32,
    /// Maximum results.
    pub top_k: usize,
    /// Restrict to these documents (empty = all).
    pub document_ids: Vec<String>,
    /// Record ids to skip.
    pub exclude_ids: HashSet<String>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            top_k: 10,
            document_ids: Vec::new(),
            exclude_ids: HashSet::new(),
        }
    }
}

impl SearchOptions {
    pub fn new(threshold: f32, top_k: usize) -> Self {
        Self {
            threshold,
            top_k,
            ..Default::default()
        }
    }

    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.document_ids.push(document_id.into());
        self
    }

    pub fn with_documents<I, S>(mut self, document_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.document_ids
            .extend(document_ids.into_iter().map(Into::into));
        self
    }

    pub fn excluding(mut self, id: impl Into<String>) -> Self {
        self.exclude_ids.insert(id.into());
        self
    }
}

/// A record with its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorMatch {
    pub record: StoredVector,
    pub score: f32,
}

/// Counters reported by [`VectorStore::stats`](super::VectorStore::stats).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorStoreStats {
    pub total_vectors: usize,
    pub cache_size: usize,
    /// Read-cache hits over read-cache lookups; 0 before the first lookup.
    pub cache_hit_rate: f64,
    pub total_searches: u64,
}
