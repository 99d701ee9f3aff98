use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A text embedding stamped with the model that produced it.
///
/// Immutable once created. Vectors are only comparable when they share a dimension, and
/// only cache-compatible when they share a `model_version`.
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
pub struct EmbeddingVector {
    text: String,
    vector: Vec<f32>,
    model_version: String,
    timestamp: i64,
}

impl EmbeddingVector {
    /// Creates an embedding stamped with the current time (unix millis).
    pub fn new(text: impl Into<String>, vector: Vec<f32>, model_version: impl Into<String>) -> Self {
        Self::with_timestamp(
            text,
            vector,
            model_version,
            chrono::Utc::now().timestamp_millis(),
        )
    }

    /// Creates an embedding with an explicit creation timestamp (unix millis).
    pub fn with_timestamp(
        text: impl Into<String>,
        vector: Vec<f32>,
        model_version: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            text: text.into(),
            vector,
            model_version: model_version.into(),
            timestamp,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    pub fn into_vector(self) -> Vec<f32> {
        self.vector
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// Creation time in unix millis.
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}

/// Output of [`EmbeddingGenerator::embed_batch`](super::EmbeddingGenerator::embed_batch).
///
/// `embeddings` is in input order regardless of which items came from a cache.
#[derive(Debug, Clone)]
pub struct BatchEmbedding {
    pub embeddings: Vec<EmbeddingVector>,
    /// Items computed by the model in this call.
    pub computed: usize,
    /// Items served from the caller-supplied cache.
    pub cached: usize,
    pub duration: Duration,
}

impl BatchEmbedding {
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}
