//! Model boundary: anything that maps text to a fixed-dimension vector.

use std::future::Future;

use tracing::debug;

use super::error::EmbeddingError;
use crate::constants::{DEFAULT_EMBEDDING_DIM, DEFAULT_MODEL_VERSION};

/// A loaded text-embedding model.
///
/// Inference is synchronous and CPU/GPU bound; the generator runs it on the blocking pool.
pub trait EmbeddingModel: Send + Sync + 'static {
    /// Identifier stamped on every vector this model produces.
    fn model_version(&self) -> &str;

    /// Output dimension.
    fn dimension(&self) -> usize;

    /// Embeds one text. Empty text is valid input.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embeds several texts, preserving order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Loads an [`EmbeddingModel`]; called at most once per successful initialization.
pub trait ModelLoader: Send + Sync + 'static {
    type Model: EmbeddingModel;

    fn load(&self) -> impl Future<Output = Result<Self::Model, EmbeddingError>> + Send;
}

/// Deterministic hash-seeded embeddings (no model files required).
///
/// Identical text always maps to the identical unit vector; unrelated texts are close to
/// orthogonal. Used for tests and for running without a model on disk.
#[derive(Debug, Clone)]
pub struct StubModel {
    dimension: usize,
    model_version: String,
}

impl StubModel {
    pub fn new(dimension: usize, model_version: impl Into<String>) -> Self {
        Self {
            dimension,
            model_version: model_version.into(),
        }
    }
}

impl Default for StubModel {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIM, format!("{}-stub", DEFAULT_MODEL_VERSION))
    }
}

impl EmbeddingModel for StubModel {
    fn model_version(&self) -> &str {
        &self.model_version
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        debug!(text_len = text.len(), "Generating stub embedding");

        let seed = crate::hashing::hash_to_u64(text.as_bytes());
        let mut state = seed;
        let mut embedding = Vec::with_capacity(self.dimension);

        for _ in 0..self.dimension {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let value = ((state >> 32) as f32 / u32::MAX as f32) * 2.0 - 1.0;
            embedding.push(value);
        }

        Ok(normalize(embedding))
    }
}

/// Loader that hands out a [`StubModel`].
#[derive(Debug, Clone, Default)]
pub struct StubLoader {
    model: StubModel,
}

impl StubLoader {
    pub fn new(model: StubModel) -> Self {
        Self { model }
    }
}

impl ModelLoader for StubLoader {
    type Model = StubModel;

    async fn load(&self) -> Result<StubModel, EmbeddingError> {
        Ok(self.model.clone())
    }
}

/// Scales a vector to unit length; zero vectors are returned unchanged.
pub fn normalize(mut embedding: Vec<f32>) -> Vec<f32> {
    let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm > 0.0 {
        for x in &mut embedding {
            *x /= norm;
        }
    }

    embedding
}
