//! Lazily-initialized embedding generator with optional cache integration.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};

use super::error::EmbeddingError;
use super::model::{EmbeddingModel, ModelLoader};
use super::types::{BatchEmbedding, EmbeddingVector};
use crate::cache::TieredEmbeddingCache;
use crate::constants::{DEFAULT_EMBED_BATCH_SIZE, DEFAULT_EMBEDDING_DIM};

#[derive(Debug, Clone)]
/// Configuration for [`EmbeddingGenerator`].
pub struct GeneratorConfig {
    /// Expected vector length; model outputs of any other length are rejected.
    pub embedding_dim: usize,
    /// Texts per model call when embedding a batch.
    pub batch_size: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            batch_size: DEFAULT_EMBED_BATCH_SIZE,
        }
    }
}

impl GeneratorConfig {
    pub fn new(embedding_dim: usize) -> Self {
        Self {
            embedding_dim,
            ..Default::default()
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn validate(&self) -> Result<(), EmbeddingError> {
        if self.embedding_dim == 0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: "embedding_dim must be > 0".to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: "batch_size must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

type ModelSlot<M> = Arc<OnceCell<Arc<M>>>;

/// Turns text into [`EmbeddingVector`]s using a model loaded on first use.
///
/// Concurrent [`initialize`](Self::initialize) calls share one in-flight load; a failed
/// load leaves the generator uninitialized so the next call retries.
pub struct EmbeddingGenerator<L: ModelLoader> {
    loader: L,
    config: GeneratorConfig,
    slot: RwLock<ModelSlot<L::Model>>,
}

impl<L: ModelLoader> std::fmt::Debug for EmbeddingGenerator<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingGenerator")
            .field("config", &self.config)
            .field("ready", &self.is_ready())
            .finish_non_exhaustive()
    }
}

impl<L: ModelLoader> EmbeddingGenerator<L> {
    pub fn new(loader: L, config: GeneratorConfig) -> Result<Self, EmbeddingError> {
        config.validate()?;
        Ok(Self {
            loader,
            config,
            slot: RwLock::new(Arc::new(OnceCell::new())),
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    /// Loads the model if it is not loaded yet.
    pub async fn initialize(&self) -> Result<(), EmbeddingError> {
        self.model().await.map(|_| ())
    }

    /// Returns `true` once a model is loaded (and not disposed).
    pub fn is_ready(&self) -> bool {
        self.slot.read().initialized()
    }

    /// Releases the model handle. Repeated calls are no-ops.
    pub fn dispose(&self) {
        let previous = std::mem::replace(&mut *self.slot.write(), Arc::new(OnceCell::new()));
        if previous.initialized() {
            info!("Embedding model disposed");
        }
    }

    /// Model version of the loaded model (initializing it if needed).
    pub async fn model_version(&self) -> Result<String, EmbeddingError> {
        Ok(self.model().await?.model_version().to_string())
    }

    async fn model(&self) -> Result<Arc<L::Model>, EmbeddingError> {
        let slot = Arc::clone(&*self.slot.read());

        let model = slot
            .get_or_try_init(|| async {
                let started = Instant::now();
                let model = self.loader.load().await?;

                if model.dimension() != self.config.embedding_dim {
                    return Err(EmbeddingError::DimensionMismatch {
                        expected: self.config.embedding_dim,
                        actual: model.dimension(),
                    });
                }

                info!(
                    model_version = model.model_version(),
                    dimension = model.dimension(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Embedding model initialized"
                );
                Ok(Arc::new(model))
            })
            .await?;

        Ok(Arc::clone(model))
    }

    fn check_dimension(&self, actual: usize) -> Result<(), EmbeddingError> {
        if actual != self.config.embedding_dim {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.config.embedding_dim,
                actual,
            });
        }
        Ok(())
    }

    /// Embeds one text, initializing the model on first use.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn embed(&self, text: &str) -> Result<EmbeddingVector, EmbeddingError> {
        let model = self.model().await?;

        let input = text.to_string();
        let worker = Arc::clone(&model);
        let vector = tokio::task::spawn_blocking(move || worker.embed(&input)).await??;
        self.check_dimension(vector.len())?;

        Ok(EmbeddingVector::new(text, vector, model.model_version()))
    }

    /// Embeds one text, consulting `cache` first and writing fresh results back.
    pub async fn embed_cached(
        &self,
        text: &str,
        cache: &TieredEmbeddingCache,
    ) -> Result<EmbeddingVector, EmbeddingError> {
        let model_version = self.model_version().await?;

        if let Some(hit) = cache.get(text, &model_version).await {
            return Ok(hit);
        }

        let embedding = self.embed(text).await?;
        cache.set(text, &embedding).await;
        Ok(embedding)
    }

    /// Embeds a list of texts, preserving input order.
    ///
    /// With a `cache`, hits are taken from it and only misses reach the model (in chunks of
    /// `batch_size`); freshly computed vectors are written back.
    #[instrument(skip(self, texts, cache), fields(count = texts.len(), cached = cache.is_some()))]
    pub async fn embed_batch(
        &self,
        texts: &[String],
        cache: Option<&TieredEmbeddingCache>,
    ) -> Result<BatchEmbedding, EmbeddingError> {
        let started = Instant::now();
        let model = self.model().await?;
        let model_version = model.model_version().to_string();

        let mut slots: Vec<Option<EmbeddingVector>> = vec![None; texts.len()];
        let mut missing: Vec<usize> = Vec::new();

        for (idx, text) in texts.iter().enumerate() {
            let hit = match cache {
                Some(cache) => cache.get(text, &model_version).await,
                None => None,
            };
            match hit {
                Some(embedding) => slots[idx] = Some(embedding),
                None => missing.push(idx),
            }
        }

        let cached = texts.len() - missing.len();

        for chunk in missing.chunks(self.config.batch_size) {
            let inputs: Vec<String> = chunk.iter().map(|&idx| texts[idx].clone()).collect();
            let worker = Arc::clone(&model);
            let vectors = tokio::task::spawn_blocking(move || worker.embed_batch(&inputs)).await??;

            if vectors.len() != chunk.len() {
                return Err(EmbeddingError::BatchSizeMismatch {
                    expected: chunk.len(),
                    actual: vectors.len(),
                });
            }

            for (&idx, vector) in chunk.iter().zip(vectors) {
                self.check_dimension(vector.len())?;
                let embedding = EmbeddingVector::new(texts[idx].as_str(), vector, &model_version);
                if let Some(cache) = cache {
                    cache.set(&texts[idx], &embedding).await;
                }
                slots[idx] = Some(embedding);
            }
        }

        let embeddings = slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| EmbeddingError::InferenceFailed {
                reason: "batch result missing an embedding".to_string(),
            })?;

        let result = BatchEmbedding {
            embeddings,
            computed: missing.len(),
            cached,
            duration: started.elapsed(),
        };

        debug!(
            computed = result.computed,
            cached = result.cached,
            elapsed_ms = result.duration.as_millis() as u64,
            "Batch embedding complete"
        );

        Ok(result)
    }
}
