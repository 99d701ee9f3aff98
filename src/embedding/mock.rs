use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::error::EmbeddingError;
use super::model::{EmbeddingModel, ModelLoader, StubModel, normalize};

/// Scriptable model for tests.
///
/// Resolution order per text: a failure rule, an explicit vector, keyword counts (when
/// keywords are configured), then the deterministic stub embedding.
#[derive(Debug, Clone)]
pub struct MockModel {
    dimension: usize,
    model_version: String,
    vectors: HashMap<String, Vec<f32>>,
    keywords: Vec<String>,
    failing: HashSet<String>,
    calls: Arc<AtomicUsize>,
    fallback: StubModel,
}

impl MockModel {
    pub fn new(dimension: usize, model_version: &str) -> Self {
        Self {
            dimension,
            model_version: model_version.to_string(),
            vectors: HashMap::new(),
            keywords: Vec::new(),
            failing: HashSet::new(),
            calls: Arc::new(AtomicUsize::new(0)),
            fallback: StubModel::new(dimension, model_version),
        }
    }

    /// Bag-of-keywords model: dimension `i` counts occurrences of `keywords[i]`, and one
    /// extra bias dimension keeps every vector non-zero.
    pub fn keywords(keywords: &[&str], model_version: &str) -> Self {
        let mut model = Self::new(keywords.len() + 1, model_version);
        model.keywords = keywords.iter().map(|k| k.to_lowercase()).collect();
        model
    }

    pub fn with_vector(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.vectors.insert(text.to_string(), vector);
        self
    }

    pub fn failing_on(mut self, text: &str) -> Self {
        self.failing.insert(text.to_string());
        self
    }

    /// Number of texts embedded so far (shared across clones).
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    fn keyword_vector(&self, text: &str) -> Vec<f32> {
        let lowered = text.to_lowercase();
        let words: Vec<&str> = lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();

        let mut vector: Vec<f32> = self
            .keywords
            .iter()
            .map(|k| words.iter().filter(|w| *w == k).count() as f32)
            .collect();
        vector.push(0.05);
        normalize(vector)
    }
}

impl EmbeddingModel for MockModel {
    fn model_version(&self) -> &str {
        &self.model_version
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.failing.contains(text) {
            return Err(EmbeddingError::InferenceFailed {
                reason: format!("mock failure for {:?}", text),
            });
        }
        if let Some(vector) = self.vectors.get(text) {
            return Ok(vector.clone());
        }
        if !self.keywords.is_empty() {
            return Ok(self.keyword_vector(text));
        }
        self.fallback.embed(text)
    }
}

/// Loader that counts loads and can delay or fail them.
#[derive(Debug, Clone)]
pub struct MockLoader {
    model: MockModel,
    delay: Duration,
    fail: bool,
    loads: Arc<AtomicUsize>,
}

impl MockLoader {
    pub fn new(model: MockModel) -> Self {
        Self {
            model,
            delay: Duration::ZERO,
            fail: false,
            loads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.loads)
    }
}

impl ModelLoader for MockLoader {
    type Model = MockModel;

    async fn load(&self) -> Result<MockModel, EmbeddingError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(EmbeddingError::ModelLoadFailed {
                reason: "mock loader configured to fail".to_string(),
            });
        }
        Ok(self.model.clone())
    }
}
