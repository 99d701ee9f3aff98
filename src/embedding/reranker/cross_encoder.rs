use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::config::{MAX_SEQ_LEN, RerankerConfig};
use super::error::RerankerError;
use super::{RerankScore, Reranker};
use crate::embedding::bert::BertClassifier;
use crate::embedding::device::select_device;
use crate::embedding::utils::load_tokenizer;

const STOP_WORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
    "do", "does", "did", "will", "would", "could", "should", "may", "might", "must", "can", "to",
    "of", "in", "for", "on", "with", "at", "by", "from", "as", "into", "through", "during",
    "before", "after", "above", "below", "between", "under", "then", "once", "here", "there",
    "when", "where", "why", "how", "all", "each", "few", "more", "most", "other", "some", "such",
    "no", "nor", "not", "only", "own", "same", "so", "than", "too", "very", "just", "and", "but",
    "if", "or", "because", "until", "while", "what", "which", "who", "whom", "this", "that",
    "these", "those", "am", "it", "its",
];

struct LoadedModel {
    model: BertClassifier,
    tokenizer: Tokenizer,
    device: Device,
}

struct Inner {
    model: Option<LoadedModel>,
    stop_words: HashSet<&'static str>,
}

/// Local cross-encoder: scores each (query, document) pair with a BERT classifier.
///
/// Without a model path it scores by stop-word-filtered lexical overlap, squashed to `[0, 1]`.
#[derive(Clone)]
pub struct CrossEncoderReranker {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CrossEncoderReranker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrossEncoderReranker")
            .field("model_loaded", &self.is_model_loaded())
            .finish()
    }
}

impl CrossEncoderReranker {
    /// Loads the classifier named by `config.model_path` (blocking).
    pub fn load(config: RerankerConfig) -> Result<Self, RerankerError> {
        config
            .validate()
            .map_err(|reason| RerankerError::InvalidConfig { reason })?;

        let model = match config.model_path {
            Some(ref model_path) => {
                if !model_path.join("config.json").exists() {
                    return Err(RerankerError::ModelLoadFailed {
                        reason: format!("Missing config.json in {}", model_path.display()),
                    });
                }

                let device = select_device();
                let model = BertClassifier::load(model_path, &device)?;

                let mut tokenizer =
                    load_tokenizer(model_path).map_err(|e| RerankerError::ModelLoadFailed {
                        reason: format!("Failed to load tokenizer: {}", e),
                    })?;
                tokenizer
                    .with_truncation(Some(tokenizers::TruncationParams {
                        max_length: MAX_SEQ_LEN,
                        ..Default::default()
                    }))
                    .map_err(|e| RerankerError::ModelLoadFailed {
                        reason: format!("Failed to configure truncation: {}", e),
                    })?;

                info!(model_path = %model_path.display(), "Cross-encoder reranker loaded");
                Some(LoadedModel {
                    model,
                    tokenizer,
                    device,
                })
            }
            None => {
                info!("No reranker model configured, using lexical scoring");
                None
            }
        };

        Ok(Self {
            inner: Arc::new(Inner {
                model,
                stop_words: STOP_WORDS.iter().copied().collect(),
            }),
        })
    }

    /// Lexical-scoring reranker (no model files).
    pub fn stub() -> Self {
        Self {
            inner: Arc::new(Inner {
                model: None,
                stop_words: STOP_WORDS.iter().copied().collect(),
            }),
        }
    }

    pub fn is_model_loaded(&self) -> bool {
        self.inner.model.is_some()
    }

    /// Scores one pair (blocking).
    pub fn score(&self, query: &str, document: &str) -> Result<f32, RerankerError> {
        self.inner.score(query, document)
    }
}

impl Inner {
    fn score(&self, query: &str, document: &str) -> Result<f32, RerankerError> {
        let Some(loaded) = &self.model else {
            return Ok(self.lexical_score(query, document));
        };

        let tokens = loaded.tokenizer.encode((query, document), true).map_err(|e| {
            RerankerError::TokenizationFailed {
                reason: e.to_string(),
            }
        })?;

        let token_ids = Tensor::new(tokens.get_ids(), &loaded.device)?.unsqueeze(0)?;
        let type_ids = Tensor::new(tokens.get_type_ids(), &loaded.device)?.unsqueeze(0)?;
        let attention_mask =
            Tensor::new(tokens.get_attention_mask(), &loaded.device)?.unsqueeze(0)?;

        let logits = loaded
            .model
            .forward(&token_ids, &type_ids, Some(&attention_mask))?;
        let logit = logits
            .flatten_all()?
            .to_vec1::<f32>()?
            .first()
            .copied()
            .ok_or_else(|| RerankerError::InferenceFailed {
                reason: "classifier produced no logits".to_string(),
            })?;

        Ok(sigmoid(logit))
    }

    fn content_words(&self, text: &str) -> HashSet<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty() && !self.stop_words.contains(w))
            .map(str::to_string)
            .collect()
    }

    fn lexical_score(&self, query: &str, document: &str) -> f32 {
        let query_words = self.content_words(query);
        let document_words = self.content_words(document);

        if query_words.is_empty() {
            let len_ratio = (query.len().min(document.len()) as f32)
                / (query.len().max(document.len()).max(1) as f32);
            return len_ratio * 0.3;
        }

        let matches = query_words.intersection(&document_words).count();
        let recall = matches as f32 / query_words.len() as f32;

        let union = query_words.union(&document_words).count();
        let jaccard = if union > 0 {
            matches as f32 / union as f32
        } else {
            0.0
        };

        let base_score = 0.6 * recall + 0.4 * jaccard;
        sigmoid(8.0 * (base_score - 0.5)).clamp(0.0, 1.0)
    }
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[async_trait]
impl Reranker for CrossEncoderReranker {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
    ) -> Result<Vec<RerankScore>, RerankerError> {
        let inner = Arc::clone(&self.inner);
        let query = query.to_string();
        let documents = documents.to_vec();

        let scores = tokio::task::spawn_blocking(move || {
            documents
                .iter()
                .enumerate()
                .map(|(index, document)| {
                    inner
                        .score(&query, document)
                        .map(|score| RerankScore { index, score })
                })
                .collect::<Result<Vec<_>, RerankerError>>()
        })
        .await??;

        debug!(
            scored = scores.len(),
            model_loaded = self.is_model_loaded(),
            "Local rerank complete"
        );
        Ok(scores)
    }
}
