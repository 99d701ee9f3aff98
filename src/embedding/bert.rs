//! BERT-family models loaded with candle: a mean-pooled sentence embedder and a
//! sequence classifier used as a cross-encoder.
//!
//! Both expect a Hugging Face model directory containing `config.json`,
//! `model.safetensors` and `tokenizer.json`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::device::select_device;
use super::error::EmbeddingError;
use super::model::{EmbeddingModel, ModelLoader, normalize};
use super::utils::load_batch_tokenizer;
use crate::constants::{DEFAULT_EMBEDDING_DIM, DEFAULT_MAX_SEQ_LEN, DEFAULT_MODEL_VERSION};

const CONFIG_FILE: &str = "config.json";
const WEIGHTS_FILE: &str = "model.safetensors";

#[derive(Debug, Clone)]
/// Configuration for [`BertEmbedder`].
pub struct BertEmbedderConfig {
    /// Model directory.
    pub model_dir: PathBuf,
    /// Version tag stamped on produced vectors.
    pub model_version: String,
    /// Expected output dimension (the model's hidden size).
    pub embedding_dim: usize,
    /// Max tokens per text.
    pub max_seq_len: usize,
}

impl BertEmbedderConfig {
    pub fn new<P: Into<PathBuf>>(model_dir: P) -> Self {
        Self {
            model_dir: model_dir.into(),
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            max_seq_len: DEFAULT_MAX_SEQ_LEN,
        }
    }

    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = version.into();
        self
    }

    pub fn with_embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = dim;
        self
    }

    /// Checks that the directory and required files exist.
    pub fn validate(&self) -> Result<(), EmbeddingError> {
        if self.model_dir.as_os_str().is_empty() {
            return Err(EmbeddingError::InvalidConfig {
                reason: "model_dir is required".to_string(),
            });
        }
        if self.max_seq_len == 0 {
            return Err(EmbeddingError::InvalidConfig {
                reason: "max_seq_len must be > 0".to_string(),
            });
        }
        for file in [CONFIG_FILE, WEIGHTS_FILE, "tokenizer.json"] {
            let path = self.model_dir.join(file);
            if !path.exists() {
                return Err(EmbeddingError::ModelNotFound { path });
            }
        }
        Ok(())
    }
}

fn read_bert_config(model_dir: &Path) -> Result<Config, EmbeddingError> {
    let content = std::fs::read_to_string(model_dir.join(CONFIG_FILE))?;
    serde_json::from_str(&content).map_err(|e| EmbeddingError::ModelLoadFailed {
        reason: format!("Failed to parse {}: {}", CONFIG_FILE, e),
    })
}

fn load_bert(vb: VarBuilder, config: &Config) -> candle_core::Result<BertModel> {
    if vb.contains_tensor("bert.embeddings.word_embeddings.weight") {
        BertModel::load(vb.pp("bert"), config)
    } else if vb.contains_tensor("roberta.embeddings.word_embeddings.weight") {
        BertModel::load(vb.pp("roberta"), config)
    } else {
        BertModel::load(vb, config)
    }
}

/// Sentence embedder: BERT forward pass, attention-masked mean pooling, L2 normalization.
pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    config: BertEmbedderConfig,
}

impl std::fmt::Debug for BertEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BertEmbedder")
            .field("device", &format!("{:?}", self.device))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BertEmbedder {
    /// Loads weights and tokenizer from `config.model_dir` (blocking).
    pub fn load(config: BertEmbedderConfig) -> Result<Self, EmbeddingError> {
        config.validate()?;

        let device = select_device();
        let bert_config = read_bert_config(&config.model_dir)?;

        if bert_config.hidden_size != config.embedding_dim {
            return Err(EmbeddingError::InvalidConfig {
                reason: format!(
                    "embedding_dim ({}) does not match model hidden_size ({})",
                    config.embedding_dim, bert_config.hidden_size
                ),
            });
        }

        let weights_path = config.model_dir.join(WEIGHTS_FILE);
        // SAFETY: the weights file is not modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, &device)? };
        let model = load_bert(vb, &bert_config).map_err(|e| EmbeddingError::ModelLoadFailed {
            reason: format!("Failed to load BERT weights: {}", e),
        })?;

        let tokenizer = load_batch_tokenizer(&config.model_dir, config.max_seq_len).map_err(|e| {
            EmbeddingError::TokenizationFailed {
                reason: format!("Failed to load tokenizer: {}", e),
            }
        })?;

        info!(
            model_dir = %config.model_dir.display(),
            model_version = %config.model_version,
            embedding_dim = config.embedding_dim,
            "BERT embedder loaded"
        );

        Ok(Self {
            model,
            tokenizer,
            device,
            config,
        })
    }

    fn forward_pooled(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| EmbeddingError::TokenizationFailed {
                reason: e.to_string(),
            })?;

        let mut ids = Vec::with_capacity(encodings.len());
        let mut masks = Vec::with_capacity(encodings.len());
        for encoding in &encodings {
            ids.push(Tensor::new(encoding.get_ids(), &self.device)?);
            masks.push(Tensor::new(encoding.get_attention_mask(), &self.device)?);
        }

        let input_ids = Tensor::stack(&ids, 0)?;
        let attention_mask = Tensor::stack(&masks, 0)?;
        let token_type_ids = input_ids.zeros_like()?;

        debug!(
            batch = texts.len(),
            seq_len = input_ids.dim(1)?,
            "Running BERT forward pass"
        );

        // hidden: [batch, seq, hidden]
        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
        let summed = hidden.broadcast_mul(&mask)?.sum(1)?;
        let counts = mask.sum(1)?.clamp(1e-9f32, f32::MAX)?;
        let pooled = summed.broadcast_div(&counts)?;

        Ok(pooled
            .to_vec2::<f32>()?
            .into_iter()
            .map(normalize)
            .collect())
    }

    pub fn config(&self) -> &BertEmbedderConfig {
        &self.config
    }
}

impl EmbeddingModel for BertEmbedder {
    fn model_version(&self) -> &str {
        &self.config.model_version
    }

    fn dimension(&self) -> usize {
        self.config.embedding_dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.forward_pooled(&[text])?
            .pop()
            .ok_or_else(|| EmbeddingError::InferenceFailed {
                reason: "model produced no output".to_string(),
            })
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        self.forward_pooled(&refs)
    }
}

/// Loads a [`BertEmbedder`] on the blocking pool.
#[derive(Debug, Clone)]
pub struct BertLoader {
    config: BertEmbedderConfig,
}

impl BertLoader {
    pub fn new(config: BertEmbedderConfig) -> Self {
        Self { config }
    }
}

impl ModelLoader for BertLoader {
    type Model = BertEmbedder;

    async fn load(&self) -> Result<BertEmbedder, EmbeddingError> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || BertEmbedder::load(config)).await?
    }
}

struct SequenceClassifier {
    bert: BertModel,
    classifier: Linear,
}

/// BERT with a single-logit classification head on the `[CLS]` token.
#[derive(Clone)]
pub struct BertClassifier(Arc<SequenceClassifier>);

impl BertClassifier {
    pub fn load<P: AsRef<Path>>(model_dir: P, device: &Device) -> Result<Self, EmbeddingError> {
        let model_dir = model_dir.as_ref();
        let config = read_bert_config(model_dir)?;

        let weights_path = model_dir.join(WEIGHTS_FILE);
        // SAFETY: the weights file is not modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights_path], DType::F32, device)? };

        let bert = load_bert(vb.clone(), &config)?;
        let classifier = candle_nn::linear(config.hidden_size, 1, vb.pp("classifier"))?;

        Ok(Self(Arc::new(SequenceClassifier { bert, classifier })))
    }

    /// Returns logits of shape `[batch, 1]`.
    pub fn forward(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: Option<&Tensor>,
    ) -> candle_core::Result<Tensor> {
        let output = self.0.bert.forward(input_ids, token_type_ids, attention_mask)?;
        let cls_token = output.i((.., 0, ..))?;
        self.0.classifier.forward(&cls_token)
    }
}
