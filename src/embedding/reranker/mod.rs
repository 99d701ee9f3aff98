//! Second-pass relevance scoring of retrieved candidates.
//!
//! Callers treat every [`RerankerError`] as recoverable and keep their first-pass ordering.

pub mod config;
pub mod cross_encoder;
pub mod error;
pub mod http;
#[cfg(any(test, feature = "mock"))]
pub mod mock;


pub use config::{DEFAULT_RERANK_TIMEOUT, MAX_SEQ_LEN, RerankerConfig};
pub use cross_encoder::CrossEncoderReranker;
pub use error::RerankerError;
pub use http::HttpReranker;
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockReranker, MockRerankerBehavior};

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Score for one document, addressed by its index in the request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RerankScore {
    pub index: usize,
    pub score: f32,
}

/// Scores `documents` against `query`.
///
/// Results may come back in any order and need not cover every document.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
    ) -> Result<Vec<RerankScore>, RerankerError>;
}

/// Checks indices and scores of a reranker response against the request size.
pub fn validate_scores(
    scores: &[RerankScore],
    document_count: usize,
) -> Result<(), RerankerError> {
    for score in scores {
        if score.index >= document_count {
            return Err(RerankerError::MalformedResponse {
                reason: format!(
                    "index {} out of range for {} documents",
                    score.index, document_count
                ),
            });
        }
        if !score.score.is_finite() {
            return Err(RerankerError::MalformedResponse {
                reason: format!("non-finite score for index {}", score.index),
            });
        }
    }
    Ok(())
}

/// Builds the reranker selected by `config` (remote endpoint, else local cross-encoder).
pub async fn build_reranker(config: &RerankerConfig) -> Result<Arc<dyn Reranker>, RerankerError> {
    config
        .validate()
        .map_err(|reason| RerankerError::InvalidConfig { reason })?;

    if let Some(ref endpoint) = config.endpoint {
        info!(endpoint = %endpoint, "Using HTTP reranker");
        return Ok(Arc::new(HttpReranker::new(config.clone())?));
    }

    let config = config.clone();
    let reranker = tokio::task::spawn_blocking(move || CrossEncoderReranker::load(config)).await??;
    Ok(Arc::new(reranker))
}
