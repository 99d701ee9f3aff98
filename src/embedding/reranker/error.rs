use thiserror::Error;

use crate::embedding::error::EmbeddingError;

#[derive(Debug, Error)]
pub enum RerankerError {
    #[error("reranker request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("reranker returned HTTP {status}")]
    HttpStatus { status: u16 },

    #[error("reranker timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("malformed reranker response: {reason}")]
    MalformedResponse { reason: String },

    #[error("failed to load reranker model: {reason}")]
    ModelLoadFailed { reason: String },

    #[error("reranker inference failed: {reason}")]
    InferenceFailed { reason: String },

    #[error("tokenization failed: {reason}")]
    TokenizationFailed { reason: String },

    #[error("invalid reranker configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl From<candle_core::Error> for RerankerError {
    fn from(err: candle_core::Error) -> Self {
        RerankerError::InferenceFailed {
            reason: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for RerankerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            RerankerError::MalformedResponse {
                reason: err.to_string(),
            }
        } else {
            RerankerError::RequestFailed {
                reason: err.to_string(),
            }
        }
    }
}

impl From<EmbeddingError> for RerankerError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::TokenizationFailed { reason } => {
                RerankerError::TokenizationFailed { reason }
            }
            EmbeddingError::ModelNotFound { .. }
            | EmbeddingError::ModelLoadFailed { .. }
            | EmbeddingError::InvalidConfig { .. } => RerankerError::ModelLoadFailed {
                reason: err.to_string(),
            },
            _ => RerankerError::InferenceFailed {
                reason: err.to_string(),
            },
        }
    }
}

impl From<tokio::task::JoinError> for RerankerError {
    fn from(err: tokio::task::JoinError) -> Self {
        RerankerError::InferenceFailed {
            reason: format!("reranker task failed: {}", err),
        }
    }
}
