use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::config::RerankerConfig;
use super::error::RerankerError;
use super::{RerankScore, Reranker, validate_scores};

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    documents: &'a [String],
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    results: Vec<RerankScore>,
}

/// Parses and validates a JSON reranker response body.
pub fn parse_response(body: &str, document_count: usize) -> Result<Vec<RerankScore>, RerankerError> {
    let response: RerankResponse =
        serde_json::from_str(body).map_err(|e| RerankerError::MalformedResponse {
            reason: e.to_string(),
        })?;
    validate_scores(&response.results, document_count)?;
    Ok(response.results)
}

/// Reranker behind an HTTP endpoint.
///
/// `POST {endpoint}` with `{ "query", "documents" }`, expecting
/// `{ "results": [{ "index", "score" }] }`.
#[derive(Debug, Clone)]
pub struct HttpReranker {
    http: HttpClient,
    endpoint: String,
    api_key: Option<String>,
    timeout_ms: u64,
}

impl HttpReranker {
    pub fn new(config: RerankerConfig) -> Result<Self, RerankerError> {
        config
            .validate()
            .map_err(|reason| RerankerError::InvalidConfig { reason })?;

        let endpoint = config.endpoint.ok_or_else(|| RerankerError::InvalidConfig {
            reason: "endpoint is required for the HTTP reranker".to_string(),
        })?;

        let http = HttpClient::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| RerankerError::InvalidConfig {
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            endpoint,
            api_key: config.api_key,
            timeout_ms: config.timeout.as_millis() as u64,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    #[instrument(skip(self, query, documents), fields(documents = documents.len()))]
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
    ) -> Result<Vec<RerankScore>, RerankerError> {
        let mut request = self
            .http
            .post(&self.endpoint)
            .json(&RerankRequest { query, documents });
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                RerankerError::Timeout {
                    timeout_ms: self.timeout_ms,
                }
            } else {
                RerankerError::from(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RerankerError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let scores = parse_response(&body, documents.len())?;

        debug!(scored = scores.len(), "Remote rerank complete");
        Ok(scores)
    }
}
