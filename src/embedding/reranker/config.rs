use std::path::PathBuf;
use std::time::Duration;

/// Default request timeout for remote reranking.
pub const DEFAULT_RERANK_TIMEOUT: Duration = Duration::from_secs(10);

/// Max tokens per query/document pair for the local cross-encoder.
pub const MAX_SEQ_LEN: usize = 512;

/// Backend settings for building a reranker.
///
/// `endpoint` selects [`HttpReranker`](super::HttpReranker); otherwise `model_path` selects a
/// local [`CrossEncoderReranker`](super::CrossEncoderReranker) (lexical scoring when unset).
#[derive(Debug, Clone)]
pub struct RerankerConfig {
    pub endpoint: Option<String>,

    pub api_key: Option<String>,

    pub model_path: Option<PathBuf>,

    pub timeout: Duration,
}

impl Default for RerankerConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            api_key: None,
            model_path: None,
            timeout: DEFAULT_RERANK_TIMEOUT,
        }
    }
}

impl RerankerConfig {
    pub fn http(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: Some(endpoint.into()),
            ..Default::default()
        }
    }

    pub fn local<P: Into<PathBuf>>(model_path: P) -> Self {
        Self {
            model_path: Some(model_path.into()),
            ..Default::default()
        }
    }

    pub fn stub() -> Self {
        Self::default()
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.timeout.is_zero() {
            return Err("timeout must be > 0".to_string());
        }

        if let Some(ref endpoint) = self.endpoint
            && !(endpoint.starts_with("http://") || endpoint.starts_with("https://"))
        {
            return Err(format!("endpoint must be an http(s) URL, got '{}'", endpoint));
        }

        if let Some(ref path) = self.model_path
            && path.as_os_str().is_empty()
        {
            return Err("model_path cannot be empty when provided".to_string());
        }

        Ok(())
    }

    pub fn from_env() -> Self {
        let read = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let timeout = read("SIEVE_RERANKER_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RERANK_TIMEOUT);

        Self {
            endpoint: read("SIEVE_RERANKER_URL"),
            api_key: read("SIEVE_RERANKER_API_KEY"),
            model_path: read("SIEVE_RERANKER_PATH").map(PathBuf::from),
            timeout,
        }
    }
}
