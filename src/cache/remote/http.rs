use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode, Url};
use tracing::{debug, instrument};

use super::RemoteCacheClient;
use crate::cache::error::{CacheError, CacheResult};
use crate::cache::types::{CachedEmbedding, Principal};

/// Default per-request timeout for the remote tier.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// JSON-over-HTTP remote cache.
///
/// `GET/PUT/DELETE {base}/embeddings/{key}` with the principal's access token as a bearer
/// token. `404` on `GET` or `DELETE` means absent.
#[derive(Debug, Clone)]
pub struct HttpRemoteCache {
    http: HttpClient,
    base: Url,
    timeout_ms: u64,
}

impl HttpRemoteCache {
    pub fn new(base_url: &str, timeout: Duration) -> CacheResult<Self> {
        if timeout.is_zero() {
            return Err(CacheError::InvalidConfig {
                reason: "remote cache timeout must be > 0".to_string(),
            });
        }

        let base = Url::parse(base_url).map_err(|e| CacheError::InvalidConfig {
            reason: format!("invalid remote cache URL '{}': {}", base_url, e),
        })?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(CacheError::InvalidConfig {
                reason: format!("remote cache URL must be http(s), got '{}'", base_url),
            });
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CacheError::InvalidConfig {
                reason: format!("failed to build HTTP client: {}", e),
            })?;

        Ok(Self {
            http,
            base,
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    /// `{base}/embeddings/{key}` with the key percent-encoded as one path segment.
    pub fn entry_url(&self, key: &str) -> CacheResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| CacheError::InvalidConfig {
                reason: format!("remote cache URL cannot be a base: {}", self.base),
            })?
            .pop_if_empty()
            .extend(["embeddings", key]);
        Ok(url)
    }

    fn map_send_error(&self, e: reqwest::Error) -> CacheError {
        if e.is_timeout() {
            CacheError::Timeout {
                timeout_ms: self.timeout_ms,
            }
        } else {
            CacheError::Remote {
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl RemoteCacheClient for HttpRemoteCache {
    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    async fn fetch(
        &self,
        key: &str,
        principal: &Principal,
    ) -> CacheResult<Option<CachedEmbedding>> {
        let response = self
            .http
            .get(self.entry_url(key)?)
            .bearer_auth(&principal.access_token)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let entry = response
                    .json::<CachedEmbedding>()
                    .await
                    .map_err(|e| CacheError::Serialization {
                        reason: e.to_string(),
                    })?;
                debug!("Remote cache hit");
                Ok(Some(entry))
            }
            status => Err(CacheError::RemoteStatus {
                status: status.as_u16(),
            }),
        }
    }

    #[instrument(skip(self, entry, principal), fields(user_id = %principal.user_id))]
    async fn store(
        &self,
        key: &str,
        entry: &CachedEmbedding,
        principal: &Principal,
    ) -> CacheResult<()> {
        let response = self
            .http
            .put(self.entry_url(key)?)
            .bearer_auth(&principal.access_token)
            .json(entry)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::RemoteStatus {
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self, principal), fields(user_id = %principal.user_id))]
    async fn delete(&self, key: &str, principal: &Principal) -> CacheResult<bool> {
        let response = self
            .http
            .delete(self.entry_url(key)?)
            .bearer_auth(&principal.access_token)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(CacheError::RemoteStatus {
                status: status.as_u16(),
            }),
        }
    }
}
