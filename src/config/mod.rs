//! Environment-backed configuration.
//!
//! Every setting has a default. Override with `SIEVE_*` environment variables.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{Principal, TieredCacheConfig};
use crate::constants::{
    DEFAULT_CACHE_TTL, DEFAULT_EMBEDDING_DIM, DEFAULT_MEMORY_CAPACITY, DEFAULT_MODEL_VERSION,
    DEFAULT_VECTOR_CACHE_CAPACITY,
};
use crate::embedding::{BertEmbedderConfig, GeneratorConfig, RerankerConfig};
use crate::rag::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, RagConfig};
use crate::vectordb::VectorStoreConfig;

/// Engine configuration loaded from environment variables.
///
/// Use [`Config::from_env`] to read `SIEVE_*` overrides on top of defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for the persistent cache and vector records. Default: `./.sieve`.
    pub storage_path: PathBuf,

    /// Sentence-transformer directory. `None` runs the deterministic stub model.
    pub model_path: Option<PathBuf>,

    /// Version tag stamped on embeddings from `model_path`.
    pub model_version: String,

    pub embedding_dim: usize,

    /// Max entries in the memory cache tier. Default: `1_000`.
    pub memory_capacity: u64,

    /// Embedding cache TTL in seconds. Default: 7 days.
    pub cache_ttl_secs: u64,

    /// Max entries in the vector store read cache. Default: `10_000`.
    pub vector_cache_capacity: u64,

    /// Remote cache base URL. `None` disables the remote tier.
    pub remote_cache_url: Option<String>,

    /// Caller identity for the remote tier.
    pub remote_user_id: Option<String>,

    pub remote_token: Option<String>,

    /// Remote reranking endpoint.
    pub reranker_url: Option<String>,

    pub reranker_api_key: Option<String>,

    /// Local cross-encoder directory.
    pub reranker_model_path: Option<PathBuf>,

    /// Words per chunk. Default: `200`.
    pub chunk_size: usize,

    /// Words shared by consecutive chunks. Default: `50`.
    pub chunk_overlap: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("./.sieve"),
            model_path: None,
            model_version: DEFAULT_MODEL_VERSION.to_string(),
            embedding_dim: DEFAULT_EMBEDDING_DIM,
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
            cache_ttl_secs: DEFAULT_CACHE_TTL.as_secs(),
            vector_cache_capacity: DEFAULT_VECTOR_CACHE_CAPACITY,
            remote_cache_url: None,
            remote_user_id: None,
            remote_token: None,
            reranker_url: None,
            reranker_api_key: None,
            reranker_model_path: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Config {
    const ENV_STORAGE_PATH: &'static str = "SIEVE_STORAGE_PATH";
    const ENV_MODEL_PATH: &'static str = "SIEVE_MODEL_PATH";
    const ENV_MODEL_VERSION: &'static str = "SIEVE_MODEL_VERSION";
    const ENV_EMBEDDING_DIM: &'static str = "SIEVE_EMBEDDING_DIM";
    const ENV_MEMORY_CAPACITY: &'static str = "SIEVE_MEMORY_CAPACITY";
    const ENV_CACHE_TTL_SECS: &'static str = "SIEVE_CACHE_TTL_SECS";
    const ENV_VECTOR_CACHE_CAPACITY: &'static str = "SIEVE_VECTOR_CACHE_CAPACITY";
    const ENV_REMOTE_CACHE_URL: &'static str = "SIEVE_REMOTE_CACHE_URL";
    const ENV_REMOTE_USER_ID: &'static str = "SIEVE_REMOTE_USER_ID";
    const ENV_REMOTE_TOKEN: &'static str = "SIEVE_REMOTE_TOKEN";
    const ENV_RERANKER_URL: &'static str = "SIEVE_RERANKER_URL";
    const ENV_RERANKER_API_KEY: &'static str = "SIEVE_RERANKER_API_KEY";
    const ENV_RERANKER_PATH: &'static str = "SIEVE_RERANKER_PATH";
    const ENV_CHUNK_SIZE: &'static str = "SIEVE_CHUNK_SIZE";
    const ENV_CHUNK_OVERLAP: &'static str = "SIEVE_CHUNK_OVERLAP";

    /// Loads configuration from environment variables (falling back to defaults).
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            storage_path: Self::parse_path_from_env(Self::ENV_STORAGE_PATH, defaults.storage_path),
            model_path: Self::parse_optional_path_from_env(Self::ENV_MODEL_PATH),
            model_version: Self::parse_optional_string_from_env(Self::ENV_MODEL_VERSION)
                .unwrap_or(defaults.model_version),
            embedding_dim: Self::parse_number_from_env(
                Self::ENV_EMBEDDING_DIM,
                defaults.embedding_dim,
            )?,
            memory_capacity: Self::parse_number_from_env(
                Self::ENV_MEMORY_CAPACITY,
                defaults.memory_capacity,
            )?,
            cache_ttl_secs: Self::parse_number_from_env(
                Self::ENV_CACHE_TTL_SECS,
                defaults.cache_ttl_secs,
            )?,
            vector_cache_capacity: Self::parse_number_from_env(
                Self::ENV_VECTOR_CACHE_CAPACITY,
                defaults.vector_cache_capacity,
            )?,
            remote_cache_url: Self::parse_optional_string_from_env(Self::ENV_REMOTE_CACHE_URL),
            remote_user_id: Self::parse_optional_string_from_env(Self::ENV_REMOTE_USER_ID),
            remote_token: Self::parse_optional_string_from_env(Self::ENV_REMOTE_TOKEN),
            reranker_url: Self::parse_optional_string_from_env(Self::ENV_RERANKER_URL),
            reranker_api_key: Self::parse_optional_string_from_env(Self::ENV_RERANKER_API_KEY),
            reranker_model_path: Self::parse_optional_path_from_env(Self::ENV_RERANKER_PATH),
            chunk_size: Self::parse_number_from_env(Self::ENV_CHUNK_SIZE, defaults.chunk_size)?,
            chunk_overlap: Self::parse_number_from_env(
                Self::ENV_CHUNK_OVERLAP,
                defaults.chunk_overlap,
            )?,
        })
    }

    /// Validates paths and basic invariants (does not create directories).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_path.exists() && !self.storage_path.is_dir() {
            return Err(ConfigError::NotADirectory {
                path: self.storage_path.clone(),
            });
        }

        for path in [&self.model_path, &self.reranker_model_path]
            .into_iter()
            .flatten()
        {
            if !path.exists() {
                return Err(ConfigError::PathNotFound { path: path.clone() });
            }
            if !path.is_dir() {
                return Err(ConfigError::NotADirectory { path: path.clone() });
            }
        }

        let positive = [
            ("embedding_dim", self.embedding_dim as u64),
            ("memory_capacity", self.memory_capacity),
            ("cache_ttl_secs", self.cache_ttl_secs),
            ("vector_cache_capacity", self.vector_cache_capacity),
            ("chunk_size", self.chunk_size as u64),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    name,
                    reason: "must be > 0".to_string(),
                });
            }
        }

        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::InvalidValue {
                name: "chunk_overlap",
                reason: format!(
                    "{} must be smaller than chunk_size {}",
                    self.chunk_overlap, self.chunk_size
                ),
            });
        }

        let urls = [
            ("remote_cache_url", &self.remote_cache_url),
            ("reranker_url", &self.reranker_url),
        ];
        for (name, url) in urls {
            if let Some(value) = url
                && !(value.starts_with("http://") || value.starts_with("https://"))
            {
                return Err(ConfigError::InvalidUrl {
                    name,
                    value: value.clone(),
                });
            }
        }

        Ok(())
    }

    /// Directory of the persistent embedding cache tier.
    pub fn cache_dir(&self) -> PathBuf {
        self.storage_path.join("cache")
    }

    /// Directory of the vector store records.
    pub fn vectors_dir(&self) -> PathBuf {
        self.storage_path.join("vectors")
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig::new(self.embedding_dim)
    }

    /// BERT model settings, when a model directory is configured.
    pub fn bert_config(&self) -> Option<BertEmbedderConfig> {
        self.model_path.as_ref().map(|path| {
            BertEmbedderConfig::new(path)
                .with_model_version(&self.model_version)
                .with_embedding_dim(self.embedding_dim)
        })
    }

    pub fn cache_config(&self) -> TieredCacheConfig {
        TieredCacheConfig::default()
            .with_memory_capacity(self.memory_capacity)
            .with_ttl(self.cache_ttl())
    }

    pub fn vector_store_config(&self) -> VectorStoreConfig {
        VectorStoreConfig::default()
            .with_cache_capacity(self.vector_cache_capacity)
            .with_dimension(self.embedding_dim)
    }

    pub fn rag_config(&self) -> RagConfig {
        RagConfig::default().with_chunking(self.chunk_size, self.chunk_overlap)
    }

    /// Reranker settings, when an endpoint or a local model is configured.
    pub fn reranker_config(&self) -> Option<RerankerConfig> {
        let mut config = match (&self.reranker_url, &self.reranker_model_path) {
            (Some(url), _) => RerankerConfig::http(url),
            (None, Some(path)) => RerankerConfig::local(path),
            (None, None) => return None,
        };
        config.api_key = self.reranker_api_key.clone();
        Some(config)
    }

    /// Remote-tier caller, when both a user id and a token are configured.
    pub fn principal(&self) -> Option<Principal> {
        match (&self.remote_user_id, &self.remote_token) {
            (Some(user_id), Some(token)) => Some(Principal::new(user_id, token)),
            _ => None,
        }
    }

    fn parse_number_from_env<T>(var_name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr<Err = std::num::ParseIntError>,
    {
        match Self::parse_optional_string_from_env(var_name) {
            Some(value) => value
                .parse()
                .map_err(|source| ConfigError::InvalidNumber {
                    name: var_name,
                    value,
                    source,
                }),
            None => Ok(default),
        }
    }

    fn parse_path_from_env(var_name: &str, default: PathBuf) -> PathBuf {
        Self::parse_optional_path_from_env(var_name).unwrap_or(default)
    }

    fn parse_optional_path_from_env(var_name: &str) -> Option<PathBuf> {
        Self::parse_optional_string_from_env(var_name).map(PathBuf::from)
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}
