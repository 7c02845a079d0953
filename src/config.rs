use serde::Deserialize;
use std::env;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

use crate::processing::{ChunkSettings, PipelineSettings, RetryPolicy};

const DEFAULT_GOVINFO_URL: &str = "https://www.govinfo.gov";
const DEFAULT_BILL_TYPES: &str = "hr,s,hjres,sjres,hconres,sconres,hres,sres";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the billwatch pipeline and sweepers.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Base URL of the bulk data host serving manifests and bill XML.
    pub govinfo_base_url: String,
    /// Optional API key appended to bulk data requests.
    pub govinfo_api_key: Option<String>,
    /// Congress number whose manifests are scanned.
    pub congress: u32,
    /// Sessions of the congress to scan.
    pub sessions: Vec<u32>,
    /// Bill type tokens (`hr`, `s`, `hconres`, ...) to scan.
    pub bill_types: Vec<String>,
    /// Path of the SQLite database holding bills, versions, and the watermark.
    pub database_path: String,
    /// Base URL of the Qdrant instance backing the semantic index.
    pub qdrant_url: String,
    /// Name of the Qdrant collection used for bill chunks.
    pub qdrant_collection_name: String,
    /// Optional API key required to access Qdrant.
    pub qdrant_api_key: Option<String>,
    /// Embedding provider used to vectorize chunks.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of the produced vectors.
    pub embedding_dimension: usize,
    /// Base URL of the Ollama runtime used for summaries (and embeddings when selected).
    pub ollama_url: String,
    /// Model used for bill summarization.
    pub summarization_model: String,
    /// Documents processed concurrently per batch.
    pub batch_size: usize,
    /// Pause inserted between batches.
    pub batch_pause_ms: u64,
    /// Attempts allowed for each retryable step.
    pub max_attempts: u32,
    /// Base delay of the exponential backoff.
    pub retry_base_ms: u64,
    /// Target chunk size in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    pub chunk_overlap: usize,
    /// Seconds the stored watermark is moved back from the pass start.
    pub watermark_margin_secs: u64,
    /// Index entries younger than this many seconds are left alone by the index sweep.
    pub sweep_grace_secs: u64,
}

/// Supported embedding backends for the semantic index.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Local Ollama runtime.
    Ollama,
    /// Deterministic hashing embedder with no external dependency.
    Hash,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let chunk_size = parse_or("TEXT_SPLITTER_CHUNK_SIZE", 2000)?;
        let chunk_overlap = parse_or("TEXT_SPLITTER_CHUNK_OVERLAP", 200)?;
        if chunk_size == 0 || chunk_overlap >= chunk_size {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_CHUNK_OVERLAP".to_string(),
            ));
        }

        let batch_size = parse_or("BILLWATCH_BATCH_SIZE", 5)?;
        if batch_size == 0 {
            return Err(ConfigError::InvalidValue("BILLWATCH_BATCH_SIZE".into()));
        }
        let max_attempts = parse_or("BILLWATCH_MAX_ATTEMPTS", 3)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue("BILLWATCH_MAX_ATTEMPTS".into()));
        }

        Ok(Self {
            govinfo_base_url: load_env_optional("GOVINFO_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GOVINFO_URL.to_string()),
            govinfo_api_key: load_env_optional("GOVINFO_API_KEY"),
            congress: parse_or("BILLWATCH_CONGRESS", 119)?,
            sessions: parse_list("BILLWATCH_SESSIONS", "1,2")?,
            bill_types: load_env_optional("BILLWATCH_BILL_TYPES")
                .unwrap_or_else(|| DEFAULT_BILL_TYPES.to_string())
                .split(',')
                .map(|value| value.trim().to_lowercase())
                .filter(|value| !value.is_empty())
                .collect(),
            database_path: load_env_optional("BILLWATCH_DATABASE_PATH")
                .unwrap_or_else(|| "billwatch.db".to_string()),
            qdrant_url: load_env("QDRANT_URL")?,
            qdrant_collection_name: load_env_optional("QDRANT_COLLECTION_NAME")
                .unwrap_or_else(|| "bills".to_string()),
            qdrant_api_key: load_env_optional("QDRANT_API_KEY"),
            embedding_provider: load_env_optional("EMBEDDING_PROVIDER")
                .unwrap_or_else(|| "hash".to_string())
                .parse()
                .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))?,
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| "nomic-embed-text".to_string()),
            embedding_dimension: parse_or("EMBEDDING_DIMENSION", 768)?,
            ollama_url: load_env_optional("OLLAMA_URL")
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            summarization_model: load_env_optional("SUMMARIZATION_MODEL")
                .unwrap_or_else(|| "llama3.1".to_string()),
            batch_size,
            batch_pause_ms: parse_or("BILLWATCH_BATCH_PAUSE_MS", 0)?,
            max_attempts,
            retry_base_ms: parse_or("BILLWATCH_RETRY_BASE_MS", 500)?,
            chunk_size,
            chunk_overlap,
            watermark_margin_secs: parse_or("BILLWATCH_WATERMARK_MARGIN_SECS", 60)?,
            sweep_grace_secs: parse_or("BILLWATCH_SWEEP_GRACE_SECS", 900)?,
        })
    }

    /// Pipeline knobs derived from this configuration.
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            congress: self.congress,
            sessions: self.sessions.clone(),
            bill_types: self.bill_types.clone(),
            batch_size: self.batch_size,
            batch_pause: Duration::from_millis(self.batch_pause_ms),
            retry: RetryPolicy {
                max_attempts: self.max_attempts,
                base_delay: Duration::from_millis(self.retry_base_ms),
            },
            chunking: ChunkSettings {
                chunk_size: self.chunk_size,
                overlap: self.chunk_overlap,
            },
            watermark_margin: Duration::from_secs(self.watermark_margin_secs),
        }
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|value| value.unwrap_or(default))
}

fn parse_list(key: &str, default: &str) -> Result<Vec<u32>, ConfigError> {
    let raw = load_env_optional(key).unwrap_or_else(|| default.to_string());
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            value
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .collect()
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "hash" => Ok(Self::Hash),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        govinfo_url = %config.govinfo_base_url,
        congress = config.congress,
        bill_types = ?config.bill_types,
        qdrant_url = %config.qdrant_url,
        collection = %config.qdrant_collection_name,
        embedding_provider = ?config.embedding_provider,
        batch_size = config.batch_size,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
