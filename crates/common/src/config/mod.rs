//! Configuration management for DocQA services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values
//!
//! API keys live here and are handed to client constructors explicitly; the
//! clients themselves never read the process environment.

use crate::errors::{AppError, Result};
use crate::models::SimilarityMetric;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Generative model configuration
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Retry policy for remote calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Persisted vector index
    #[serde(default)]
    pub index: IndexConfig,

    /// Text chunking
    #[serde(default)]
    pub chunking: ChunkingConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum accepted request body (uploads) in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,

    /// Per-request timeout in seconds (uploads embed whole corpora)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: gemini, openai, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API key for embedding service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u64,

    /// Batch size for embedding requests
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerationConfig {
    /// Generation provider: gemini, openai, mock
    #[serde(default = "default_generation_provider")]
    pub provider: String,

    /// API key for the generation service
    pub api_key: Option<String>,

    /// API base URL (for custom endpoints)
    pub api_base: Option<String>,

    /// Model for text prompts
    #[serde(default = "default_generation_model")]
    pub model: String,

    /// Model for prompts carrying an image
    #[serde(default = "default_vision_model")]
    pub vision_model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum output tokens (provider default when unset)
    pub max_output_tokens: Option<u32>,

    /// Request timeout in seconds
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Retries after the first attempt for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First backoff interval in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Backoff ceiling in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Location of the persisted index file
    #[serde(default = "default_index_path")]
    pub path: PathBuf,

    /// Similarity metric used for new builds
    #[serde(default)]
    pub metric: SimilarityMetric,

    /// Chunks retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

/// How text is cut into chunks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategy {
    /// Fixed-size character window with exact overlap
    #[default]
    Window,
    /// Boundary-preferring splitter (sentences, words) with overlap
    Semantic,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChunkingConfig {
    #[serde(default)]
    pub strategy: ChunkStrategy,

    /// Maximum chunk size in characters
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level or filter directive (debug, info, docqa_search=debug)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default)]
    pub metrics_port: u16,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_max_upload_bytes() -> usize { 50 * 1024 * 1024 }
fn default_request_timeout() -> u64 { 300 }
fn default_embedding_provider() -> String { "gemini".to_string() }
fn default_embedding_model() -> String { "models/embedding-001".to_string() }
fn default_embedding_dimension() -> usize { 768 }
fn default_remote_timeout() -> u64 { 30 }
fn default_batch_size() -> usize { 32 }
fn default_generation_provider() -> String { "gemini".to_string() }
fn default_generation_model() -> String { "gemini-1.5-pro-latest".to_string() }
fn default_vision_model() -> String { "gemini-1.5-flash".to_string() }
fn default_temperature() -> f32 { 0.3 }
fn default_generation_timeout() -> u64 { 60 }
fn default_max_retries() -> u32 { 3 }
fn default_initial_backoff() -> u64 { 500 }
fn default_max_backoff() -> u64 { 8_000 }
fn default_index_path() -> PathBuf { PathBuf::from("data/faiss_index.dqix") }
fn default_top_k() -> usize { 4 }
fn default_chunk_size() -> usize { 10_000 }
fn default_chunk_overlap() -> usize { 1_000 }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { false }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            api_key: None,
            api_base: None,
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_remote_timeout(),
            batch_size: default_batch_size(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            api_key: None,
            api_base: None,
            model: default_generation_model(),
            vision_model: default_vision_model(),
            temperature: default_temperature(),
            max_output_tokens: None,
            timeout_secs: default_generation_timeout(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: default_index_path(),
            metric: SimilarityMetric::default(),
            top_k: default_top_k(),
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategy::default(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: 0,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            retry: RetryConfig::default(),
            index: IndexConfig::default(),
            chunking: ChunkingConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> std::result::Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))

            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))

            // Load local overrides
            .add_source(File::with_name("config/local").required(false))

            // Load from environment variables with APP__ prefix
            // e.g., APP__EMBEDDING__API_KEY=...
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
            )

            .build()?;

        config.try_deserialize()
    }

    /// Reject settings that would only fail later, mid-request
    pub fn validate(&self) -> Result<()> {
        let chunking = &self.chunking;
        if chunking.chunk_size == 0 {
            return Err(configuration("chunking.chunk_size must be greater than 0"));
        }
        if chunking.chunk_overlap >= chunking.chunk_size {
            return Err(configuration(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                chunking.chunk_overlap, chunking.chunk_size
            )));
        }
        if self.index.top_k == 0 {
            return Err(configuration("index.top_k must be greater than 0"));
        }
        if self.embedding.dimension == 0 {
            return Err(configuration("embedding.dimension must be greater than 0"));
        }
        if self.embedding.batch_size == 0 {
            return Err(configuration("embedding.batch_size must be greater than 0"));
        }
        require_key("embedding", &self.embedding.provider, &self.embedding.api_key)?;
        require_key("generation", &self.generation.provider, &self.generation.api_key)?;
        Ok(())
    }
}

fn configuration(message: impl Into<String>) -> AppError {
    AppError::Configuration {
        message: message.into(),
    }
}

fn require_key(section: &str, provider: &str, api_key: &Option<String>) -> Result<()> {
    if provider == "mock" {
        return Ok(());
    }
    match api_key {
        Some(key) if !key.trim().is_empty() => Ok(()),
        _ => Err(configuration(format!(
            "{section}.api_key is required for provider '{provider}'"
        ))),
    }
}
