//! Embedding service abstraction
//!
//! Provides a unified interface for multiple embedding providers:
//! - Google Gemini (models/embedding-001, text-embedding-004)
//! - OpenAI-compatible endpoints (text-embedding-3-small, ...)
//! - A deterministic local mock for tests and offline runs

mod gemini;
mod openai;

pub use gemini::GeminiEmbedder;
pub use openai::OpenAIEmbedder;

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, RemoteErrorKind, Result};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text (a query)
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts (documents), in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// Check that a provider returned one vector of the right size per input
pub(crate) fn check_vectors(
    vectors: &[Vec<f32>],
    inputs: usize,
    dimension: usize,
) -> Result<()> {
    if vectors.len() != inputs {
        return Err(AppError::EmbeddingService {
            kind: RemoteErrorKind::MalformedResponse,
            message: format!("Received {} embeddings for {} inputs", vectors.len(), inputs),
        });
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
        return Err(AppError::EmbeddingService {
            kind: RemoteErrorKind::MalformedResponse,
            message: format!(
                "Expected {}-dimensional embeddings, received {}",
                dimension,
                bad.len()
            ),
        });
    }
    Ok(())
}

/// Deterministic embedder for testing
///
/// Hashes lowercase alphanumeric tokens into buckets, so texts sharing words
/// point in similar directions.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase);

        for token in tokens {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = digest[..8]
                .iter()
                .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[(bucket % self.dimension as u64) as usize] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig, retry: RetryPolicy) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiEmbedder::new(config, retry)?)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config, retry)?)),
        "mock" => Ok(Arc::new(MockEmbedder::new(config.dimension))),
        other => Err(AppError::Configuration {
            message: format!("Unknown embedding provider '{}'", other),
        }),
    }
}

/// API key from config, rejecting blanks
pub(crate) fn require_api_key(api_key: &Option<String>, provider: &str) -> Result<String> {
    api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .ok_or_else(|| AppError::Configuration {
            message: format!("Missing API key for provider '{}'", provider),
        })
}
