//! OpenAI-compatible embedding client

use super::{check_vectors, require_api_key, Embedder};
use crate::config::EmbeddingConfig;
use crate::errors::{AppError, RemoteErrorKind, Result};
use crate::http::{build_client, send_json, RemoteFailure};
use crate::metrics;
use crate::retry::{with_retry, RetryPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI embedding client
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    api_key: String,
    model: String,
    dimension: usize,
    base_url: String,
    batch_size: usize,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    data: Vec<OpenAIEmbedding>,
}

#[derive(Deserialize)]
struct OpenAIEmbedding {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAIEmbedder {
    /// Create a new OpenAI embedder
    pub fn new(config: &EmbeddingConfig, retry: RetryPolicy) -> Result<Self> {
        let api_key = require_api_key(&config.api_key, "openai")?;
        let client = build_client(Duration::from_secs(config.timeout_secs))?;

        Ok(Self {
            client,
            api_key,
            model: config.model.clone(),
            dimension: config.dimension,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            batch_size: config.batch_size.max(1),
            retry,
        })
    }

    async fn make_request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = OpenAIRequest {
            input: texts,
            model: &self.model,
        };

        let builder = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request);

        let mut response: OpenAIResponse = send_json(builder)
            .await
            .map_err(RemoteFailure::into_embedding)?;

        // entries may come back out of order
        response.data.sort_by_key(|entry| entry.index);
        Ok(response.data.into_iter().map(|e| e.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings.into_iter().next().ok_or_else(|| AppError::EmbeddingService {
            kind: RemoteErrorKind::MalformedResponse,
            message: "Empty response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let start = Instant::now();
            let result = with_retry(&self.retry, "openai.embeddings", || self.make_request(batch))
                .await
                .and_then(|vectors| {
                    check_vectors(&vectors, batch.len(), self.dimension)?;
                    Ok(vectors)
                });
            metrics::record_embedding(
                start.elapsed().as_secs_f64(),
                &self.model,
                batch.len(),
                result.is_ok(),
            );
            all_embeddings.extend(result?);
        }

        Ok(all_embeddings)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
