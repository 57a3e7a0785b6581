//! Google Gemini embedding client (`embedContent` / `batchEmbedContents`)

use super::{check_vectors, require_api_key, Embedder};
use crate::config::EmbeddingConfig;
use crate::errors::Result;
use crate::http::{build_client, send_json, RemoteFailure};
use crate::metrics;
use crate::retry::{with_retry, RetryPolicy};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini embedding client
pub struct GeminiEmbedder {
    client: reqwest::Client,
    api_key: String,
    /// Fully qualified model name, e.g. `models/embedding-001`
    model: String,
    dimension: usize,
    base_url: String,
    batch_size: usize,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedContentRequest<'a>>,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: ContentEmbedding,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<ContentEmbedding>,
}

#[derive(Deserialize)]
struct ContentEmbedding {
    values: Vec<f32>,
}

impl GeminiEmbedder {
    /// Create a new Gemini embedder
    pub fn new(config: &EmbeddingConfig, retry: RetryPolicy) -> Result<Self> {
        let api_key = require_api_key(&config.api_key, "gemini")?;
        let client = build_client(Duration::from_secs(config.timeout_secs))?;
        let model = if config.model.starts_with("models/") {
            config.model.clone()
        } else {
            format!("models/{}", config.model)
        };

        Ok(Self {
            client,
            api_key,
            model,
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

    fn request(&self, method: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/{}:{}", self.base_url, self.model, method))
            .header("x-goog-api-key", &self.api_key)
    }

    async fn embed_query_once(&self, text: &str) -> Result<Vec<f32>> {
        let body = EmbedContentRequest {
            model: &self.model,
            content: Content { parts: [Part { text }] },
            task_type: "RETRIEVAL_QUERY",
        };
        let response: EmbedContentResponse = send_json(self.request("embedContent").json(&body))
            .await
            .map_err(RemoteFailure::into_embedding)?;
        Ok(response.embedding.values)
    }

    async fn embed_documents_once(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: &self.model,
                    content: Content {
                        parts: [Part { text: text.as_str() }],
                    },
                    task_type: "RETRIEVAL_DOCUMENT",
                })
                .collect(),
        };
        let response: BatchEmbedResponse =
            send_json(self.request("batchEmbedContents").json(&body))
                .await
                .map_err(RemoteFailure::into_embedding)?;
        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let result = with_retry(&self.retry, "gemini.embedContent", || {
            self.embed_query_once(text)
        })
        .await
        .and_then(|vector| {
            check_vectors(std::slice::from_ref(&vector), 1, self.dimension)?;
            Ok(vector)
        });
        metrics::record_embedding(start.elapsed().as_secs_f64(), &self.model, 1, result.is_ok());
        result
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let start = Instant::now();
            let result = with_retry(&self.retry, "gemini.batchEmbedContents", || {
                self.embed_documents_once(batch)
            })
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
