//! Grounded question answering service
//!
//! Owns the remote clients and the index location. Every operation is one
//! request/response chain; index builds and loads are serialized per
//! location by the store.

use crate::prompt::{is_unanswered, PromptComposer};
use docqa_common::config::AppConfig;
use docqa_common::embeddings::{create_embedder, Embedder};
use docqa_common::errors::{AppError, Result};
use docqa_common::generation::{create_generator, GenerationRequest, Generator, ImagePayload};
use docqa_common::metrics;
use docqa_common::models::Document;
use docqa_common::retry::RetryPolicy;
use docqa_ingestion::{BuildReport, Indexer};
use docqa_search::{IndexStats, ScoredChunk};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Answer to a question against the index
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// Generator output, verbatim
    pub answer: String,
    /// False when the generator replied with the "not in context" phrase
    pub answered: bool,
    /// Retrieved chunks, most similar first
    pub sources: Vec<ScoredChunk>,
}

/// Document question answering service
pub struct DocumentQa {
    indexer: Indexer,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    vision: Arc<dyn Generator>,
    composer: PromptComposer,
    top_k: usize,
}

impl DocumentQa {
    pub fn new(
        indexer: Indexer,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        vision: Arc<dyn Generator>,
        top_k: usize,
    ) -> Self {
        Self {
            indexer,
            embedder,
            generator,
            vision,
            composer: PromptComposer::new(),
            top_k,
        }
    }

    /// Wire up providers, index location and chunking from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let retry = RetryPolicy::from_config(&config.retry);
        let embedder = create_embedder(&config.embedding, retry.clone())?;
        let generator = create_generator(&config.generation, &config.generation.model, retry.clone())?;
        let vision = create_generator(&config.generation, &config.generation.vision_model, retry)?;
        let indexer = Indexer::from_config(config, embedder.clone())?;

        info!(
            embedding_model = embedder.model_name(),
            generation_model = generator.model_name(),
            vision_model = vision.model_name(),
            index = %indexer.store().path().display(),
            "Question answering service configured"
        );

        Ok(Self::new(indexer, embedder, generator, vision, config.index.top_k))
    }

    /// Replace the index with one built from uploaded documents
    pub async fn build_from_documents(&self, documents: Vec<Document>) -> Result<BuildReport> {
        if documents.is_empty() {
            return Err(AppError::validation("At least one document is required"));
        }
        self.indexer.build_from_documents(documents).await
    }

    /// Answer `question` from the `k` most similar chunks (configured default when `None`)
    #[instrument(skip(self, question), fields(question_len = question.len()))]
    pub async fn ask(&self, question: &str, k: Option<usize>) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AppError::Validation {
                message: "Question must not be empty".to_string(),
                field: Some("question".to_string()),
            });
        }
        let k = k.unwrap_or(self.top_k);
        if k == 0 {
            return Err(AppError::Validation {
                message: "k must be greater than 0".to_string(),
                field: Some("k".to_string()),
            });
        }

        let start = Instant::now();
        let store = self.indexer.store();
        let index = store.load_for(self.embedder.as_ref()).await?;
        if index.is_empty() {
            return Err(AppError::IndexNotFound {
                path: store.path().display().to_string(),
            });
        }

        let vector = self.embedder.embed(question).await?;
        let sources = index.query(&vector, k)?;
        debug!(retrieved = sources.len(), "Chunks retrieved");

        let prompt = self.composer.compose(question, &sources);
        let answer = self.generator.generate(&GenerationRequest::text(prompt)).await?;
        let answered = !is_unanswered(&answer);

        metrics::record_query(start.elapsed().as_secs_f64(), answered);
        info!(answered, sources = sources.len(), "Question answered");

        Ok(Answer {
            answer,
            answered,
            sources,
        })
    }

    /// Plain prompt to the text model, no retrieval
    #[instrument(skip_all)]
    pub async fn chat(&self, prompt: &str) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(AppError::Validation {
                message: "Prompt must not be empty".to_string(),
                field: Some("prompt".to_string()),
            });
        }
        self.generator.generate(&GenerationRequest::text(prompt)).await
    }

    /// Describe an image, optionally steered by a prompt
    #[instrument(skip_all, fields(mime_type = %image.mime_type, bytes = image.data.len()))]
    pub async fn caption(&self, image: ImagePayload, prompt: &str) -> Result<String> {
        if image.data.is_empty() {
            return Err(AppError::Validation {
                message: "Image must not be empty".to_string(),
                field: Some("image".to_string()),
            });
        }
        if !image.mime_type.starts_with("image/") {
            return Err(AppError::Validation {
                message: format!("Unsupported content type '{}'", image.mime_type),
                field: Some("image".to_string()),
            });
        }
        self.vision
            .generate(&GenerationRequest::with_image(prompt.trim(), image))
            .await
    }

    /// Size of the persisted index, `None` before the first build
    pub async fn index_stats(&self) -> Result<Option<IndexStats>> {
        self.indexer.store().stats().await
    }
}
