//! Index build pipeline: extract, chunk, embed, persist

use crate::chunker::Chunker;
use crate::processor::{DocumentSummary, IngestionOutcome, IngestionProcessor};
use docqa_common::config::AppConfig;
use docqa_common::embeddings::Embedder;
use docqa_common::errors::{AppError, Result};
use docqa_common::metrics;
use docqa_common::models::{Document, DocumentFailure};
use docqa_search::IndexStore;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Result of a successful build
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// Chunks stored in the new index
    pub chunks: usize,
    pub dimension: usize,
    pub model: String,
    pub documents: Vec<DocumentSummary>,
    pub failures: Vec<DocumentFailure>,
}

/// Builds the index at one location from submitted documents
pub struct Indexer {
    processor: IngestionProcessor,
    store: IndexStore,
    embedder: Arc<dyn Embedder>,
}

impl Indexer {
    pub fn new(processor: IngestionProcessor, store: IndexStore, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            processor,
            store,
            embedder,
        }
    }

    pub fn from_config(config: &AppConfig, embedder: Arc<dyn Embedder>) -> Result<Self> {
        let chunker = Chunker::from_config(&config.chunking)?;
        Ok(Self::new(
            IngestionProcessor::new(chunker),
            IndexStore::from_config(&config.index),
            embedder,
        ))
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Replace the index with one built from uploaded documents
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn build_from_documents(&self, documents: Vec<Document>) -> Result<BuildReport> {
        let outcome = self.processor.process_documents(documents).await;
        self.build(outcome).await
    }

    /// Replace the index with one built from PDF files
    #[instrument(skip_all, fields(paths = paths.len()))]
    pub async fn build_from_paths(&self, paths: &[PathBuf]) -> Result<BuildReport> {
        let outcome = self.processor.process_paths(paths).await;
        self.build(outcome).await
    }

    async fn build(&self, outcome: IngestionOutcome) -> Result<BuildReport> {
        let IngestionOutcome {
            chunks,
            documents,
            failures,
        } = outcome;
        metrics::record_extraction_failures(failures.len());

        if chunks.is_empty() {
            warn!(failed = failures.len(), "No chunks extracted, keeping previous index");
            return Err(AppError::EmptyCorpus { failures });
        }

        let index = self.store.build(chunks, self.embedder.as_ref()).await?;
        info!(
            chunks = index.len(),
            documents = documents.len(),
            failed = failures.len(),
            path = %self.store.path().display(),
            "Index replaced"
        );

        Ok(BuildReport {
            chunks: index.len(),
            dimension: index.dimension(),
            model: index.model().to_string(),
            documents,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::tests::sample_pdf;
    use docqa_common::embeddings::MockEmbedder;
    use docqa_common::models::SimilarityMetric;

    fn indexer(dir: &tempfile::TempDir) -> Indexer {
        Indexer::new(
            IngestionProcessor::new(Chunker::new(200, 20).unwrap()),
            IndexStore::new(dir.path().join("index.dqix"), SimilarityMetric::Cosine),
            Arc::new(MockEmbedder::new(64)),
        )
    }

    #[tokio::test]
    async fn test_build_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = indexer(&dir);

        let report = indexer
            .build_from_documents(vec![
                Document::new("geo.pdf", sample_pdf(&["The capital of France is Paris."])),
                Document::new("junk.pdf", b"not a pdf".to_vec()),
            ])
            .await
            .unwrap();

        assert_eq!(report.chunks, 1);
        assert_eq!(report.dimension, 64);
        assert_eq!(report.documents[0].source_id, "geo.pdf");
        assert_eq!(report.failures[0].source_id, "junk.pdf");
        assert_eq!(indexer.store().load().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_nothing_extractable_is_empty_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let indexer = indexer(&dir);
        indexer
            .build_from_documents(vec![Document::new("keep.pdf", sample_pdf(&["Kept text."]))])
            .await
            .unwrap();

        let err = indexer
            .build_from_documents(vec![Document::new("junk.pdf", b"junk".to_vec())])
            .await
            .unwrap_err();

        match err {
            AppError::EmptyCorpus { failures } => assert_eq!(failures[0].source_id, "junk.pdf"),
            other => panic!("unexpected error: {other}"),
        }
        let loaded = indexer.store().load().await.unwrap();
        assert_eq!(loaded.records()[0].chunk.source_id, "keep.pdf");
    }
}
