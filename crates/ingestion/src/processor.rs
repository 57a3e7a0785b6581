//! Ingestion processor
//!
//! Turns submitted documents into chunks. Each document is extracted on the
//! blocking pool independently; a document that fails is reported and the
//! rest continue.

use crate::chunker::Chunker;
use crate::errors::IngestionError;
use crate::pdf::extract_text_from_bytes;
use docqa_common::models::{Chunk, Document, DocumentFailure};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

/// Per-document result of a successful extraction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub source_id: String,
    pub characters: usize,
    pub chunks: usize,
}

/// Everything extracted from one batch of documents
#[derive(Debug, Default)]
pub struct IngestionOutcome {
    pub chunks: Vec<Chunk>,
    pub documents: Vec<DocumentSummary>,
    pub failures: Vec<DocumentFailure>,
}

impl IngestionOutcome {
    fn record_failure(&mut self, source_id: &str, error: IngestionError) {
        warn!(source_id, error = %error, "Skipping document");
        self.failures.push(error.into_failure(source_id));
    }
}

/// Ingestion processor
#[derive(Debug, Clone)]
pub struct IngestionProcessor {
    chunker: Chunker,
}

impl IngestionProcessor {
    pub fn new(chunker: Chunker) -> Self {
        Self { chunker }
    }

    /// Extract and chunk in-memory documents, in submission order
    #[instrument(skip_all, fields(documents = documents.len()))]
    pub async fn process_documents(&self, documents: Vec<Document>) -> IngestionOutcome {
        let mut outcome = IngestionOutcome::default();

        for document in documents {
            let source_id = document.source_id.clone();
            match extract(document).await {
                Ok(text) => self.add_text(&mut outcome, &source_id, &text),
                Err(e) => outcome.record_failure(&source_id, e),
            }
        }

        info!(
            chunks = outcome.chunks.len(),
            extracted = outcome.documents.len(),
            failed = outcome.failures.len(),
            "Documents processed"
        );
        outcome
    }

    /// Read PDF files from disk and process them
    pub async fn process_paths(&self, paths: &[PathBuf]) -> IngestionOutcome {
        let mut documents = Vec::with_capacity(paths.len());
        let mut unreadable = Vec::new();

        for path in paths {
            let source_id = source_id_for(path);
            match tokio::fs::read(path).await {
                Ok(bytes) => documents.push(Document::new(source_id, bytes)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    unreadable.push((source_id.clone(), IngestionError::FileNotFound(source_id)))
                }
                Err(e) => unreadable.push((source_id, IngestionError::IoError(e))),
            }
        }

        let mut outcome = self.process_documents(documents).await;
        for (source_id, error) in unreadable {
            outcome.record_failure(&source_id, error);
        }
        outcome
    }

    fn add_text(&self, outcome: &mut IngestionOutcome, source_id: &str, text: &str) {
        match self.chunker.chunk(source_id, text) {
            Ok(chunks) => {
                outcome.documents.push(DocumentSummary {
                    source_id: source_id.to_string(),
                    characters: text.chars().count(),
                    chunks: chunks.len(),
                });
                outcome.chunks.extend(chunks);
            }
            Err(e) => outcome.record_failure(source_id, e),
        }
    }
}

async fn extract(document: Document) -> Result<String, IngestionError> {
    let source_id = document.source_id.clone();
    tokio::task::spawn_blocking(move || extract_text_from_bytes(&document.source_id, &document.bytes))
        .await
        .map_err(|e| IngestionError::PdfParseError {
            source_id,
            message: format!("Extraction task failed: {}", e),
        })?
}

fn source_id_for(path: &Path) -> String {
    path.display().to_string()
}
