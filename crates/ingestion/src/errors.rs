//! Ingestion error types

use docqa_common::errors::AppError;
use docqa_common::models::DocumentFailure;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestionError {
    #[error("PDF parse error for {source_id}: {message}")]
    PdfParseError { source_id: String, message: String },

    #[error("No extractable text in {0}")]
    NoText(String),

    #[error("Chunking error: {0}")]
    ChunkingError(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl IngestionError {
    /// Per-document failure entry for a build report
    pub fn into_failure(self, source_id: &str) -> DocumentFailure {
        let reason = match self {
            IngestionError::PdfParseError { message, .. } => message,
            IngestionError::NoText(_) => "no extractable text".to_string(),
            other => other.to_string(),
        };
        DocumentFailure {
            source_id: source_id.to_string(),
            reason,
        }
    }
}

impl From<IngestionError> for AppError {
    fn from(e: IngestionError) -> Self {
        match e {
            IngestionError::PdfParseError { source_id, message } => {
                AppError::ExtractionFailure { source_id, message }
            }
            IngestionError::NoText(source_id) => AppError::ExtractionFailure {
                source_id,
                message: "no extractable text".to_string(),
            },
            IngestionError::FileNotFound(path) => AppError::ExtractionFailure {
                source_id: path,
                message: "file not found".to_string(),
            },
            IngestionError::ChunkingError(message) => AppError::Configuration { message },
            IngestionError::IoError(e) => AppError::Internal {
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reason_is_short() {
        let failure = IngestionError::PdfParseError {
            source_id: "a.pdf".to_string(),
            message: "Failed to load PDF: invalid file header".to_string(),
        }
        .into_failure("a.pdf");
        assert_eq!(failure.reason, "Failed to load PDF: invalid file header");

        let failure = IngestionError::NoText("b.pdf".to_string()).into_failure("b.pdf");
        assert_eq!(failure.reason, "no extractable text");
    }

    #[test]
    fn test_maps_to_extraction_failure() {
        let err: AppError = IngestionError::NoText("scan.pdf".to_string()).into();
        assert!(matches!(err, AppError::ExtractionFailure { ref source_id, .. } if source_id == "scan.pdf"));
    }
}
