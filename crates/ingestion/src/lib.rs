//! DocQA Ingestion Library
//!
//! PDF text extraction, chunking, and the build pipeline that turns
//! submitted documents into a persisted vector index.

pub mod chunker;
pub mod errors;
pub mod indexer;
pub mod pdf;
pub mod processor;

pub use chunker::Chunker;
pub use errors::IngestionError;
pub use indexer::{BuildReport, Indexer};
pub use processor::{DocumentSummary, IngestionOutcome, IngestionProcessor};
