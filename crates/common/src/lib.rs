//! DocQA Common Library
//!
//! Shared code for the DocQA crates including:
//! - Configuration management
//! - Error types and handling
//! - Embedding and generation client abstractions
//! - Bounded retry for remote calls
//! - Metrics and tracing setup

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod generation;
mod http;
pub mod metrics;
pub mod models;
pub mod retry;
pub mod telemetry;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use generation::Generator;
pub use models::{Chunk, Document, DocumentFailure, SimilarityMetric};
pub use retry::RetryPolicy;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
