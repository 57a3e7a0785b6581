//! DocQA Ingestion CLI
//!
//! Builds the vector index from PDF files:
//! 1. Extracts text from every file
//! 2. Chunks the text
//! 3. Embeds the chunks
//! 4. Replaces the index at `index.path`

use docqa_common::{
    config::AppConfig, embeddings::create_embedder, retry::RetryPolicy, telemetry, VERSION,
};
use docqa_ingestion::Indexer;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let paths: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        eprintln!("usage: ingest <file.pdf>...");
        return Ok(ExitCode::from(2));
    }

    let config = Arc::new(AppConfig::load()?);
    telemetry::init_tracing(&config.observability);
    info!("Starting DocQA ingestion v{}", VERSION);

    config.validate()?;

    let embedder = create_embedder(&config.embedding, RetryPolicy::from_config(&config.retry))?;
    let indexer = Indexer::from_config(&config, embedder)?;

    match indexer.build_from_paths(&paths).await {
        Ok(report) => {
            for failure in &report.failures {
                warn!(source_id = %failure.source_id, reason = %failure.reason, "Document skipped");
            }
            info!(
                chunks = report.chunks,
                documents = report.documents.len(),
                path = %config.index.path.display(),
                "Index built"
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "Index build failed");
            if let docqa_common::AppError::EmptyCorpus { failures } = &e {
                for failure in failures {
                    error!(source_id = %failure.source_id, reason = %failure.reason, "Document skipped");
                }
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
