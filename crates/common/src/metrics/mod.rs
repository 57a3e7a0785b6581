//! Metrics and observability utilities
//!
//! All metrics carry the `docqa_` prefix. Recording is a no-op until a
//! recorder (e.g. the Prometheus exporter in the gateway) is installed.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};

/// Metrics prefix for all DocQA metrics
pub const METRICS_PREFIX: &str = "docqa";

/// Buckets for remote model latency (in seconds)
pub const REMOTE_CALL_BUCKETS: &[f64] = &[
    0.050, 0.100, 0.250, 0.500, 1.000, 2.000, 5.000, 10.00, 30.00, 60.00,
];

/// Buckets for index query latency (in seconds)
pub const QUERY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.000,
];

fn name(suffix: &str) -> String {
    format!("{}_{}", METRICS_PREFIX, suffix)
}

/// Register all metric descriptions
pub fn register_metrics() {
    describe_counter!(name("embedding_requests_total"), Unit::Count, "Total embedding API calls");
    describe_counter!(name("embedding_errors_total"), Unit::Count, "Total failed embedding API calls");
    describe_counter!(name("embedded_texts_total"), Unit::Count, "Total texts embedded");
    describe_histogram!(
        name("embedding_duration_seconds"),
        Unit::Seconds,
        "Embedding call latency in seconds"
    );

    describe_counter!(name("generation_requests_total"), Unit::Count, "Total generation API calls");
    describe_histogram!(
        name("generation_duration_seconds"),
        Unit::Seconds,
        "Generation call latency in seconds"
    );

    describe_counter!(name("index_builds_total"), Unit::Count, "Total index builds");
    describe_histogram!(name("index_build_duration_seconds"), Unit::Seconds, "Index build latency in seconds");
    describe_gauge!(name("index_chunks"), Unit::Count, "Chunks in the most recently built index");
    describe_counter!(
        name("extraction_failures_total"),
        Unit::Count,
        "Documents that could not be extracted"
    );

    describe_counter!(name("queries_total"), Unit::Count, "Total questions answered");
    describe_histogram!(name("query_duration_seconds"), Unit::Seconds, "Question answering latency in seconds");

    tracing::info!("Metrics registered");
}

/// Record one embedding call covering `texts` inputs
pub fn record_embedding(duration_secs: f64, model: &str, texts: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(name("embedding_requests_total"), "model" => model.to_string(), "status" => status)
        .increment(1);

    if success {
        counter!(name("embedded_texts_total"), "model" => model.to_string()).increment(texts as u64);
        histogram!(name("embedding_duration_seconds"), "model" => model.to_string()).record(duration_secs);
    } else {
        counter!(name("embedding_errors_total"), "model" => model.to_string()).increment(1);
    }
}

/// Record one generation call
pub fn record_generation(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(name("generation_requests_total"), "model" => model.to_string(), "status" => status)
        .increment(1);
    histogram!(name("generation_duration_seconds"), "model" => model.to_string()).record(duration_secs);
}

/// Record an index build outcome
pub fn record_build(duration_secs: f64, chunks: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(name("index_builds_total"), "status" => status).increment(1);
    histogram!(name("index_build_duration_seconds")).record(duration_secs);
    if success {
        gauge!(name("index_chunks")).set(chunks as f64);
    }
}

/// Record documents skipped during extraction
pub fn record_extraction_failures(count: usize) {
    if count > 0 {
        counter!(name("extraction_failures_total")).increment(count as u64);
    }
}

/// Record a question against the index
pub fn record_query(duration_secs: f64, answered: bool) {
    let outcome = if answered { "answered" } else { "unanswered" };

    counter!(name("queries_total"), "outcome" => outcome).increment(1);
    histogram!(name("query_duration_seconds")).record(duration_secs);
}
