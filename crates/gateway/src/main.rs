//! DocQA API Gateway
//!
//! HTTP entry point for:
//! - Uploading PDFs to (re)build the index
//! - Grounded question answering over the uploaded documents
//! - Plain chat and image captioning
//! - Observability (logging, metrics)

mod handlers;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use docqa_common::{config::AppConfig, metrics, telemetry};
use docqa_context::DocumentQa;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub qa: Arc<DocumentQa>,
}

impl AppState {
    pub fn from_config(config: AppConfig) -> docqa_common::Result<Self> {
        let qa = DocumentQa::from_config(&config)?;
        Ok(Self {
            config: Arc::new(config),
            qa: Arc::new(qa),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;
    telemetry::init_tracing(&config.observability);
    info!("Starting DocQA API Gateway v{}", docqa_common::VERSION);

    config.validate()?;

    // Initialize metrics
    metrics::register_metrics();
    if config.observability.metrics_port != 0 {
        install_metrics_exporter(config.observability.metrics_port)?;
    }

    let state = AppState::from_config(config)?;
    let addr = (state.config.server.host.clone(), state.config.server.port);

    // Build the router
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind((addr.0.as_str(), addr.1))
        .await
        .with_context(|| format!("Failed to bind {}:{}", addr.0, addr.1))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Serve Prometheus metrics on their own port
fn install_metrics_exporter(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_query_duration_seconds", metrics::METRICS_PREFIX)),
            metrics::QUERY_BUCKETS,
        )?
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            metrics::REMOTE_CALL_BUCKETS,
        )?
        .with_http_listener(addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    let body_limit = DefaultBodyLimit::max(state.config.server.max_upload_bytes);
    let timeout = TimeoutLayer::new(Duration::from_secs(state.config.server.request_timeout_secs));

    let api_routes = Router::new()
        .route("/documents", post(handlers::documents::upload_documents))
        .route("/ask", post(handlers::qa::ask))
        .route("/chat", post(handlers::qa::chat))
        .route("/caption", post(handlers::caption::caption));

    // Compose the app
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/v1", api_routes)
        .layer(body_limit)
        .layer(timeout)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::Value;
    use tower::ServiceExt;

    const BOUNDARY: &str = "docqa-test-boundary";

    fn mock_config(dir: &tempfile::TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.embedding.provider = "mock".to_string();
        config.embedding.dimension = 64;
        config.generation.provider = "mock".to_string();
        config.index.path = dir.path().join("index.dqix");
        config
    }

    fn test_app(dir: &tempfile::TempDir) -> Router {
        create_router(AppState::from_config(mock_config(dir)).unwrap())
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn json_post(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    /// (field name, optional file name, content type, bytes)
    fn multipart_post(uri: &str, parts: &[(&str, Option<&str>, &str, &[u8])]) -> Request<Body> {
        let mut body = Vec::new();
        for (name, file_name, content_type, data) in parts {
            body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            let disposition = match file_name {
                Some(f) => format!("form-data; name=\"{}\"; filename=\"{}\"", name, f),
                None => format!("form-data; name=\"{}\"", name),
            };
            body.extend_from_slice(format!("Content-Disposition: {}\r\n", disposition).as_bytes());
            body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", content_type).as_bytes());
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir);

        let (status, body) = send(app.clone(), Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = send(app, Request::get("/ready").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "not_ready");
        assert_eq!(body["index"]["status"], "missing");
    }

    #[tokio::test]
    async fn test_ask_before_upload_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = send(
            test_app(&dir),
            json_post("/v1/ask", serde_json::json!({ "question": "What is the capital of France?" })),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"]["message"].as_str().unwrap().contains("No index found"));
    }

    #[tokio::test]
    async fn test_ask_validates_request() {
        let dir = tempfile::tempdir().unwrap();
        let app = test_app(&dir);

        let (status, _) = send(app.clone(), json_post("/v1/ask", serde_json::json!({ "question": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            app,
            json_post("/v1/ask", serde_json::json!({ "question": "Why?", "k": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_upload_without_text_reports_failures() {
        let dir = tempfile::tempdir().unwrap();
        let request = multipart_post(
            "/v1/documents",
            &[("files", Some("scan.pdf"), "application/pdf", &b"not really a pdf"[..])],
        );

        let (status, body) = send(test_app(&dir), request).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["details"]["failures"][0]["source_id"], "scan.pdf");
    }

    #[tokio::test]
    async fn test_upload_requires_files() {
        let dir = tempfile::tempdir().unwrap();
        let request = multipart_post("/v1/documents", &[("note", None, "text/plain", &b"hello"[..])]);

        let (status, _) = send(test_app(&dir), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat() {
        let dir = tempfile::tempdir().unwrap();
        let (status, body) = send(
            test_app(&dir),
            json_post("/v1/chat", serde_json::json!({ "prompt": "Hello" })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "Mock response: Hello");
    }

    #[tokio::test]
    async fn test_caption() {
        let dir = tempfile::tempdir().unwrap();
        let request = multipart_post(
            "/v1/caption",
            &[
                ("prompt", None, "text/plain", &b"Describe it"[..]),
                ("image", Some("cat.png"), "image/png", &[0x89u8, 0x50, 0x4e, 0x47][..]),
            ],
        );

        let (status, body) = send(test_app(&dir), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "An uploaded image/png image (4 bytes). Prompt: Describe it");
    }

    #[tokio::test]
    async fn test_upload_over_body_limit_is_413() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = mock_config(&dir);
        config.server.max_upload_bytes = 256;
        let app = create_router(AppState::from_config(config).unwrap());

        let large = vec![b'x'; 4096];
        let request = multipart_post(
            "/v1/documents",
            &[("files", Some("big.pdf"), "application/pdf", &large[..])],
        );

        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
    }

    #[tokio::test]
    async fn test_caption_with_generic_content_type() {
        let dir = tempfile::tempdir().unwrap();
        let request = multipart_post(
            "/v1/caption",
            &[(
                "image",
                Some("cat.png"),
                "application/octet-stream",
                &[0x89u8, 0x50, 0x4e, 0x47][..],
            )],
        );

        let (status, body) = send(test_app(&dir), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["answer"], "An uploaded image/png image (4 bytes).");
    }

    #[tokio::test]
    async fn test_caption_requires_image() {
        let dir = tempfile::tempdir().unwrap();
        let request = multipart_post("/v1/caption", &[("prompt", None, "text/plain", &b"Describe it"[..])]);

        let (status, body) = send(test_app(&dir), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"].as_str().unwrap().contains("image"));
    }
}
