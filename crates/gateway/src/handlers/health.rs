//! Health check handlers

use crate::AppState;
use axum::{extract::State, Json};
use docqa_search::IndexStats;
use serde::Serialize;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub index: IndexCheck,
}

#[derive(Serialize)]
pub struct IndexCheck {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: docqa_common::VERSION,
    })
}

/// Readiness probe - reports whether questions can be answered yet
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let index = match state.qa.index_stats().await {
        Ok(Some(IndexStats { chunks, model, .. })) => IndexCheck {
            status: "built".to_string(),
            chunks: Some(chunks),
            model: Some(model),
            error: None,
        },
        Ok(None) => IndexCheck {
            status: "missing".to_string(),
            chunks: None,
            model: None,
            error: None,
        },
        Err(e) => IndexCheck {
            status: "unreadable".to_string(),
            chunks: None,
            model: None,
            error: Some(e.to_string()),
        },
    };

    let ready = index.status == "built";
    Json(ReadyResponse {
        status: if ready { "ready" } else { "not_ready" }.to_string(),
        index,
    })
}
