//! JSON-over-HTTP plumbing shared by the hosted model clients

use crate::errors::{AppError, RemoteErrorKind, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Error body excerpt kept in messages
const MAX_ERROR_BODY: usize = 512;

/// A failed remote call, before it is attributed to a service
#[derive(Debug)]
pub(crate) struct RemoteFailure {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteFailure {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::MalformedResponse,
            message: message.into(),
        }
    }

    pub fn into_embedding(self) -> AppError {
        AppError::EmbeddingService {
            kind: self.kind,
            message: self.message,
        }
    }

    pub fn into_generation(self) -> AppError {
        AppError::GenerationService {
            kind: self.kind,
            message: self.message,
        }
    }
}

/// HTTP client with the per-service timeout applied to every request
pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::Internal {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// Send a request and decode a JSON success body
pub(crate) async fn send_json<R: DeserializeOwned>(
    request: reqwest::RequestBuilder,
) -> std::result::Result<R, RemoteFailure> {
    let response = request.send().await.map_err(|e| RemoteFailure {
        kind: RemoteErrorKind::from_reqwest(&e),
        message: format!("Request failed: {}", e),
    })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let excerpt: String = body.chars().take(MAX_ERROR_BODY).collect();
        return Err(RemoteFailure {
            kind: RemoteErrorKind::from_status(status),
            message: format!("API error {}: {}", status, excerpt),
        });
    }

    let bytes = response.bytes().await.map_err(|e| RemoteFailure {
        kind: RemoteErrorKind::from_reqwest(&e),
        message: format!("Failed to read response body: {}", e),
    })?;

    serde_json::from_slice(&bytes)
        .map_err(|e| RemoteFailure::malformed(format!("Failed to parse response: {}", e)))
}
