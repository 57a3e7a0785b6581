//! Error types for DocQA services
//!
//! Provides a single error taxonomy with:
//! - Distinct kinds for extraction, remote model services, and the persisted index
//! - Transient/permanent classification for remote failures
//! - HTTP status code mapping and structured error responses

use crate::models::DocumentFailure;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    DimensionMismatch,
    PayloadTooLarge,

    // Document errors (2xxx)
    ExtractionFailure,
    EmptyCorpus,

    // Index errors (4xxx)
    IndexNotFound,
    IndexCorrupt,
    IndexIncompatible,

    // External service errors (8xxx)
    EmbeddingError,
    GenerationError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
}

/// Classification of a failed call to a hosted model API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteErrorKind {
    /// Credentials missing, invalid, or lacking permission
    Auth,
    /// Provider quota or rate limit hit
    RateLimited,
    /// Request exceeded the client timeout
    Timeout,
    /// Connection could not be established or was dropped
    Network,
    /// Provider returned a 5xx
    Server,
    /// Provider refused the request (4xx other than auth/rate-limit)
    Rejected,
    /// Response body did not have the expected shape
    MalformedResponse,
}

impl RemoteErrorKind {
    /// Classify an HTTP status returned by the provider
    pub fn from_status(status: reqwest::StatusCode) -> Self {
        match status.as_u16() {
            401 | 403 => RemoteErrorKind::Auth,
            429 => RemoteErrorKind::RateLimited,
            408 => RemoteErrorKind::Timeout,
            s if s >= 500 => RemoteErrorKind::Server,
            _ => RemoteErrorKind::Rejected,
        }
    }

    /// Classify a transport-level reqwest failure
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            RemoteErrorKind::Timeout
        } else if err.is_decode() {
            RemoteErrorKind::MalformedResponse
        } else if let Some(status) = err.status() {
            Self::from_status(status)
        } else {
            RemoteErrorKind::Network
        }
    }

    /// Whether a retry can reasonably succeed
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            RemoteErrorKind::RateLimited
                | RemoteErrorKind::Timeout
                | RemoteErrorKind::Network
                | RemoteErrorKind::Server
        )
    }
}

impl std::fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RemoteErrorKind::Auth => "auth",
            RemoteErrorKind::RateLimited => "rate_limited",
            RemoteErrorKind::Timeout => "timeout",
            RemoteErrorKind::Network => "network",
            RemoteErrorKind::Server => "server",
            RemoteErrorKind::Rejected => "rejected",
            RemoteErrorKind::MalformedResponse => "malformed_response",
        };
        f.write_str(label)
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Request body too large: {message}")]
    PayloadTooLarge { message: String },

    // Document errors
    #[error("Text extraction failed for {source_id}: {message}")]
    ExtractionFailure { source_id: String, message: String },

    #[error("No indexable text in {} submitted document(s)", failures.len())]
    EmptyCorpus { failures: Vec<DocumentFailure> },

    // Index errors
    #[error("No index found at {path}")]
    IndexNotFound { path: String },

    #[error("Index at {path} is unreadable: {message}")]
    IndexCorrupt { path: String, message: String },

    /// Index built with a different embedding model or dimension
    #[error("Index at {path} is incompatible with the configured embedder: {message}")]
    IndexIncompatible { path: String, message: String },

    // External service errors
    #[error("Embedding service error ({kind}): {message}")]
    EmbeddingService {
        kind: RemoteErrorKind,
        message: String,
    },

    #[error("Generation service error ({kind}): {message}")]
    GenerationService {
        kind: RemoteErrorKind,
        message: String,
    },

    // Internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl AppError {
    /// Shorthand for a validation failure without a field
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: None,
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::DimensionMismatch { .. } => ErrorCode::DimensionMismatch,
            AppError::PayloadTooLarge { .. } => ErrorCode::PayloadTooLarge,
            AppError::ExtractionFailure { .. } => ErrorCode::ExtractionFailure,
            AppError::EmptyCorpus { .. } => ErrorCode::EmptyCorpus,
            AppError::IndexNotFound { .. } => ErrorCode::IndexNotFound,
            AppError::IndexCorrupt { .. } => ErrorCode::IndexCorrupt,
            AppError::IndexIncompatible { .. } => ErrorCode::IndexIncompatible,
            AppError::EmbeddingService { .. } => ErrorCode::EmbeddingError,
            AppError::GenerationService { .. } => ErrorCode::GenerationError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
        }
    }

    /// Remote failure kind, if this error came from a model service
    pub fn remote_kind(&self) -> Option<RemoteErrorKind> {
        match self {
            AppError::EmbeddingService { kind, .. } | AppError::GenerationService { kind, .. } => {
                Some(*kind)
            }
            _ => None,
        }
    }

    /// Whether retrying the failed operation can succeed
    pub fn is_transient(&self) -> bool {
        self.remote_kind().map(RemoteErrorKind::is_transient).unwrap_or(false)
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::DimensionMismatch { .. }
            | AppError::ExtractionFailure { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::IndexNotFound { .. } => StatusCode::NOT_FOUND,

            // 413 Payload Too Large
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,

            // 409 Conflict until the index is rebuilt
            AppError::IndexIncompatible { .. } => StatusCode::CONFLICT,

            // 422 Unprocessable Entity
            AppError::EmptyCorpus { .. } => StatusCode::UNPROCESSABLE_ENTITY,

            // 502/503 depending on whether the upstream may recover
            AppError::EmbeddingService { .. } | AppError::GenerationService { .. } => {
                if self.is_transient() {
                    StatusCode::SERVICE_UNAVAILABLE
                } else {
                    StatusCode::BAD_GATEWAY
                }
            }

            // 500 Internal Server Error
            AppError::IndexCorrupt { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::EmptyCorpus { failures } => Some(serde_json::json!({ "failures": failures })),
            AppError::EmbeddingService { kind, .. } | AppError::GenerationService { kind, .. } => {
                Some(serde_json::json!({ "kind": kind, "transient": kind.is_transient() }))
            }
            _ => None,
        }
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}
