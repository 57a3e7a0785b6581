//! API handlers module

pub mod caption;
pub mod documents;
pub mod health;
pub mod qa;

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use docqa_common::errors::AppError;

/// Multipart failures are client errors; body limit overruns keep their 413
pub(crate) fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return AppError::PayloadTooLarge {
            message: err.body_text(),
        };
    }
    AppError::Validation {
        message: format!("Invalid multipart body: {}", err.body_text()),
        field: None,
    }
}
