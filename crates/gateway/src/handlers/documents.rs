//! Document upload handler

use super::multipart_error;
use crate::AppState;
use axum::extract::{Multipart, State};
use axum::Json;
use docqa_common::errors::{AppError, Result};
use docqa_common::models::Document;
use docqa_ingestion::BuildReport;
use tracing::info;

/// Replace the index with one built from the uploaded PDFs
///
/// Every file field is treated as a document; the field's file name becomes
/// its source id.
pub async fn upload_documents(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<BuildReport>> {
    let mut documents = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let position = documents.len() + 1;
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let source_id = if file_name.trim().is_empty() {
            format!("document-{}", position)
        } else {
            file_name
        };
        let bytes = field.bytes().await.map_err(multipart_error)?;
        documents.push(Document::new(source_id, bytes.to_vec()));
    }

    if documents.is_empty() {
        return Err(AppError::Validation {
            message: "Upload at least one PDF file".to_string(),
            field: Some("files".to_string()),
        });
    }

    info!(documents = documents.len(), "Documents uploaded");
    let report = state.qa.build_from_documents(documents).await?;
    Ok(Json(report))
}
