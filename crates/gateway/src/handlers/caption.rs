//! Image captioning handler

use super::multipart_error;
use crate::AppState;
use axum::extract::{Multipart, State};
use axum::Json;
use docqa_common::errors::{AppError, Result};
use docqa_common::generation::ImagePayload;
use serde::Serialize;

#[derive(Serialize)]
pub struct CaptionResponse {
    pub answer: String,
}

/// Describe an uploaded image (`image` field, optional `prompt` field)
pub async fn caption(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<CaptionResponse>> {
    let mut image = None;
    let mut prompt = String::new();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let mime_type = image_mime_type(field.content_type(), field.file_name());
                let data = field.bytes().await.map_err(multipart_error)?.to_vec();
                image = Some(ImagePayload { mime_type, data });
            }
            "prompt" => {
                prompt = field.text().await.map_err(multipart_error)?;
            }
            _ => {}
        }
    }

    let image = image.ok_or_else(|| AppError::Validation {
        message: "An image file is required".to_string(),
        field: Some("image".to_string()),
    })?;

    let answer = state.qa.caption(image, &prompt).await?;
    Ok(Json(CaptionResponse { answer }))
}

/// Declared type when it names an image, otherwise guessed from the file name
fn image_mime_type(content_type: Option<&str>, file_name: Option<&str>) -> String {
    match content_type {
        Some(declared) if declared.starts_with("image/") => declared.to_string(),
        declared => file_name
            .and_then(mime_from_extension)
            .or_else(|| declared.map(str::to_string))
            .unwrap_or_else(|| "application/octet-stream".to_string()),
    }
}

fn mime_from_extension(file_name: &str) -> Option<String> {
    let extension = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    let mime = match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => return None,
    };
    Some(mime.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(mime_from_extension("cat.JPG").as_deref(), Some("image/jpeg"));
        assert_eq!(mime_from_extension("diagram.png").as_deref(), Some("image/png"));
        assert_eq!(mime_from_extension("notes.txt"), None);
        assert_eq!(mime_from_extension("noextension"), None);
    }

    #[test]
    fn test_generic_content_type_falls_back_to_extension() {
        assert_eq!(image_mime_type(Some("image/webp"), Some("cat.png")), "image/webp");
        assert_eq!(
            image_mime_type(Some("application/octet-stream"), Some("cat.png")),
            "image/png"
        );
        assert_eq!(image_mime_type(None, Some("cat.jpeg")), "image/jpeg");
        assert_eq!(
            image_mime_type(Some("application/octet-stream"), Some("notes.txt")),
            "application/octet-stream"
        );
        assert_eq!(image_mime_type(None, None), "application/octet-stream");
    }
}
