//! Google Gemini generation client (`generateContent`)

use super::{GenerationRequest, Generator};
use crate::config::GenerationConfig;
use crate::embeddings::require_api_key;
use crate::errors::{RemoteErrorKind, Result};
use crate::http::{build_client, send_json, RemoteFailure};
use crate::metrics;
use crate::retry::{with_retry, RetryPolicy};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini generation client
pub struct GeminiGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_output_tokens: Option<u32>,
    retry: RetryPolicy,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    generation_config: GenerationSettings,
}

#[derive(Serialize)]
struct RequestContent {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
enum RequestPart {
    #[serde(rename = "text")]
    Text(String),
    InlineData(InlineData),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSettings {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiGenerator {
    /// Create a new Gemini generator for `model`
    pub fn new(config: &GenerationConfig, model: &str, retry: RetryPolicy) -> Result<Self> {
        let api_key = require_api_key(&config.api_key, "gemini")?;
        let client = build_client(Duration::from_secs(config.timeout_secs))?;
        let model = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };

        Ok(Self {
            client,
            api_key,
            model,
            base_url: config
                .api_base
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            retry,
        })
    }

    fn build_body(&self, request: &GenerationRequest) -> GenerateContentRequest {
        let mut parts = Vec::with_capacity(2);
        if !request.prompt.is_empty() {
            parts.push(RequestPart::Text(request.prompt.clone()));
        }
        if let Some(image) = &request.image {
            parts.push(RequestPart::InlineData(InlineData {
                mime_type: image.mime_type.clone(),
                data: base64::engine::general_purpose::STANDARD.encode(&image.data),
            }));
        }

        GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts,
            }],
            generation_config: GenerationSettings {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        }
    }

    async fn call_once(&self, body: &GenerateContentRequest) -> Result<String> {
        let builder = self
            .client
            .post(format!("{}/{}:generateContent", self.base_url, self.model))
            .header("x-goog-api-key", &self.api_key)
            .json(body);

        let response: GenerateContentResponse = send_json(builder)
            .await
            .map_err(RemoteFailure::into_generation)?;

        extract_text(response).map_err(RemoteFailure::into_generation)
    }
}

/// Concatenate the text parts of the first candidate
fn extract_text(response: GenerateContentResponse) -> std::result::Result<String, RemoteFailure> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(RemoteFailure {
                kind: RemoteErrorKind::Rejected,
                message: format!("Prompt blocked: {}", reason),
            });
        }
        return Err(RemoteFailure::malformed("Response contained no candidates"));
    };

    let finish_reason = candidate.finish_reason.unwrap_or_default();
    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    if parts.is_empty() {
        return Err(RemoteFailure::malformed(format!(
            "Candidate had no content (finish reason: {})",
            finish_reason
        )));
    }

    Ok(parts.into_iter().filter_map(|p| p.text).collect::<String>())
}

#[async_trait]
impl Generator for GeminiGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = self.build_body(request);
        let start = Instant::now();
        let result = with_retry(&self.retry, "gemini.generateContent", || self.call_once(&body)).await;
        metrics::record_generation(start.elapsed().as_secs_f64(), &self.model, result.is_ok());
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::ImagePayload;

    fn generator() -> GeminiGenerator {
        let config = GenerationConfig {
            api_key: Some("test-key".to_string()),
            ..GenerationConfig::default()
        };
        GeminiGenerator::new(&config, "gemini-1.5-flash", RetryPolicy::none()).unwrap()
    }

    #[test]
    fn test_body_with_image() {
        let image = ImagePayload {
            mime_type: "image/jpeg".to_string(),
            data: vec![1, 2, 3],
        };
        let body = generator().build_body(&GenerationRequest::with_image("Describe", image));
        let json = serde_json::to_value(&body).unwrap();

        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "Describe");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[1]["inlineData"]["data"], "AQID");
        assert!((json["generationConfig"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
        assert!(json["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[test]
    fn test_image_only_body_has_single_part() {
        let image = ImagePayload {
            mime_type: "image/png".to_string(),
            data: vec![0],
        };
        let body = generator().build_body(&GenerationRequest::with_image("", image));
        assert_eq!(body.contents[0].parts.len(), 1);
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"Paris"},{"text":" is the capital."}]},"finishReason":"STOP"}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_text(parsed).unwrap(), "Paris is the capital.");
    }

    #[test]
    fn test_blocked_prompt_is_rejected() {
        let raw = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        let failure = extract_text(parsed).unwrap_err();
        assert_eq!(failure.kind, RemoteErrorKind::Rejected);
    }

    #[test]
    fn test_missing_candidates_is_malformed() {
        let parsed: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        let failure = extract_text(parsed).unwrap_err();
        assert_eq!(failure.kind, RemoteErrorKind::MalformedResponse);
    }
}
