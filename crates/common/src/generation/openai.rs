//! OpenAI chat completions client

use super::{GenerationRequest, Generator};
use crate::config::GenerationConfig;
use crate::embeddings::require_api_key;
use crate::errors::Result;
use crate::http::{build_client, send_json, RemoteFailure};
use crate::metrics;
use crate::retry::{with_retry, RetryPolicy};
use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI chat completions client
pub struct OpenAIGenerator {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_output_tokens: Option<u32>,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: Vec<ContentPart>,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
    refusal: Option<String>,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig, model: &str, retry: RetryPolicy) -> Result<Self> {
        let api_key = require_api_key(&config.api_key, "openai")?;
        let client = build_client(Duration::from_secs(config.timeout_secs))?;

        Ok(Self {
            client,
            api_key,
            model: model.to_string(),
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

    fn build_body(&self, request: &GenerationRequest) -> ChatRequest<'_> {
        let mut content = Vec::with_capacity(2);
        if !request.prompt.is_empty() {
            content.push(ContentPart::Text {
                text: request.prompt.clone(),
            });
        }
        if let Some(image) = &request.image {
            let encoded = base64::engine::general_purpose::STANDARD.encode(&image.data);
            content.push(ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:{};base64,{}", image.mime_type, encoded),
                },
            });
        }

        ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content,
            }],
            temperature: self.temperature,
            max_tokens: self.max_output_tokens,
        }
    }

    async fn call_once(&self, body: &ChatRequest<'_>) -> Result<String> {
        let builder = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body);

        let response: ChatResponse = send_json(builder)
            .await
            .map_err(RemoteFailure::into_generation)?;

        extract_text(response).map_err(RemoteFailure::into_generation)
    }
}

fn extract_text(response: ChatResponse) -> std::result::Result<String, RemoteFailure> {
    let message = response
        .choices
        .into_iter()
        .next()
        .map(|c| c.message)
        .ok_or_else(|| RemoteFailure::malformed("Response contained no choices"))?;

    match (message.content, message.refusal) {
        (Some(content), _) => Ok(content),
        (None, Some(refusal)) => Err(RemoteFailure {
            kind: crate::errors::RemoteErrorKind::Rejected,
            message: format!("Model refused: {}", refusal),
        }),
        (None, None) => Err(RemoteFailure::malformed("Choice had no content")),
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let body = self.build_body(request);
        let start = Instant::now();
        let result = with_retry(&self.retry, "openai.chat", || self.call_once(&body)).await;
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
    use crate::errors::RemoteErrorKind;
    use crate::generation::ImagePayload;

    fn generator() -> OpenAIGenerator {
        let config = GenerationConfig {
            provider: "openai".to_string(),
            api_key: Some("sk-test".to_string()),
            max_output_tokens: Some(256),
            ..GenerationConfig::default()
        };
        OpenAIGenerator::new(&config, "gpt-4o-mini", RetryPolicy::none()).unwrap()
    }

    #[test]
    fn test_image_is_sent_as_data_url() {
        let image = ImagePayload {
            mime_type: "image/png".to_string(),
            data: vec![1, 2, 3],
        };
        let generator = generator();
        let body = generator.build_body(&GenerationRequest::with_image("What is this?", image));
        let json = serde_json::to_value(&body).unwrap();

        let content = &json["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[1]["type"], "image_url");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,AQID");
        assert_eq!(json["max_tokens"], 256);
    }

    #[test]
    fn test_extract_first_choice() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"Paris."}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_text(parsed).unwrap(), "Paris.");
    }

    #[test]
    fn test_refusal_is_rejected() {
        let raw = r#"{"choices":[{"message":{"content":null,"refusal":"no"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(extract_text(parsed).unwrap_err().kind, RemoteErrorKind::Rejected);
    }
}
