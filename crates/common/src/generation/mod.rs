//! Generative model abstraction
//!
//! A [`Generator`] takes a prompt, optionally with an inline image, and
//! returns the model's text verbatim. Remote failures surface as
//! [`AppError::GenerationService`], never as empty answers.

mod gemini;
mod openai;

pub use gemini::GeminiGenerator;
pub use openai::OpenAIGenerator;

use crate::config::GenerationConfig;
use crate::errors::{AppError, Result};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use std::sync::Arc;

/// Phrase a grounded answer must consist of when the context lacks the answer
pub const UNANSWERED: &str = "Answer is not available in the context.";

/// Section headings of a grounded prompt
pub const CONTEXT_HEADING: &str = "Context:";
pub const QUESTION_HEADING: &str = "Question:";
pub const ANSWER_HEADING: &str = "Answer:";

/// Inline image sent alongside a prompt
#[derive(Clone)]
pub struct ImagePayload {
    /// e.g. `image/png`
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl std::fmt::Debug for ImagePayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImagePayload")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// One generation call
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub image: Option<ImagePayload>,
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            image: None,
        }
    }

    pub fn with_image(prompt: impl Into<String>, image: ImagePayload) -> Self {
        Self {
            prompt: prompt.into(),
            image: Some(image),
        }
    }
}

/// Trait for text generation
#[async_trait]
pub trait Generator: Send + Sync {
    /// Generate text for the request
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Deterministic generator for testing
///
/// For grounded prompts it answers with the context sentence sharing the most
/// keywords with the question, or [`UNANSWERED`] when nothing matches.
pub struct MockGenerator;

const STOPWORDS: &[&str] = &[
    "what", "which", "where", "when", "does", "that", "this", "with", "from", "have", "about",
    "there", "their", "whom", "whose", "into", "tell",
];

impl MockGenerator {
    fn keywords(question: &str) -> Vec<String> {
        question
            .split(|c: char| !c.is_alphanumeric())
            .map(str::to_lowercase)
            .filter(|w| w.chars().count() >= 4 && !STOPWORDS.contains(&w.as_str()))
            .collect()
    }

    fn split_grounded(prompt: &str) -> Option<(&str, &str)> {
        let context_start = prompt.find(CONTEXT_HEADING)? + CONTEXT_HEADING.len();
        let question_at = prompt.rfind(QUESTION_HEADING)?;
        let question_start = question_at + QUESTION_HEADING.len();
        let question_end = prompt[question_start..]
            .find(ANSWER_HEADING)
            .map(|i| question_start + i)
            .unwrap_or(prompt.len());
        if question_at < context_start {
            return None;
        }
        Some((
            &prompt[context_start..question_at],
            prompt[question_start..question_end].trim(),
        ))
    }

    fn extract_answer(context: &str, question: &str) -> String {
        let keywords = Self::keywords(question);
        let mut best: Option<(usize, &str)> = None;

        for sentence in context.split(['.', '!', '?', '\n']) {
            let sentence = sentence.trim();
            if sentence.is_empty() {
                continue;
            }
            let words: Vec<String> = sentence
                .split(|c: char| !c.is_alphanumeric())
                .map(str::to_lowercase)
                .collect();
            let hits = keywords.iter().filter(|k| words.contains(k)).count();
            if hits > 0 && best.map_or(true, |(top, _)| hits > top) {
                best = Some((hits, sentence));
            }
        }

        match best {
            Some((_, sentence)) => format!("{}.", sentence),
            None => UNANSWERED.to_string(),
        }
    }
}

#[async_trait]
impl Generator for MockGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        if let Some(image) = &request.image {
            let mut caption = format!(
                "An uploaded {} image ({} bytes).",
                image.mime_type,
                image.data.len()
            );
            if !request.prompt.trim().is_empty() {
                caption.push_str(&format!(" Prompt: {}", request.prompt.trim()));
            }
            return Ok(caption);
        }

        Ok(match Self::split_grounded(&request.prompt) {
            Some((context, question)) => Self::extract_answer(context, question),
            None => format!("Mock response: {}", request.prompt.trim()),
        })
    }

    fn model_name(&self) -> &str {
        "mock-generation"
    }
}

/// Create a generator for `model` based on configuration
pub fn create_generator(
    config: &GenerationConfig,
    model: &str,
    retry: RetryPolicy,
) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiGenerator::new(config, model, retry)?)),
        "openai" => Ok(Arc::new(OpenAIGenerator::new(config, model, retry)?)),
        "mock" => Ok(Arc::new(MockGenerator)),
        other => Err(AppError::Configuration {
            message: format!("Unknown generation provider '{}'", other),
        }),
    }
}
