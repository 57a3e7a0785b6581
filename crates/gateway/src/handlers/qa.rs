//! Question answering and chat handlers

use crate::AppState;
use axum::{extract::State, Json};
use docqa_common::errors::{AppError, Result};
use docqa_search::ScoredChunk;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use validator::Validate;

/// Question against the uploaded documents
#[derive(Debug, Deserialize, Validate)]
pub struct AskRequest {
    #[validate(length(min = 1, max = 4000))]
    pub question: String,

    /// Chunks to retrieve (configured default when absent)
    #[validate(range(min = 1, max = 50))]
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub answered: bool,
    pub sources: Vec<SourceItem>,
    pub processing_time_ms: u64,
}

#[derive(Serialize)]
pub struct SourceItem {
    pub source_id: String,
    pub chunk_index: u32,
    pub start_offset: usize,
    pub score: f32,
    pub text: String,
}

impl From<ScoredChunk> for SourceItem {
    fn from(scored: ScoredChunk) -> Self {
        Self {
            source_id: scored.chunk.source_id,
            chunk_index: scored.chunk.chunk_index,
            start_offset: scored.chunk.start_offset,
            score: scored.score,
            text: scored.chunk.text,
        }
    }
}

/// Plain prompt for the text model
#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    #[validate(length(min = 1, max = 16000))]
    pub prompt: String,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub answer: String,
}

fn validate<T: Validate>(request: &T) -> Result<()> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: e.field_errors().keys().next().map(|f| f.to_string()),
    })
}

/// Answer a question from the indexed documents
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>> {
    let start = Instant::now();
    validate(&request)?;

    let answer = state.qa.ask(&request.question, request.k).await?;

    Ok(Json(AskResponse {
        answer: answer.answer,
        answered: answer.answered,
        sources: answer.sources.into_iter().map(SourceItem::from).collect(),
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}

/// Send a prompt straight to the text model
pub async fn chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>> {
    validate(&request)?;
    let answer = state.qa.chat(&request.prompt).await?;
    Ok(Json(ChatResponse { answer }))
}
