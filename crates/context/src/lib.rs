//! DocQA Context Library
//!
//! Grounded question answering over the persisted index: retrieval,
//! prompt composition and generation, plus the plain chat and image
//! captioning flows.

pub mod prompt;
pub mod service;

pub use prompt::{is_unanswered, PromptComposer};
pub use service::{Answer, DocumentQa};
