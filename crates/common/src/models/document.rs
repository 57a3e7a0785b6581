//! Submitted documents and per-document failures

use serde::{Deserialize, Serialize};

/// Raw document bytes plus the identifier used in chunks and reports
#[derive(Clone)]
pub struct Document {
    pub source_id: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(source_id: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            source_id: source_id.into(),
            bytes,
        }
    }
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("source_id", &self.source_id)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A document that contributed nothing to a build, and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFailure {
    pub source_id: String,
    pub reason: String,
}
