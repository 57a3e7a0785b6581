//! Chunk model

use serde::{Deserialize, Serialize};

/// Ordered text segment cut from one source document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Identifier of the document the chunk came from (file name for uploads)
    pub source_id: String,

    /// Position of this chunk within its document, starting at 0
    pub chunk_index: u32,

    /// Character offset of the first char in the document text
    pub start_offset: usize,

    pub text: String,
}
