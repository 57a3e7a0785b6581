//! Text chunking module
//!
//! Splits text into overlapping chunks measured in characters. The default
//! window strategy cuts fixed-size windows so consecutive chunks share
//! exactly `chunk_overlap` characters. The semantic strategy delegates to
//! `text-splitter`, which prefers paragraph and sentence boundaries.

use crate::errors::IngestionError;
use docqa_common::config::{ChunkStrategy, ChunkingConfig};
use docqa_common::models::Chunk;
use text_splitter::{ChunkConfig, TextSplitter};
use tracing::debug;

/// A slice of the source text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextSpan {
    /// Character offset of the first char
    pub start: usize,
    pub text: String,
}

/// Configured text splitter
#[derive(Debug, Clone)]
pub struct Chunker {
    strategy: ChunkStrategy,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Chunker {
    /// Fixed-window chunker; requires `chunk_overlap < chunk_size`
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, IngestionError> {
        Self::with_strategy(ChunkStrategy::Window, chunk_size, chunk_overlap)
    }

    pub fn with_strategy(
        strategy: ChunkStrategy,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Result<Self, IngestionError> {
        if chunk_size == 0 {
            return Err(IngestionError::ChunkingError(
                "chunk size must be greater than 0".to_string(),
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(IngestionError::ChunkingError(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                chunk_overlap, chunk_size
            )));
        }
        Ok(Self {
            strategy,
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn from_config(config: &ChunkingConfig) -> Result<Self, IngestionError> {
        Self::with_strategy(config.strategy, config.chunk_size, config.chunk_overlap)
    }

    /// Split `text` into ordered spans
    pub fn split(&self, text: &str) -> Result<Vec<TextSpan>, IngestionError> {
        let spans = match self.strategy {
            ChunkStrategy::Window => self.split_window(text),
            ChunkStrategy::Semantic => self.split_semantic(text)?,
        };

        debug!(
            input_chars = spans.last().map(|s| s.start + s.text.chars().count()).unwrap_or(0),
            chunk_count = spans.len(),
            chunk_size = self.chunk_size,
            "Text chunked"
        );
        Ok(spans)
    }

    /// Chunks of one document, indexed from 0
    pub fn chunk(&self, source_id: &str, text: &str) -> Result<Vec<Chunk>, IngestionError> {
        Ok(self
            .split(text)?
            .into_iter()
            .enumerate()
            .map(|(index, span)| Chunk {
                source_id: source_id.to_string(),
                chunk_index: index as u32,
                start_offset: span.start,
                text: span.text,
            })
            .collect())
    }

    fn split_window(&self, text: &str) -> Vec<TextSpan> {
        // byte offset of every char, plus the end of the text
        let bounds: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = bounds.len() - 1;
        let step = self.chunk_size - self.chunk_overlap;

        let mut spans = Vec::new();
        let mut start = 0;
        while start < total {
            let end = (start + self.chunk_size).min(total);
            spans.push(TextSpan {
                start,
                text: text[bounds[start]..bounds[end]].to_string(),
            });
            if end == total {
                break;
            }
            start += step;
        }
        spans
    }

    fn split_semantic(&self, text: &str) -> Result<Vec<TextSpan>, IngestionError> {
        let config = ChunkConfig::new(self.chunk_size)
            .with_overlap(self.chunk_overlap)
            .map_err(|e| IngestionError::ChunkingError(e.to_string()))?
            .with_trim(false);
        let splitter = TextSplitter::new(config);

        // count chars incrementally from the previous chunk start
        let mut byte_cursor = 0;
        let mut char_cursor = 0;
        let mut spans = Vec::new();
        for (offset, chunk) in splitter.chunk_indices(text) {
            if offset >= byte_cursor {
                char_cursor += text[byte_cursor..offset].chars().count();
            } else {
                char_cursor = text[..offset].chars().count();
            }
            byte_cursor = offset;
            spans.push(TextSpan {
                start: char_cursor,
                text: chunk.to_string(),
            });
        }
        Ok(spans)
    }
}
