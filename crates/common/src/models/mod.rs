//! Domain models shared across the pipeline stages
//!
//! Documents flow into the extractor, chunks flow out of the chunker and into
//! the vector index.

mod chunk;
mod document;

pub use chunk::Chunk;
pub use document::{Document, DocumentFailure};

use serde::{Deserialize, Serialize};

/// Similarity metric used by a vector index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    /// Cosine similarity, in [-1, 1]
    #[default]
    Cosine,
    /// Euclidean distance mapped to 1 / (1 + d), in (0, 1]
    L2,
}

impl SimilarityMetric {
    /// Stable on-disk tag
    pub fn tag(self) -> u8 {
        match self {
            SimilarityMetric::Cosine => 1,
            SimilarityMetric::L2 => 2,
        }
    }

    /// Inverse of [`SimilarityMetric::tag`]
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(SimilarityMetric::Cosine),
            2 => Some(SimilarityMetric::L2),
            _ => None,
        }
    }

    /// Score two vectors of equal length; higher means more similar
    pub fn score(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            SimilarityMetric::Cosine => {
                let mut dot = 0.0f32;
                let mut norm_a = 0.0f32;
                let mut norm_b = 0.0f32;
                for (x, y) in a.iter().zip(b) {
                    dot += x * y;
                    norm_a += x * x;
                    norm_b += y * y;
                }
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 0.0;
                }
                dot / (norm_a.sqrt() * norm_b.sqrt())
            }
            SimilarityMetric::L2 => {
                let distance = a
                    .iter()
                    .zip(b)
                    .map(|(x, y)| (x - y) * (x - y))
                    .sum::<f32>()
                    .sqrt();
                1.0 / (1.0 + distance)
            }
        }
    }
}

impl std::fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimilarityMetric::Cosine => f.write_str("cosine"),
            SimilarityMetric::L2 => f.write_str("l2"),
        }
    }
}
