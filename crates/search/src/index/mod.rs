//! In-memory vector index
//!
//! Records keep insertion order; queries scan every record and return the
//! `k` best scores, ties broken by insertion order.

pub mod codec;

use chrono::{DateTime, Utc};
use docqa_common::errors::{AppError, Result};
use docqa_common::models::{Chunk, SimilarityMetric};
use serde::{Deserialize, Serialize};

/// A chunk and its embedding
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingRecord {
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Query hit with similarity score (higher is more similar)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Nearest-neighbour index over embedding records of one dimension
#[derive(Debug, Clone)]
pub struct VectorIndex {
    metric: SimilarityMetric,
    dimension: usize,
    model: String,
    built_at: DateTime<Utc>,
    records: Vec<EmbeddingRecord>,
}

impl VectorIndex {
    /// Create an empty index
    pub fn new(metric: SimilarityMetric, dimension: usize, model: impl Into<String>) -> Self {
        Self {
            metric,
            dimension,
            model: model.into(),
            built_at: Utc::now(),
            records: Vec::new(),
        }
    }

    pub(crate) fn with_built_at(mut self, built_at: DateTime<Utc>) -> Self {
        self.built_at = built_at;
        self
    }

    /// Append a record; its vector must match the index dimension
    pub fn insert(&mut self, record: EmbeddingRecord) -> Result<()> {
        if record.vector.len() != self.dimension {
            return Err(AppError::DimensionMismatch {
                expected: self.dimension,
                actual: record.vector.len(),
            });
        }
        self.records.push(record);
        Ok(())
    }

    /// Return the `k` records most similar to `vector`, best first
    ///
    /// `k` larger than the index returns every record.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        if vector.len() != self.dimension {
            return Err(AppError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = self
            .records
            .iter()
            .enumerate()
            .map(|(i, record)| (i, self.metric.score(vector, &record.vector)))
            .collect();

        // sort_by is stable, so equal scores keep insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        Ok(scored
            .into_iter()
            .map(|(i, score)| ScoredChunk {
                chunk: self.records[i].chunk.clone(),
                score,
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Embedding model the vectors came from
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn records(&self) -> &[EmbeddingRecord] {
        &self.records
    }
}
