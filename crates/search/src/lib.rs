//! DocQA Search Library
//!
//! In-memory vector index with nearest-neighbour queries, its on-disk
//! format, and the store that builds and loads it under per-location locks.

pub mod index;
pub mod store;

pub use index::{EmbeddingRecord, ScoredChunk, VectorIndex};
pub use store::{IndexStats, IndexStore};
