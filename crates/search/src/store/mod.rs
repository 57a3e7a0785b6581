//! Persisted index storage
//!
//! `build` holds the location's write lock while embedding and persisting, so
//! at most one build per location runs at a time and readers never observe a
//! half-written index. Files are written to a temporary sibling and renamed
//! into place.

mod lock;

use crate::index::{codec, EmbeddingRecord, VectorIndex};
use docqa_common::config::IndexConfig;
use docqa_common::embeddings::Embedder;
use docqa_common::errors::{AppError, Result};
use docqa_common::metrics;
use docqa_common::models::{Chunk, SimilarityMetric};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

/// Summary of the persisted index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexStats {
    pub chunks: usize,
    pub dimension: usize,
    pub model: String,
}

/// Builds, persists and loads the index at one location
#[derive(Debug, Clone)]
pub struct IndexStore {
    path: PathBuf,
    metric: SimilarityMetric,
}

impl IndexStore {
    pub fn new(path: impl Into<PathBuf>, metric: SimilarityMetric) -> Self {
        Self {
            path: path.into(),
            metric,
        }
    }

    pub fn from_config(config: &IndexConfig) -> Self {
        Self::new(config.path.clone(), config.metric)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Embed every chunk and replace the persisted index with the result
    ///
    /// Fails without touching the previous index when `chunks` is empty or
    /// any embedding call fails.
    #[instrument(skip(self, chunks, embedder), fields(path = %self.path.display(), chunks = chunks.len()))]
    pub async fn build(&self, chunks: Vec<Chunk>, embedder: &dyn Embedder) -> Result<VectorIndex> {
        if chunks.is_empty() {
            return Err(AppError::EmptyCorpus { failures: Vec::new() });
        }

        let start = Instant::now();
        let lock = lock::lock_for(&self.path);
        let _guard = lock.write().await;

        let result = self.build_locked(chunks, embedder).await;
        let chunk_count = result.as_ref().map(VectorIndex::len).unwrap_or(0);
        metrics::record_build(start.elapsed().as_secs_f64(), chunk_count, result.is_ok());
        result
    }

    async fn build_locked(&self, chunks: Vec<Chunk>, embedder: &dyn Embedder) -> Result<VectorIndex> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(AppError::Internal {
                message: format!(
                    "Embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    chunks.len()
                ),
            });
        }

        let mut index = VectorIndex::new(self.metric, embedder.dimension(), embedder.model_name());
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            index.insert(EmbeddingRecord { chunk, vector })?;
        }

        self.persist(&index).await?;
        info!(
            records = index.len(),
            dimension = index.dimension(),
            model = index.model(),
            "Index built"
        );
        Ok(index)
    }

    async fn persist(&self, index: &VectorIndex) -> Result<()> {
        let bytes = codec::encode(index).map_err(|e| AppError::Internal {
            message: format!("Failed to encode index: {}", e),
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        // removed on any early return, including a dropped build future
        let tmp = TempFile::new(self.temp_path());
        write_synced(tmp.path(), &bytes).await?;
        tokio::fs::rename(tmp.path(), &self.path).await?;
        tmp.keep();

        debug!(bytes = bytes.len(), "Index persisted");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "index".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
    }

    /// Load the persisted index
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self) -> Result<VectorIndex> {
        let lock = lock::lock_for(&self.path);
        let _guard = lock.read().await;

        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AppError::IndexNotFound {
                    path: self.path.display().to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        let index = codec::decode(&bytes).map_err(|e| AppError::IndexCorrupt {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;

        debug!(records = index.len(), "Index loaded");
        Ok(index)
    }

    /// Load the persisted index and check it was built by `embedder`
    ///
    /// Vectors from another model live in an unrelated space, so an index
    /// whose model or dimension differs is rejected rather than queried.
    pub async fn load_for(&self, embedder: &dyn Embedder) -> Result<VectorIndex> {
        let index = self.load().await?;
        if index.model() != embedder.model_name() || index.dimension() != embedder.dimension() {
            return Err(AppError::IndexIncompatible {
                path: self.path.display().to_string(),
                message: format!(
                    "built with {} ({} dimensions), configured embedder is {} ({} dimensions)",
                    index.model(),
                    index.dimension(),
                    embedder.model_name(),
                    embedder.dimension()
                ),
            });
        }
        Ok(index)
    }

    /// Size and model of the persisted index, `None` when absent
    pub async fn stats(&self) -> Result<Option<IndexStats>> {
        match self.load().await {
            Ok(index) => Ok(Some(IndexStats {
                chunks: index.len(),
                dimension: index.dimension(),
                model: index.model().to_string(),
            })),
            Err(AppError::IndexNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Temporary file deleted on drop unless kept
struct TempFile {
    path: PathBuf,
    keep: bool,
}

impl TempFile {
    fn new(path: PathBuf) -> Self {
        Self { path, keep: false }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    /// The file was renamed into place; nothing to clean up
    fn keep(mut self) {
        self.keep = true;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.keep {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_common::embeddings::MockEmbedder;

    /// Same vectors as the mock, reported under another model name
    struct RenamedEmbedder(MockEmbedder);

    #[async_trait::async_trait]
    impl Embedder for RenamedEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.0.embed(text).await
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.0.embed_batch(texts).await
        }

        fn model_name(&self) -> &str {
            "text-embedding-004"
        }

        fn dimension(&self) -> usize {
            self.0.dimension()
        }
    }

    fn chunks(source: &str, texts: &[&str]) -> Vec<Chunk> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| Chunk {
                source_id: source.to_string(),
                chunk_index: i as u32,
                start_offset: i * 100,
                text: text.to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_load_matches_built_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("nested/index.dqix"), SimilarityMetric::Cosine);
        let embedder = MockEmbedder::new(32);

        let built = store
            .build(
                chunks("a.pdf", &["rust ownership rules", "tokio async runtime", "paris france capital"]),
                &embedder,
            )
            .await
            .unwrap();
        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.records(), built.records());

        let query = embedder.embed("capital of france").await.unwrap();
        let expected = built.query(&query, 2).unwrap();
        let actual = loaded.query(&query, 2).unwrap();
        assert_eq!(expected.len(), actual.len());
        for (e, a) in expected.iter().zip(&actual) {
            assert_eq!(e.chunk, a.chunk);
            assert_eq!(e.score, a.score);
        }
        assert_eq!(actual[0].chunk.text, "paris france capital");
    }

    #[tokio::test]
    async fn test_missing_index_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("absent.dqix"), SimilarityMetric::Cosine);

        assert!(matches!(store.load().await, Err(AppError::IndexNotFound { .. })));
        assert_eq!(store.stats().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_garbage_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.dqix");
        std::fs::write(&path, b"definitely not an index").unwrap();

        let store = IndexStore::new(&path, SimilarityMetric::Cosine);
        assert!(matches!(store.load().await, Err(AppError::IndexCorrupt { .. })));
    }

    #[tokio::test]
    async fn test_rebuild_replaces_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("index.dqix"), SimilarityMetric::L2);
        let embedder = MockEmbedder::new(16);

        store.build(chunks("old.pdf", &["one", "two", "three"]), &embedder).await.unwrap();
        store.build(chunks("new.pdf", &["four"]), &embedder).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.records()[0].chunk.source_id, "new.pdf");
        assert_eq!(loaded.metric(), SimilarityMetric::L2);
    }

    #[tokio::test]
    async fn test_empty_build_keeps_previous_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("index.dqix"), SimilarityMetric::Cosine);
        let embedder = MockEmbedder::new(8);

        store.build(chunks("keep.pdf", &["kept"]), &embedder).await.unwrap();
        let err = store.build(Vec::new(), &embedder).await.unwrap_err();
        assert!(matches!(err, AppError::EmptyCorpus { .. }));

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.records()[0].chunk.text, "kept");
    }

    #[tokio::test]
    async fn test_index_from_another_embedder_is_incompatible() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path().join("index.dqix"), SimilarityMetric::Cosine);
        store.build(chunks("a.pdf", &["kept"]), &MockEmbedder::new(16)).await.unwrap();

        assert_eq!(store.load_for(&MockEmbedder::new(16)).await.unwrap().len(), 1);
        assert!(matches!(
            store.load_for(&MockEmbedder::new(32)).await,
            Err(AppError::IndexIncompatible { .. })
        ));
        assert!(matches!(
            store.load_for(&RenamedEmbedder(MockEmbedder::new(16))).await,
            Err(AppError::IndexIncompatible { .. })
        ));
    }

    #[tokio::test]
    async fn test_temp_file_removed_unless_kept() {
        let dir = tempfile::tempdir().unwrap();
        let dropped = dir.path().join(".index.a.tmp");
        let kept = dir.path().join(".index.b.tmp");

        {
            let tmp = TempFile::new(dropped.clone());
            write_synced(tmp.path(), b"partial").await.unwrap();
        }
        assert!(!dropped.exists());

        let tmp = TempFile::new(kept.clone());
        write_synced(tmp.path(), b"complete").await.unwrap();
        tmp.keep();
        assert!(kept.exists());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_builds_leave_one_complete_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.dqix");
        let embedder = std::sync::Arc::new(MockEmbedder::new(24));

        let first: Vec<&str> = vec!["alpha"; 40];
        let second: Vec<&str> = vec!["beta"; 7];

        let mut handles = Vec::new();
        for (source, texts) in [("first.pdf", first), ("second.pdf", second)] {
            let store = IndexStore::new(&path, SimilarityMetric::Cosine);
            let embedder = embedder.clone();
            let batch = chunks(source, &texts);
            handles.push(tokio::spawn(async move {
                store.build(batch, &*embedder).await.map(|_| ())
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let loaded = IndexStore::new(&path, SimilarityMetric::Cosine).load().await.unwrap();
        let source = &loaded.records()[0].chunk.source_id;
        assert!(loaded.records().iter().all(|r| &r.chunk.source_id == source));
        let expected = if source == "first.pdf" { 40 } else { 7 };
        assert_eq!(loaded.len(), expected);

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
