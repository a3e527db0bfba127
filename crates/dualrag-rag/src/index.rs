//! Persistent vector index
//!
//! Entries are keyed by `(source, sequence_index)` and searched by cosine
//! similarity. State lives in an immutable snapshot behind a read-write lock:
//! readers clone the `Arc` and search without blocking writers, writers
//! serialize on a mutex, build the next snapshot, persist it, and only then
//! swap it in. Staged writes swap in without persisting and are written out
//! together by `flush()`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;

use dualrag_core::{
    Chunk, ChunkKey, EmbeddingSpec, Error, Result, RetrievalResult, ScoredChunk, Vector,
};

pub const INDEX_FILE: &str = "index.json";
const FORMAT_VERSION: u32 = 1;

/// A chunk and its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub vector: Vector,
}

impl IndexEntry {
    pub fn new(chunk: Chunk, vector: Vector) -> Self {
        Self { chunk, vector }
    }
}

/// Summary of index contents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub entries: usize,
    pub sources: usize,
    pub model: String,
    pub dimension: usize,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Snapshot {
    spec: EmbeddingSpec,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    fingerprints: BTreeMap<String, String>,
    entries: BTreeMap<ChunkKey, IndexEntry>,
}

impl Snapshot {
    fn empty(spec: EmbeddingSpec) -> Self {
        let now = Utc::now();
        Self {
            spec,
            created_at: now,
            updated_at: now,
            fingerprints: BTreeMap::new(),
            entries: BTreeMap::new(),
        }
    }
}

/// On-disk layout of `index.json`
#[derive(Serialize, Deserialize)]
struct IndexFile {
    format_version: u32,
    spec: EmbeddingSpec,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(default)]
    fingerprints: BTreeMap<String, String>,
    #[serde(default)]
    entries: Vec<IndexEntry>,
}

#[derive(Deserialize)]
struct IndexHeader {
    format_version: u32,
    spec: EmbeddingSpec,
}

impl From<&Snapshot> for IndexFile {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            spec: snapshot.spec.clone(),
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            fingerprints: snapshot.fingerprints.clone(),
            entries: snapshot.entries.values().cloned().collect(),
        }
    }
}

impl From<IndexFile> for Snapshot {
    fn from(file: IndexFile) -> Self {
        Self {
            spec: file.spec,
            created_at: file.created_at,
            updated_at: file.updated_at,
            fingerprints: file.fingerprints,
            entries: file
                .entries
                .into_iter()
                .map(|entry| (entry.chunk.key(), entry))
                .collect(),
        }
    }
}

/// Persistent nearest-neighbor index over chunk embeddings
#[derive(Debug)]
pub struct VectorIndex {
    /// `None` for a purely in-memory index
    dir: Option<PathBuf>,
    state: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
    /// Visible state is ahead of `index.json`
    unsaved: AtomicBool,
}

impl VectorIndex {
    /// Create an index that is never persisted
    pub fn in_memory(spec: EmbeddingSpec) -> Self {
        Self::from_snapshot(None, Snapshot::empty(spec))
    }

    /// Open the index stored in `dir`, creating it if absent.
    ///
    /// A stored index built with a different embedding dimension or model is
    /// rejected rather than mixed with new vectors.
    pub async fn open(dir: impl AsRef<Path>, spec: EmbeddingSpec) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(INDEX_FILE);

        if !tokio::fs::try_exists(&path).await? {
            tracing::info!(path = %path.display(), "creating new index");
            return Self::create(dir, spec).await;
        }

        let raw = tokio::fs::read_to_string(&path).await?;
        let file: IndexFile = serde_json::from_str(&raw)
            .map_err(|e| Error::Serialization(format!("{}: {}", path.display(), e)))?;
        check_compatible(file.format_version, &file.spec, &spec)?;

        let snapshot = Snapshot::from(file);
        tracing::info!(
            path = %path.display(),
            entries = snapshot.entries.len(),
            model = %snapshot.spec.model,
            dimension = snapshot.spec.dimension,
            "opened index"
        );
        Ok(Self::from_snapshot(Some(dir), snapshot))
    }

    /// Open the index in `dir`, discarding whatever was stored there
    pub async fn open_fresh(dir: impl AsRef<Path>, spec: EmbeddingSpec) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        tracing::info!(path = %dir.display(), "clearing index");
        Self::create(dir, spec).await
    }

    /// Read the embedding spec of a persisted index without loading it
    pub async fn stored_spec(dir: impl AsRef<Path>) -> Result<Option<EmbeddingSpec>> {
        let path = dir.as_ref().join(INDEX_FILE);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        let raw = tokio::fs::read_to_string(&path).await?;
        let header: IndexHeader = serde_json::from_str(&raw)
            .map_err(|e| Error::Serialization(format!("{}: {}", path.display(), e)))?;
        if header.format_version != FORMAT_VERSION {
            return Err(unsupported_version(header.format_version));
        }
        Ok(Some(header.spec))
    }

    async fn create(dir: PathBuf, spec: EmbeddingSpec) -> Result<Self> {
        let snapshot = Snapshot::empty(spec);
        persist(&dir, &snapshot).await?;
        Ok(Self::from_snapshot(Some(dir), snapshot))
    }

    fn from_snapshot(dir: Option<PathBuf>, snapshot: Snapshot) -> Self {
        Self {
            dir,
            state: RwLock::new(Arc::new(snapshot)),
            writer: Mutex::new(()),
            unsaved: AtomicBool::new(false),
        }
    }

    fn snapshot(&self) -> Result<Arc<Snapshot>> {
        self.state
            .read()
            .map(|guard| Arc::clone(&*guard))
            .map_err(|e| Error::Index(format!("Lock error: {}", e)))
    }

    /// Make `next` the visible state, persisting it first when `durable`.
    /// Callers hold the writer lock.
    async fn commit(&self, mut next: Snapshot, durable: bool) -> Result<()> {
        next.updated_at = Utc::now();
        if let Some(ref dir) = self.dir {
            if durable {
                persist(dir, &next).await?;
            }
        }
        let mut state = self
            .state
            .write()
            .map_err(|e| Error::Index(format!("Lock error: {}", e)))?;
        *state = Arc::new(next);
        self.unsaved
            .store(!durable && self.dir.is_some(), Ordering::SeqCst);
        Ok(())
    }

    fn check_vectors(&self, snapshot: &Snapshot, entries: &[IndexEntry]) -> Result<()> {
        let expected = snapshot.spec.dimension;
        match entries.iter().find(|e| e.vector.len() != expected) {
            Some(bad) => Err(Error::EmbeddingDimensionMismatch {
                expected,
                actual: bad.vector.len(),
            }),
            None => Ok(()),
        }
    }

    /// Insert entries; an existing entry with the same key is replaced.
    ///
    /// If any vector has the wrong dimension nothing is applied.
    pub async fn insert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let _guard = self.writer.lock().await;
        let current = self.snapshot()?;
        self.check_vectors(&current, &entries)?;

        let mut next = (*current).clone();
        for entry in entries {
            next.entries.insert(entry.chunk.key(), entry);
        }
        self.commit(next, true).await
    }

    /// Insert the entries of one document and record its content fingerprint
    /// in the same write.
    pub async fn insert_document(
        &self,
        source: &str,
        fingerprint: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<()> {
        self.apply_document(source, fingerprint, entries, true).await
    }

    /// Like `insert_document`, but the change is only visible in memory until
    /// the next `flush()` or durable write.
    pub async fn stage_document(
        &self,
        source: &str,
        fingerprint: &str,
        entries: Vec<IndexEntry>,
    ) -> Result<()> {
        self.apply_document(source, fingerprint, entries, false).await
    }

    /// Write staged changes to disk
    pub async fn flush(&self) -> Result<()> {
        let _guard = self.writer.lock().await;
        if !self.unsaved.load(Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(ref dir) = self.dir {
            let current = self.snapshot()?;
            persist(dir, &current).await?;
            tracing::debug!(entries = current.entries.len(), "flushed index");
        }
        self.unsaved.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub fn has_unsaved_changes(&self) -> bool {
        self.unsaved.load(Ordering::SeqCst)
    }

    async fn apply_document(
        &self,
        source: &str,
        fingerprint: &str,
        entries: Vec<IndexEntry>,
        durable: bool,
    ) -> Result<()> {
        let _guard = self.writer.lock().await;
        let current = self.snapshot()?;
        self.check_vectors(&current, &entries)?;

        let mut next = (*current).clone();
        for entry in entries {
            next.entries.insert(entry.chunk.key(), entry);
        }
        next.fingerprints
            .insert(source.to_string(), fingerprint.to_string());
        self.commit(next, durable).await
    }

    /// Top `k` entries by cosine similarity to `query`, most similar first.
    ///
    /// Equal scores are ordered by `sequence_index`, then by `source`.
    pub fn search(&self, query: &[f32], k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(Error::InvalidConfiguration(
                "k must be at least 1".to_string(),
            ));
        }

        let snapshot = self.snapshot()?;
        if snapshot.entries.is_empty() {
            return Err(Error::EmptyIndex);
        }
        if query.len() != snapshot.spec.dimension {
            return Err(Error::EmbeddingDimensionMismatch {
                expected: snapshot.spec.dimension,
                actual: query.len(),
            });
        }

        let mut hits: Vec<ScoredChunk> = snapshot
            .entries
            .values()
            .map(|entry| ScoredChunk {
                chunk: entry.chunk.clone(),
                score: cosine_similarity(query, &entry.vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.chunk.sequence_index.cmp(&b.chunk.sequence_index))
                .then_with(|| a.chunk.source.cmp(&b.chunk.source))
        });
        hits.truncate(k);

        Ok(RetrievalResult { hits })
    }

    /// Remove every entry and fingerprint
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.writer.lock().await;
        let current = self.snapshot()?;

        let mut next = Snapshot::empty(current.spec.clone());
        next.created_at = current.created_at;
        self.commit(next, true).await
    }

    pub fn len(&self) -> usize {
        self.snapshot().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn spec(&self) -> Result<EmbeddingSpec> {
        Ok(self.snapshot()?.spec.clone())
    }

    /// Fingerprint recorded for `source` when it was last indexed
    pub fn fingerprint(&self, source: &str) -> Option<String> {
        self.snapshot()
            .ok()
            .and_then(|s| s.fingerprints.get(source).cloned())
    }

    pub fn stats(&self) -> Result<IndexStats> {
        let snapshot = self.snapshot()?;
        let sources: BTreeSet<&str> = snapshot
            .entries
            .keys()
            .map(|key| key.source.as_str())
            .collect();

        Ok(IndexStats {
            entries: snapshot.entries.len(),
            sources: sources.len(),
            model: snapshot.spec.model.clone(),
            dimension: snapshot.spec.dimension,
            updated_at: snapshot.updated_at,
        })
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }
}

fn unsupported_version(found: u32) -> Error {
    Error::Index(format!(
        "unsupported index format version {} (expected {})",
        found, FORMAT_VERSION
    ))
}

fn check_compatible(version: u32, stored: &EmbeddingSpec, configured: &EmbeddingSpec) -> Result<()> {
    if version != FORMAT_VERSION {
        return Err(unsupported_version(version));
    }
    if stored.dimension != configured.dimension {
        return Err(Error::DimensionMismatch {
            stored: stored.dimension,
            configured: configured.dimension,
        });
    }
    if stored.model != configured.model {
        return Err(Error::EmbeddingModelMismatch {
            stored: stored.model.clone(),
            configured: configured.model.clone(),
        });
    }
    Ok(())
}

/// Write the snapshot to a temporary file beside `index.json` and rename it
/// into place.
async fn persist(dir: &Path, snapshot: &Snapshot) -> Result<()> {
    let bytes = serde_json::to_vec(&IndexFile::from(snapshot))
        .map_err(|e| Error::Serialization(e.to_string()))?;
    let dir = dir.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(dir.join(INDEX_FILE)).map_err(|e| e.error)?;
        Ok(())
    })
    .await
    .map_err(|e| Error::Index(format!("persist task failed: {}", e)))?
}

/// Cosine similarity; zero when either vector has zero length
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(dimension: usize) -> EmbeddingSpec {
        EmbeddingSpec {
            model: "all-minilm".to_string(),
            dimension,
        }
    }

    fn entry(source: &str, sequence_index: usize, text: &str, vector: Vector) -> IndexEntry {
        IndexEntry::new(
            Chunk {
                text: text.to_string(),
                source: source.to_string(),
                sequence_index,
                start_offset: 0,
                end_offset: text.len(),
            },
            vector,
        )
    }

    #[tokio::test]
    async fn test_reinsert_replaces_text() {
        let index = VectorIndex::in_memory(spec(2));
        index
            .insert(vec![entry("a.md", 0, "old text", vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .insert(vec![entry("a.md", 0, "new text", vec![1.0, 0.0])])
            .await
            .unwrap();

        assert_eq!(index.len(), 1);
        let result = index.search(&[1.0, 0.0], 5).unwrap();
        assert_eq!(result.hits[0].chunk.text, "new text");
    }

    #[tokio::test]
    async fn test_fewer_entries_than_k() {
        let index = VectorIndex::in_memory(spec(2));
        index
            .insert(vec![
                entry("a.md", 0, "east", vec![1.0, 0.0]),
                entry("a.md", 1, "north", vec![0.0, 1.0]),
                entry("a.md", 2, "north-east", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let result = index.search(&[1.0, 0.1], 10).unwrap();
        assert_eq!(result.len(), 3);
        let scores: Vec<f32> = result.iter().map(|h| h.score).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(result.hits[0].chunk.text, "east");
    }

    #[tokio::test]
    async fn test_ties_break_on_sequence_then_source() {
        let index = VectorIndex::in_memory(spec(2));
        index
            .insert(vec![
                entry("b.md", 1, "b1", vec![1.0, 1.0]),
                entry("a.md", 4, "a4", vec![1.0, 1.0]),
                entry("a.md", 1, "a1", vec![1.0, 1.0]),
            ])
            .await
            .unwrap();

        let order: Vec<String> = index
            .search(&[1.0, 1.0], 3)
            .unwrap()
            .chunks()
            .map(|c| c.text.clone())
            .collect();
        assert_eq!(order, vec!["a1", "b1", "a4"]);
    }

    #[tokio::test]
    async fn test_search_errors() {
        let index = VectorIndex::in_memory(spec(2));
        assert!(matches!(index.search(&[1.0, 0.0], 3), Err(Error::EmptyIndex)));

        index
            .insert(vec![entry("a.md", 0, "x", vec![1.0, 0.0])])
            .await
            .unwrap();
        assert!(matches!(
            index.search(&[1.0, 0.0], 0),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 1),
            Err(Error::EmbeddingDimensionMismatch { expected: 2, actual: 3 })
        ));
    }

    #[tokio::test]
    async fn test_wrong_dimension_insert_applies_nothing() {
        let index = VectorIndex::in_memory(spec(2));
        let err = index
            .insert(vec![
                entry("a.md", 0, "ok", vec![1.0, 0.0]),
                entry("a.md", 1, "bad", vec![1.0, 0.0, 0.0]),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmbeddingDimensionMismatch { .. }));
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        {
            let index = VectorIndex::open(dir.path(), spec(2)).await.unwrap();
            index
                .insert_document(
                    "guide.md",
                    "abc123",
                    vec![entry("guide.md", 0, "Ollama installs with curl", vec![1.0, 0.0])],
                )
                .await
                .unwrap();
        }

        let reopened = VectorIndex::open(dir.path(), spec(2)).await.unwrap();
        assert_eq!(reopened.len(), 1);
        assert_eq!(reopened.fingerprint("guide.md").as_deref(), Some("abc123"));
        let hit = &reopened.search(&[1.0, 0.0], 1).unwrap().hits[0];
        assert_eq!(hit.chunk.text, "Ollama installs with curl");

        assert_eq!(
            VectorIndex::stored_spec(dir.path()).await.unwrap(),
            Some(spec(2))
        );
    }

    #[tokio::test]
    async fn test_reopen_with_other_embedding_fails() {
        let dir = tempfile::tempdir().unwrap();
        VectorIndex::open(dir.path(), spec(384)).await.unwrap();

        let err = VectorIndex::open(dir.path(), spec(768)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::DimensionMismatch { stored: 384, configured: 768 }
        ));

        let other_model = EmbeddingSpec {
            model: "nomic-embed-text".to_string(),
            dimension: 384,
        };
        let err = VectorIndex::open(dir.path(), other_model.clone()).await.unwrap_err();
        assert!(matches!(err, Error::EmbeddingModelMismatch { .. }));

        let fresh = VectorIndex::open_fresh(dir.path(), other_model.clone()).await.unwrap();
        assert!(fresh.is_empty());
        assert_eq!(VectorIndex::stored_spec(dir.path()).await.unwrap(), Some(other_model));
    }

    #[tokio::test]
    async fn test_clear_persists_empty_state() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(dir.path(), spec(2)).await.unwrap();
        index
            .insert_document("a.md", "f", vec![entry("a.md", 0, "x", vec![0.0, 1.0])])
            .await
            .unwrap();
        index.clear().await.unwrap();
        assert!(index.is_empty());
        assert_eq!(index.fingerprint("a.md"), None);

        let reopened = VectorIndex::open(dir.path(), spec(2)).await.unwrap();
        assert!(reopened.is_empty());
    }

    #[tokio::test]
    async fn test_readers_keep_their_snapshot() {
        let index = VectorIndex::in_memory(spec(2));
        index
            .insert(vec![entry("a.md", 0, "first", vec![1.0, 0.0])])
            .await
            .unwrap();

        let before = index.snapshot().unwrap();
        index
            .insert(vec![entry("a.md", 1, "second", vec![0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(before.entries.len(), 1);
        assert_eq!(index.len(), 2);
    }

    #[tokio::test]
    async fn test_staged_documents_persist_on_flush() {
        let dir = tempfile::tempdir().unwrap();
        let index = VectorIndex::open(dir.path(), spec(2)).await.unwrap();
        index
            .stage_document("a.md", "fa", vec![entry("a.md", 0, "a", vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .stage_document("b.md", "fb", vec![entry("b.md", 0, "b", vec![0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(index.len(), 2);
        assert!(index.has_unsaved_changes());
        assert!(VectorIndex::open(dir.path(), spec(2)).await.unwrap().is_empty());

        index.flush().await.unwrap();
        assert!(!index.has_unsaved_changes());
        let reopened = VectorIndex::open(dir.path(), spec(2)).await.unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.fingerprint("b.md").as_deref(), Some("fb"));
    }

    #[tokio::test]
    async fn test_staging_in_memory_index_has_nothing_to_flush() {
        let index = VectorIndex::in_memory(spec(2));
        index
            .stage_document("a.md", "fa", vec![entry("a.md", 0, "a", vec![1.0, 0.0])])
            .await
            .unwrap();
        assert!(!index.has_unsaved_changes());
        index.flush().await.unwrap();
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_insert_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let index = Arc::new(VectorIndex::open(dir.path(), spec(2)).await.unwrap());
        let entries = || {
            (0..3)
                .map(|i| entry("a.md", i, "x", vec![1.0, i as f32]))
                .collect::<Vec<_>>()
        };

        for _ in 0..5 {
            index.clear().await.unwrap();
            let task = {
                let index = Arc::clone(&index);
                let entries = entries();
                tokio::spawn(async move { index.insert(entries).await })
            };
            tokio::task::yield_now().await;
            task.abort();
            let _ = task.await;

            let visible = index.search(&[1.0, 0.0], 10).map(|r| r.len()).unwrap_or(0);
            assert!(visible == 0 || visible == 3, "saw {visible} entries");
        }

        index.insert(entries()).await.unwrap();
        assert_eq!(index.search(&[1.0, 0.0], 10).unwrap().len(), 3);
    }

    #[test]
    fn test_cosine_similarity() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
