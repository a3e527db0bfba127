//! Common types used across the dualrag system

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::Error;

/// Embedding vector. Every vector stored in one index shares one dimension.
pub type Vector = Vec<f32>;

/// Raw document text plus the identifier of where it came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub source: String,
}

impl Document {
    pub fn new(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: source.into(),
        }
    }
}

/// A token-bounded slice of one document.
///
/// `start_offset`/`end_offset` are byte offsets into the document text and
/// `text` is exactly that slice.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub source: String,
    pub sequence_index: usize,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl Chunk {
    pub fn key(&self) -> ChunkKey {
        ChunkKey {
            source: self.source.clone(),
            sequence_index: self.sequence_index,
        }
    }
}

/// Identity of a chunk: `(source, sequence_index)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    pub source: String,
    pub sequence_index: usize,
}

/// A retrieved chunk and its similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Chunks ranked for one query, most similar first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoredChunk> {
        self.hits.iter()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.hits.iter().map(|hit| &hit.chunk)
    }
}

/// Model and dimension of the embedding backend an index was built with
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingSpec {
    pub model: String,
    pub dimension: usize,
}

/// Which class of inference backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Network-hosted provider
    Cloud,
    /// Provider running on this machine
    Local,
}

impl BackendKind {
    pub fn toggled(self) -> Self {
        match self {
            BackendKind::Cloud => BackendKind::Local,
            BackendKind::Local => BackendKind::Cloud,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Cloud => "cloud",
            BackendKind::Local => "local",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cloud" | "openai" => Ok(BackendKind::Cloud),
            "local" | "ollama" => Ok(BackendKind::Local),
            other => Err(Error::InvalidConfiguration(format!(
                "unknown backend '{}': expected 'cloud' or 'local'",
                other
            ))),
        }
    }
}

/// Where a backend lives and how long a call to it may take
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendDescriptor {
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
}

/// An inference backend together with its settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InferenceBackend {
    Cloud(BackendDescriptor),
    Local(BackendDescriptor),
}

impl InferenceBackend {
    pub fn new(kind: BackendKind, descriptor: BackendDescriptor) -> Self {
        match kind {
            BackendKind::Cloud => InferenceBackend::Cloud(descriptor),
            BackendKind::Local => InferenceBackend::Local(descriptor),
        }
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            InferenceBackend::Cloud(_) => BackendKind::Cloud,
            InferenceBackend::Local(_) => BackendKind::Local,
        }
    }

    pub fn descriptor(&self) -> &BackendDescriptor {
        match self {
            InferenceBackend::Cloud(descriptor) | InferenceBackend::Local(descriptor) => descriptor,
        }
    }
}

impl fmt::Display for InferenceBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let descriptor = self.descriptor();
        write!(f, "{} ({} @ {})", self.kind(), descriptor.model, descriptor.endpoint)
    }
}

/// A grounded answer to one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub grounding_chunks: Vec<Chunk>,
    pub backend_used: BackendKind,
    pub model: String,
    pub prompt: String,
}

impl Answer {
    pub fn is_grounded(&self) -> bool {
        !self.grounding_chunks.is_empty()
    }
}
