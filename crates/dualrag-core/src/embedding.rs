//! Embedding backend trait

use async_trait::async_trait;

use crate::{BackendKind, Result, Vector};

/// Trait for embedding backends
///
/// One vector is returned per input text, in input order. Like
/// `GenerationBackend`, an implementation performs a single attempt per call.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Embed a batch of texts
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Which class of backend this is
    fn kind(&self) -> BackendKind;

    /// Embedding model identifier
    fn model_id(&self) -> &str;
}
