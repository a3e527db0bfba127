//! Batched, retried embedding with dimension tracking

use std::sync::{Arc, OnceLock};

use dualrag_core::{EmbeddingBackend, EmbeddingSpec, Error, Result, RetryPolicy, Vector};

pub const DEFAULT_BATCH_SIZE: usize = 64;

const PROBE_TEXT: &str = "dimension probe";

/// Maps texts to vectors through an embedding backend.
///
/// The first vector seen fixes the dimension; any later vector of another
/// dimension is an `EmbeddingDimensionMismatch`.
pub struct Embedder {
    backend: Arc<dyn EmbeddingBackend>,
    retry: RetryPolicy,
    batch_size: usize,
    dimension: OnceLock<usize>,
}

impl Embedder {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, retry: RetryPolicy) -> Self {
        Self {
            backend,
            retry,
            batch_size: DEFAULT_BATCH_SIZE,
            dimension: OnceLock::new(),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Fix the expected dimension up front, e.g. from a persisted index.
    ///
    /// Fails if a different dimension has already been observed.
    pub fn with_dimension(self, dimension: usize) -> Result<Self> {
        let expected = *self.dimension.get_or_init(|| dimension);
        if expected != dimension {
            return Err(Error::EmbeddingDimensionMismatch {
                expected,
                actual: dimension,
            });
        }
        Ok(self)
    }

    pub fn model_id(&self) -> &str {
        self.backend.model_id()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    /// Model and dimension, once the dimension is known
    pub fn spec(&self) -> Option<EmbeddingSpec> {
        self.dimension().map(|dimension| EmbeddingSpec {
            model: self.backend.model_id().to_string(),
            dimension,
        })
    }

    /// Embed texts in input order, one vector per text
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vector>> {
        let kind = self.backend.kind();
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let embedded = self
                .retry
                .run(kind, "embed", || self.backend.embed_batch(batch))
                .await?;

            if embedded.len() != batch.len() {
                return Err(Error::BackendRejected {
                    backend: kind,
                    status: None,
                    message: format!(
                        "requested {} embeddings but received {}",
                        batch.len(),
                        embedded.len()
                    ),
                });
            }

            for vector in embedded {
                self.check_dimension(&vector)?;
                vectors.push(vector);
            }
        }

        tracing::debug!(count = vectors.len(), model = %self.backend.model_id(), "embedded texts");
        Ok(vectors)
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vector> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| Error::BackendRejected {
            backend: self.backend.kind(),
            status: None,
            message: "no embedding returned".to_string(),
        })
    }

    /// Embed a fixed string once to discover the backend's dimension
    pub async fn probe(&self) -> Result<EmbeddingSpec> {
        let vector = self.embed_one(PROBE_TEXT).await?;
        Ok(EmbeddingSpec {
            model: self.backend.model_id().to_string(),
            dimension: vector.len(),
        })
    }

    fn check_dimension(&self, vector: &Vector) -> Result<()> {
        if vector.is_empty() {
            return Err(Error::BackendRejected {
                backend: self.backend.kind(),
                status: None,
                message: "empty embedding vector".to_string(),
            });
        }

        let expected = *self.dimension.get_or_init(|| vector.len());
        if vector.len() != expected {
            return Err(Error::EmbeddingDimensionMismatch {
                expected,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}
