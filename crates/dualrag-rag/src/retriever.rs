//! Top-k retrieval for a query string

use std::sync::Arc;

use dualrag_core::{Error, Result, RetrievalResult};

use crate::embedder::Embedder;
use crate::index::VectorIndex;

pub const DEFAULT_TOP_K: usize = 3;

/// Embeds queries and looks up their nearest chunks
pub struct Retriever {
    embedder: Arc<Embedder>,
    index: Arc<VectorIndex>,
}

impl Retriever {
    pub fn new(embedder: Arc<Embedder>, index: Arc<VectorIndex>) -> Self {
        Self { embedder, index }
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Retrieve the `k` chunks most similar to `query`.
    ///
    /// An empty index yields an empty result without calling the embedder.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(Error::InvalidConfiguration(
                "k must be at least 1".to_string(),
            ));
        }
        if self.index.is_empty() {
            tracing::debug!("index is empty, skipping retrieval");
            return Ok(RetrievalResult::empty());
        }

        let query_vector = self.embedder.embed_one(query).await?;
        match self.index.search(&query_vector, k) {
            Ok(result) => {
                tracing::debug!(hits = result.len(), k, "retrieved chunks");
                Ok(result)
            }
            // cleared between the emptiness check and the search
            Err(Error::EmptyIndex) => Ok(RetrievalResult::empty()),
            Err(e) => Err(e),
        }
    }
}
