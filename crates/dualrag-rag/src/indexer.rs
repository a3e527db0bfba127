//! Document ingestion: chunk, embed, insert

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use dualrag_core::{Document, Result};

use crate::chunker::Chunker;
use crate::embedder::Embedder;
use crate::index::{IndexEntry, VectorIndex};

/// Outcome of indexing a batch of documents
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexingReport {
    pub documents_indexed: usize,
    pub documents_unchanged: usize,
    pub documents_failed: usize,
    pub chunks_indexed: usize,
    pub errors: Vec<String>,
}

/// What happened to a single document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentOutcome {
    Indexed { chunks: usize },
    Unchanged,
}

/// Feeds documents through the chunker and embedder into the index
pub struct DocumentIndexer {
    chunker: Chunker,
    embedder: Arc<Embedder>,
    index: Arc<VectorIndex>,
}

impl DocumentIndexer {
    pub fn new(chunker: Chunker, embedder: Arc<Embedder>, index: Arc<VectorIndex>) -> Self {
        Self {
            chunker,
            embedder,
            index,
        }
    }

    /// Content fingerprint covering everything that determines the entries
    pub fn fingerprint(&self, document: &Document) -> String {
        let config = self.chunker.config();
        let key = format!(
            "{}:{}:{}\n{}",
            config.chunk_size,
            config.chunk_overlap,
            self.embedder.model_id(),
            document.text
        );
        format!("{:x}", md5::compute(key.as_bytes()))
    }

    /// Index one document unless it is already indexed with identical content
    pub async fn index_document(&self, document: &Document) -> Result<DocumentOutcome> {
        self.ingest(document, true).await
    }

    async fn ingest(&self, document: &Document, durable: bool) -> Result<DocumentOutcome> {
        let fingerprint = self.fingerprint(document);
        if self.index.fingerprint(&document.source).as_deref() == Some(fingerprint.as_str()) {
            tracing::debug!(source = %document.source, "unchanged, skipping");
            return Ok(DocumentOutcome::Unchanged);
        }

        let chunks = self.chunker.chunk(document);
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed(&texts).await?;

        let entries: Vec<IndexEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry::new(chunk, vector))
            .collect();
        let count = entries.len();

        if durable {
            self.index
                .insert_document(&document.source, &fingerprint, entries)
                .await?;
        } else {
            self.index
                .stage_document(&document.source, &fingerprint, entries)
                .await?;
        }
        tracing::info!(source = %document.source, chunks = count, "indexed document");

        Ok(DocumentOutcome::Indexed { chunks: count })
    }

    /// Index a batch of documents.
    ///
    /// Backend failures on one document are recorded and the rest continue;
    /// errors that make the index unusable abort the batch. The index file is
    /// written once, after the last document.
    pub async fn index_documents(&self, documents: &[Document]) -> Result<IndexingReport> {
        let result = self.ingest_all(documents).await;
        self.index.flush().await?;
        result
    }

    async fn ingest_all(&self, documents: &[Document]) -> Result<IndexingReport> {
        let mut report = IndexingReport::default();

        for document in documents {
            match self.ingest(document, false).await {
                Ok(DocumentOutcome::Indexed { chunks }) => {
                    report.documents_indexed += 1;
                    report.chunks_indexed += chunks;
                }
                Ok(DocumentOutcome::Unchanged) => report.documents_unchanged += 1,
                Err(e) if e.requires_reindex() => return Err(e),
                Err(e) => {
                    tracing::warn!(source = %document.source, error = %e, "failed to index document");
                    report.documents_failed += 1;
                    report
                        .errors
                        .push(format!("Failed to index {}: {}", document.source, e));
                }
            }
        }

        Ok(report)
    }
}
