//! Retrieval-augmented generation pipeline for dualrag
//!
//! This crate provides chunking, embedding, a persistent vector index,
//! retrieval, prompt assembly, the cloud/local inference gateway and the
//! orchestrator that ties them together.

pub mod chunker;
pub mod context;
pub mod embedder;
pub mod gateway;
pub mod index;
pub mod indexer;
pub mod loader;
pub mod orchestrator;
pub mod retriever;

#[cfg(test)]
mod testing;
#[cfg(test)]
mod tests;

pub use chunker::{chunk, Chunker, ChunkingConfig};
pub use context::{
    assemble, AssembledPrompt, ContextAssembler, DEFAULT_MAX_CONTEXT_TOKENS, MARKER_TOKEN_ALLOWANCE,
};
pub use embedder::{Embedder, DEFAULT_BATCH_SIZE};
pub use gateway::{Generation, InferenceGateway};
pub use index::{IndexEntry, IndexStats, VectorIndex, INDEX_FILE};
pub use indexer::{DocumentIndexer, DocumentOutcome, IndexingReport};
pub use loader::{has_documents, load_documents, SUPPORTED_EXTENSIONS};
pub use orchestrator::Orchestrator;
pub use retriever::{Retriever, DEFAULT_TOP_K};

// Re-export core types for convenience
pub use dualrag_core::{Answer, BackendKind, Error, Result};
