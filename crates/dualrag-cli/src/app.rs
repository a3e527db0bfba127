//! Pipeline assembly at startup

use std::path::{Path, PathBuf};
use std::sync::Arc;

use dualrag_core::{BackendKind, EmbeddingBackend, EmbeddingSpec, Result};
use dualrag_providers::{OllamaClient, OpenAiClient};
use dualrag_rag::{
    load_documents, Chunker, ContextAssembler, DocumentIndexer, Embedder, IndexingReport,
    InferenceGateway, Orchestrator, Retriever, VectorIndex,
};

use crate::config::AppConfig;
use crate::samples;

/// Options that come from the command line rather than the environment
#[derive(Debug, Clone)]
pub struct StartupOptions {
    pub docs_dir: PathBuf,
    /// Discard the stored index and embed every document again
    pub reindex: bool,
    /// Write the sample corpus into `docs_dir` when it has no documents
    pub create_samples: bool,
}

/// A ready-to-query pipeline
pub struct App {
    pub config: AppConfig,
    pub orchestrator: Orchestrator,
    pub index: Arc<VectorIndex>,
    pub embedding: EmbeddingSpec,
    pub report: IndexingReport,
    pub docs_dir: PathBuf,
}

impl App {
    /// Build clients, open the index, index the document directory and wire
    /// up the orchestrator.
    pub async fn build(config: AppConfig, options: &StartupOptions) -> Result<Self> {
        let openai = Arc::new(OpenAiClient::new(config.openai.clone())?);
        let ollama = Arc::new(OllamaClient::new(config.ollama.clone())?);

        let embedding_backend: Arc<dyn EmbeddingBackend> = match config.embedding_backend {
            BackendKind::Cloud => openai.clone(),
            BackendKind::Local => ollama.clone(),
        };
        let embedder = Embedder::new(embedding_backend, config.embed_retry_policy());
        let embedding = resolve_embedding_spec(&embedder, &config.index_dir).await?;
        let embedder = Arc::new(embedder.with_dimension(embedding.dimension)?);

        let index = if options.reindex {
            VectorIndex::open_fresh(&config.index_dir, embedding.clone()).await?
        } else {
            VectorIndex::open(&config.index_dir, embedding.clone()).await?
        };
        let index = Arc::new(index);

        if options.create_samples && samples::ensure_documents(&options.docs_dir)? {
            tracing::info!(dir = %options.docs_dir.display(), "document directory was empty, wrote samples");
        }
        let documents = load_documents(&options.docs_dir)?;
        let indexer = DocumentIndexer::new(Chunker::new(config.chunking)?, embedder.clone(), index.clone());
        let report = indexer.index_documents(&documents).await?;

        if config.llm_backend == BackendKind::Cloud && !config.openai.has_api_key() {
            tracing::warn!("cloud backend selected but OPENAI_API_KEY is not set");
        }
        let gateway = InferenceGateway::new(
            openai,
            ollama,
            config.llm_backend,
            config.generation.clone(),
            config.retry_policy(),
        )?;

        let orchestrator = Orchestrator::new(
            Retriever::new(embedder, index.clone()),
            ContextAssembler::new(config.max_context_tokens),
            Arc::new(gateway),
        )
        .with_top_k(config.top_k);

        Ok(Self {
            config,
            orchestrator,
            index,
            embedding,
            report,
            docs_dir: options.docs_dir.clone(),
        })
    }
}

/// Discover the embedding dimension by probing the backend.
///
/// When the backend cannot be reached but a stored index was built with the
/// same model, its recorded spec is used so the index stays searchable.
async fn resolve_embedding_spec(embedder: &Embedder, index_dir: &Path) -> Result<EmbeddingSpec> {
    match embedder.probe().await {
        Ok(spec) => {
            tracing::debug!(model = %spec.model, dimension = spec.dimension, "probed embedding backend");
            Ok(spec)
        }
        Err(e) => match VectorIndex::stored_spec(index_dir).await? {
            Some(stored) if stored.model == embedder.model_id() => {
                tracing::warn!(error = %e, "embedding probe failed, using stored index dimension");
                Ok(stored)
            }
            _ => Err(e),
        },
    }
}
