//! Query answering: retrieve, assemble, generate

use std::sync::Arc;

use dualrag_core::{Answer, Error, Result};

use crate::context::ContextAssembler;
use crate::gateway::InferenceGateway;
use crate::retriever::{Retriever, DEFAULT_TOP_K};

/// Top-level entry point for answering questions against the index
pub struct Orchestrator {
    retriever: Retriever,
    assembler: ContextAssembler,
    gateway: Arc<InferenceGateway>,
    top_k: usize,
}

impl Orchestrator {
    pub fn new(retriever: Retriever, assembler: ContextAssembler, gateway: Arc<InferenceGateway>) -> Self {
        Self {
            retriever,
            assembler,
            gateway,
            top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn gateway(&self) -> &Arc<InferenceGateway> {
        &self.gateway
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub async fn answer(&self, query: &str) -> Result<Answer> {
        self.answer_with_k(query, self.top_k).await
    }

    /// Answer `query` using the `k` most similar chunks.
    ///
    /// Every failure is reported as `AnswerFailed` wrapping its cause.
    pub async fn answer_with_k(&self, query: &str, k: usize) -> Result<Answer> {
        self.try_answer(query, k).await.map_err(|cause| {
            tracing::warn!(error = %cause, "query failed");
            Error::AnswerFailed {
                cause: Box::new(cause),
            }
        })
    }

    async fn try_answer(&self, query: &str, k: usize) -> Result<Answer> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::InvalidConfiguration(
                "query must not be empty".to_string(),
            ));
        }

        let retrieval = self.retriever.retrieve(query, k).await?;
        let assembled = self.assembler.assemble_with_grounding(query, &retrieval);
        let generation = self.gateway.generate_detailed(&assembled.prompt).await?;

        tracing::info!(
            backend = %generation.backend,
            model = %generation.model,
            retrieved = retrieval.len(),
            grounding = assembled.included.len(),
            "answered query"
        );

        Ok(Answer {
            text: generation.text,
            grounding_chunks: assembled.included,
            backend_used: generation.backend,
            model: generation.model,
            prompt: assembled.prompt,
        })
    }
}
