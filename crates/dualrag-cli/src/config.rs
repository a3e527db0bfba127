//! Application configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use dualrag_core::{BackendKind, Error, GenerationConfig, Result, RetryPolicy};
use dualrag_providers::config::parse_or;
use dualrag_providers::{OllamaConfig, OpenAiConfig};
use dualrag_rag::{ChunkingConfig, ContextAssembler, DEFAULT_MAX_CONTEXT_TOKENS, DEFAULT_TOP_K};

pub const DEFAULT_INDEX_DIR: &str = "./rag_index";

/// Everything needed to start the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Backend that generates answers at startup
    pub llm_backend: BackendKind,
    /// Backend that embeds chunks and queries; fixed for the life of an index
    pub embedding_backend: BackendKind,
    pub openai: OpenAiConfig,
    pub ollama: OllamaConfig,
    pub index_dir: PathBuf,
    pub chunking: ChunkingConfig,
    pub top_k: usize,
    pub max_context_tokens: usize,
    pub generation: GenerationConfig,
    pub embed_timeout: Duration,
    pub max_retries: u32,
}

impl AppConfig {
    /// Create configuration from `.env` and environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = GenerationConfig::default();

        let config = Self {
            llm_backend: parse_or(lookup, "LLM_PROVIDER", BackendKind::Local)?,
            embedding_backend: parse_or(lookup, "EMBEDDING_PROVIDER", BackendKind::Local)?,
            openai: OpenAiConfig::from_lookup(lookup)?,
            ollama: OllamaConfig::from_lookup(lookup)?,
            index_dir: PathBuf::from(
                lookup("INDEX_DIR")
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_INDEX_DIR.to_string()),
            ),
            chunking: ChunkingConfig {
                chunk_size: parse_or(lookup, "CHUNK_SIZE", 500)?,
                chunk_overlap: parse_or(lookup, "CHUNK_OVERLAP", 50)?,
            },
            top_k: parse_or(lookup, "TOP_K", DEFAULT_TOP_K)?,
            max_context_tokens: parse_or(lookup, "MAX_CONTEXT_TOKENS", DEFAULT_MAX_CONTEXT_TOKENS)?,
            generation: GenerationConfig {
                temperature: parse_or(lookup, "TEMPERATURE", defaults.temperature)?,
                max_output_tokens: parse_or(lookup, "MAX_OUTPUT_TOKENS", defaults.max_output_tokens)?,
                system_prompt: defaults.system_prompt,
            },
            embed_timeout: Duration::from_secs(parse_or(lookup, "EMBED_TIMEOUT_SECS", 30u64)?),
            max_retries: parse_or(lookup, "MAX_RETRIES", 2u32)?,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;

        if self.top_k == 0 {
            return Err(Error::InvalidConfiguration("TOP_K must be at least 1".to_string()));
        }
        let required = ContextAssembler::required_budget(self.top_k, self.chunking.chunk_size);
        if self.max_context_tokens < required {
            return Err(Error::InvalidConfiguration(format!(
                "MAX_CONTEXT_TOKENS is {} but TOP_K={} chunks of CHUNK_SIZE={} need at least {}",
                self.max_context_tokens, self.top_k, self.chunking.chunk_size, required
            )));
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(Error::InvalidConfiguration(format!(
                "TEMPERATURE must be between 0 and 2, got {}",
                self.generation.temperature
            )));
        }
        if self.generation.max_output_tokens == 0 {
            return Err(Error::InvalidConfiguration(
                "MAX_OUTPUT_TOKENS must be at least 1".to_string(),
            ));
        }
        if self.embedding_backend == BackendKind::Cloud && !self.openai.has_api_key() {
            return Err(Error::InvalidConfiguration(
                "EMBEDDING_PROVIDER is cloud but OPENAI_API_KEY is not set".to_string(),
            ));
        }
        Ok(())
    }

    /// Retry policy for generation calls; each backend applies its own timeout
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            ..RetryPolicy::default()
        }
    }

    /// Retry policy for embedding calls
    pub fn embed_retry_policy(&self) -> RetryPolicy {
        self.retry_policy().with_timeout(self.embed_timeout)
    }

    /// Model used by the configured generation backend `kind`
    pub fn chat_model(&self, kind: BackendKind) -> &str {
        match kind {
            BackendKind::Cloud => &self.openai.chat_model,
            BackendKind::Local => &self.ollama.chat_model,
        }
    }
}
