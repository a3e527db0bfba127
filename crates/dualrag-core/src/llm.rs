//! Generation backend trait and types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{BackendDescriptor, BackendKind, Result};

pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant that answers questions based on provided context.";

/// Logical generation parameters, honored by every backend regardless of transport
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub system_prompt: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_output_tokens: 500,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

/// Normalized result of a text generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub text: String,
    pub model_id: String,
}

/// Trait for text generation backends (e.g., OpenAI, Ollama)
///
/// Implementations translate their own wire envelopes and error shapes into
/// `GenerationResult` / `Error`; callers never see backend-specific payloads.
/// Implementations perform exactly one attempt per call: timeouts and retries
/// are applied by the caller.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Generate a reply to `prompt` using `config`
    async fn generate_with_config(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResult>;

    /// Which class of backend this is
    fn kind(&self) -> BackendKind;

    /// Endpoint, model and timeout of this backend
    fn descriptor(&self) -> BackendDescriptor;

    /// Get the model ID being used
    fn model_id(&self) -> &str;
}
