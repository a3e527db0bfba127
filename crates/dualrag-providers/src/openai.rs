//! Cloud backend: OpenAI-compatible chat completion and embedding API

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use dualrag_core::{
    BackendDescriptor, BackendKind, EmbeddingBackend, Error, GenerationBackend, GenerationConfig,
    GenerationResult, Result, Vector,
};

use crate::config::OpenAiConfig;
use crate::http::{build_client, endpoint, status_error, transport_error};

/// Client for an OpenAI-compatible HTTP API
pub struct OpenAiClient {
    config: OpenAiConfig,
    client: Client,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vector,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl OpenAiClient {
    /// Create a new client from configuration
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = build_client(config.timeout)?;
        Ok(Self { config, client })
    }

    /// Create a new client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAiConfig::from_env()?)
    }

    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let url = endpoint(&self.config.base_url, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(ref key) = self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(BackendKind::Cloud, status, error_message(&body)))
    }
}

/// Pull the human-readable message out of an OpenAI error envelope.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| envelope.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

fn rejected(message: impl Into<String>) -> Error {
    Error::BackendRejected {
        backend: BackendKind::Cloud,
        status: None,
        message: message.into(),
    }
}

/// Map a chat completion envelope to the generated text
fn normalize_chat_response(response: ChatResponse) -> Result<String> {
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| rejected("response contained no message content"))?;

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(rejected("empty response"));
    }
    Ok(text)
}

/// Map an embedding envelope to vectors in input order
fn normalize_embedding_response(response: EmbeddingResponse, expected: usize) -> Result<Vec<Vector>> {
    let mut data = response.data;
    if data.len() != expected {
        return Err(rejected(format!(
            "requested {} embeddings but received {}",
            expected,
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

#[async_trait]
impl GenerationBackend for OpenAiClient {
    async fn generate_with_config(
        &self,
        prompt: &str,
        config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        let request = ChatRequest {
            model: &self.config.chat_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &config.system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: config.temperature,
            max_tokens: config.max_output_tokens,
        };

        tracing::debug!(model = %self.config.chat_model, prompt_len = prompt.len(), "cloud chat request");
        let response: ChatResponse = self
            .post_json("chat/completions", &request)
            .await?
            .json()
            .await
            .map_err(transport_error)?;

        let model_id = response
            .model
            .clone()
            .unwrap_or_else(|| self.config.chat_model.clone());
        let text = normalize_chat_response(response)?;

        Ok(GenerationResult { text, model_id })
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Cloud
    }

    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            endpoint: self.config.base_url.clone(),
            model: self.config.chat_model.clone(),
            timeout: self.config.timeout,
        }
    }

    fn model_id(&self) -> &str {
        &self.config.chat_model
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.config.embedding_model,
            input: texts,
        };

        tracing::debug!(model = %self.config.embedding_model, batch = texts.len(), "cloud embedding request");
        let response: EmbeddingResponse = self
            .post_json("embeddings", &request)
            .await?
            .json()
            .await
            .map_err(transport_error)?;

        normalize_embedding_response(response, texts.len())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Cloud
    }

    fn model_id(&self) -> &str {
        &self.config.embedding_model
    }
}
