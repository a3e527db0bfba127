//! Local backend: Ollama HTTP API
//!
//! Chat replies are requested as a stream of newline-delimited JSON objects and
//! folded into one `GenerationResult` before returning, so the caller sees the
//! same shape as from the cloud backend.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use dualrag_core::{
    BackendDescriptor, BackendKind, EmbeddingBackend, Error, GenerationBackend, GenerationConfig,
    GenerationResult, Result, Vector,
};

use crate::config::OllamaConfig;
use crate::http::{build_client, endpoint, status_error, transport_error};

/// Client for a local Ollama server
pub struct OllamaClient {
    config: OllamaConfig,
    client: Client,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    options: ChatOptions,
}

/// One line of the streamed chat reply
#[derive(Deserialize)]
struct StreamLine {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<StreamMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct StreamMessage {
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vector>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Accumulated state of a streamed reply
#[derive(Debug, Default)]
struct StreamedReply {
    text: String,
    model: Option<String>,
    done: bool,
}

fn rejected(message: impl Into<String>) -> Error {
    Error::BackendRejected {
        backend: BackendKind::Local,
        status: None,
        message: message.into(),
    }
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| body.trim().to_string())
}

impl StreamedReply {
    /// Fold one NDJSON line into the reply. Blank lines are ignored.
    fn accumulate_line(&mut self, line: &str) -> Result<()> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(());
        }

        let parsed: StreamLine = serde_json::from_str(line)
            .map_err(|e| Error::Serialization(format!("malformed stream line '{}': {}", line, e)))?;

        if let Some(error) = parsed.error {
            return Err(rejected(error));
        }
        if let Some(message) = parsed.message {
            self.text.push_str(&message.content);
        }
        if self.model.is_none() {
            self.model = parsed.model;
        }
        self.done |= parsed.done;
        Ok(())
    }

    /// A stream cut off before its `done` line is a transport failure, so the
    /// partial text is never returned as an answer.
    fn finish(self, fallback_model: &str) -> Result<GenerationResult> {
        if !self.done {
            return Err(Error::Transport(format!(
                "local stream from {} ended before done ({} bytes received)",
                fallback_model,
                self.text.len()
            )));
        }
        let text = self.text.trim().to_string();
        if text.is_empty() {
            return Err(rejected("empty response"));
        }
        Ok(GenerationResult {
            text,
            model_id: self.model.unwrap_or_else(|| fallback_model.to_string()),
        })
    }
}

impl OllamaClient {
    /// Create a new client from configuration
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = build_client(config.timeout)?;
        Ok(Self { config, client })
    }

    /// Create a new client from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(OllamaConfig::from_env()?)
    }

    pub fn config(&self) -> &OllamaConfig {
        &self.config
    }

    async fn post_json<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let url = endpoint(&self.config.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(BackendKind::Local, status, error_message(&body)))
    }
}

#[async_trait]
impl GenerationBackend for OllamaClient {
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
            stream: true,
            options: ChatOptions {
                temperature: config.temperature,
                num_predict: config.max_output_tokens,
            },
        };

        tracing::debug!(model = %self.config.chat_model, prompt_len = prompt.len(), "local chat request");
        let response = self.post_json("api/chat", &request).await?;

        let mut reply = StreamedReply::default();
        let mut pending: Vec<u8> = Vec::new();
        let mut stream = response.bytes_stream();

        while let Some(bytes) = stream.next().await {
            pending.extend_from_slice(&bytes.map_err(transport_error)?);

            while let Some(newline) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=newline).collect();
                reply.accumulate_line(&String::from_utf8_lossy(&line))?;
            }
        }
        reply.accumulate_line(&String::from_utf8_lossy(&pending))?;

        if !reply.done {
            tracing::warn!(model = %self.config.chat_model, "local stream ended without a done marker");
        }
        reply.finish(&self.config.chat_model)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Local
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
impl EmbeddingBackend for OllamaClient {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.config.embedding_model,
            input: texts,
        };

        tracing::debug!(model = %self.config.embedding_model, batch = texts.len(), "local embedding request");
        let response: EmbedResponse = self
            .post_json("api/embed", &request)
            .await?
            .json()
            .await
            .map_err(transport_error)?;

        if response.embeddings.len() != texts.len() {
            return Err(rejected(format!(
                "requested {} embeddings but received {}",
                texts.len(),
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn model_id(&self) -> &str {
        &self.config.embedding_model
    }
}
