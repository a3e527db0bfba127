//! Inference backends for dualrag
//!
//! This crate provides the two interchangeable implementations of the
//! `GenerationBackend` and `EmbeddingBackend` traits: an OpenAI-compatible
//! cloud client and a local Ollama client.

pub mod config;
mod http;
mod ollama;
mod openai;


pub use config::{OllamaConfig, OpenAiConfig};
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;

// Re-export core types for convenience
pub use dualrag_core::{
    BackendKind, EmbeddingBackend, Error, GenerationBackend, GenerationConfig, GenerationResult,
    Result,
};
