//! Core traits and types for dualrag
//!
//! This crate defines the fundamental traits and types shared across the dualrag system.
//! It provides capability-facing interfaces for generation and embedding backends, the
//! error taxonomy, the retry policy used around every external call, and the tokenizer
//! that chunking and prompt budgeting agree on.

pub mod embedding;
pub mod error;
pub mod llm;
pub mod retry;
pub mod tokenizer;
pub mod types;


pub use embedding::EmbeddingBackend;
pub use error::{Error, Result};
pub use llm::{GenerationBackend, GenerationConfig, GenerationResult, DEFAULT_SYSTEM_PROMPT};
pub use retry::RetryPolicy;
pub use tokenizer::{count_tokens, tokenize, Token};
pub use types::*;
