//! Error types for dualrag

use thiserror::Error;

use crate::types::BackendKind;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for the dualrag system
#[derive(Error, Debug)]
pub enum Error {
    /// Bad startup or call parameters; surfaced before any work begins.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An embedding or generation call failed or timed out after retries.
    #[error("{backend} backend unavailable: {reason}")]
    BackendUnavailable { backend: BackendKind, reason: String },

    /// The backend answered but refused the request (unknown model, bad key, malformed reply).
    #[error("{backend} backend rejected the request: {message}")]
    BackendRejected {
        backend: BackendKind,
        status: Option<u16>,
        message: String,
    },

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    EmbeddingDimensionMismatch { expected: usize, actual: usize },

    #[error(
        "Index dimension mismatch: stored vectors have {stored} dimensions but the configured embedding backend produces {configured}; clear the index and re-index"
    )]
    DimensionMismatch { stored: usize, configured: usize },

    #[error(
        "Index was built with embedding model '{stored}' but '{configured}' is configured; clear the index and re-index"
    )]
    EmbeddingModelMismatch { stored: String, configured: String },

    #[error("Index is empty")]
    EmptyIndex,

    #[error("Index error: {0}")]
    Index(String),

    #[error("Failed to answer query: {cause}")]
    AnswerFailed {
        #[source]
        cause: Box<Error>,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Timeout error: {0}")]
    Timeout(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether a retry could plausibly succeed.
    ///
    /// Only transport-level failures qualify; semantic errors such as an unknown
    /// model name are never retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::Timeout(_))
    }

    /// Errors after which the affected index must be cleared before further use.
    pub fn requires_reindex(&self) -> bool {
        matches!(
            self,
            Error::DimensionMismatch { .. }
                | Error::EmbeddingModelMismatch { .. }
                | Error::EmbeddingDimensionMismatch { .. }
        )
    }

    /// The innermost cause, looking through `AnswerFailed` wrappers.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::AnswerFailed { cause } => cause.root_cause(),
            other => other,
        }
    }
}
