//! HTTP plumbing shared by both backends

use reqwest::{Client, StatusCode};
use std::time::Duration;

use dualrag_core::{BackendKind, Error, Result};

pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::InvalidConfiguration(format!("failed to build HTTP client: {}", e)))
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Classify a reqwest failure. Connection and timeout problems are transient.
pub(crate) fn transport_error(err: reqwest::Error) -> Error {
    if err.is_timeout() {
        Error::Timeout(err.to_string())
    } else if err.is_decode() {
        Error::Serialization(err.to_string())
    } else {
        Error::Transport(err.to_string())
    }
}

/// Classify a non-success HTTP status.
///
/// 408, 429 and 5xx are transient; everything else is the backend refusing
/// the request and is not worth retrying.
pub(crate) fn status_error(backend: BackendKind, status: StatusCode, message: String) -> Error {
    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        Error::Transport(format!("HTTP {}: {}", status.as_u16(), message))
    } else {
        Error::BackendRejected {
            backend,
            status: Some(status.as_u16()),
            message,
        }
    }
}
