//! Bounded timeout and retry policy for external calls

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

use crate::{BackendKind, Error, Result};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub backoff_multiplier: u32,
    /// Upper bound on a single attempt
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff: Duration::from_millis(250),
            backoff_multiplier: 2,
            timeout: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self.clone()
        }
    }

    /// Run `attempt` until it succeeds, fails with a non-transient error, or
    /// the retry budget is spent.
    ///
    /// Every attempt is bounded by `self.timeout`. Transient failures that
    /// survive all retries are reported as `BackendUnavailable`; other errors
    /// are returned unchanged after the first occurrence.
    pub async fn run<T, F, Fut>(&self, backend: BackendKind, operation: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut backoff = self.initial_backoff;
        let mut retries = 0;

        loop {
            let outcome = match timeout(self.timeout, attempt()).await {
                Ok(result) => result,
                Err(_) => Err(Error::Timeout(format!(
                    "{} did not complete within {:?}",
                    operation, self.timeout
                ))),
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && retries < self.max_retries => {
                    retries += 1;
                    tracing::warn!(
                        %backend,
                        operation,
                        retry = retries,
                        error = %e,
                        "transient failure, retrying in {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(self.backoff_multiplier);
                }
                Err(e) if e.is_transient() => {
                    return Err(Error::BackendUnavailable {
                        backend,
                        reason: format!("{} failed after {} attempts: {}", operation, retries + 1, e),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }
}
