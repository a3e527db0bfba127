//! Inference gateway over the cloud and local backends
//!
//! Holds both backends and an atomic flag naming the active one. A call reads
//! the flag once when it starts, so a concurrent `switch()` affects only calls
//! that begin after it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dualrag_core::{
    BackendKind, Error, GenerationBackend, GenerationConfig, InferenceBackend, Result, RetryPolicy,
};

/// Text produced by one generation call and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub text: String,
    pub backend: BackendKind,
    pub model: String,
}

pub struct InferenceGateway {
    cloud: Arc<dyn GenerationBackend>,
    local: Arc<dyn GenerationBackend>,
    local_active: AtomicBool,
    config: GenerationConfig,
    retry: RetryPolicy,
}

impl InferenceGateway {
    pub fn new(
        cloud: Arc<dyn GenerationBackend>,
        local: Arc<dyn GenerationBackend>,
        initial: BackendKind,
        config: GenerationConfig,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if cloud.kind() != BackendKind::Cloud || local.kind() != BackendKind::Local {
            return Err(Error::InvalidConfiguration(format!(
                "gateway expects a cloud and a local backend, got {} and {}",
                cloud.kind(),
                local.kind()
            )));
        }

        Ok(Self {
            cloud,
            local,
            local_active: AtomicBool::new(initial == BackendKind::Local),
            config,
            retry,
        })
    }

    fn kind_of(local: bool) -> BackendKind {
        if local {
            BackendKind::Local
        } else {
            BackendKind::Cloud
        }
    }

    fn backend(&self, kind: BackendKind) -> &Arc<dyn GenerationBackend> {
        match kind {
            BackendKind::Cloud => &self.cloud,
            BackendKind::Local => &self.local,
        }
    }

    fn describe(&self, kind: BackendKind) -> InferenceBackend {
        InferenceBackend::new(kind, self.backend(kind).descriptor())
    }

    pub fn active_kind(&self) -> BackendKind {
        Self::kind_of(self.local_active.load(Ordering::SeqCst))
    }

    /// The active backend
    pub fn current(&self) -> InferenceBackend {
        self.describe(self.active_kind())
    }

    /// Toggle the active backend and return the newly active one.
    ///
    /// Does not check that the new backend is reachable.
    pub fn switch(&self) -> InferenceBackend {
        let was_local = self.local_active.fetch_xor(true, Ordering::SeqCst);
        let now = Self::kind_of(!was_local);
        tracing::info!(backend = %now, "switched inference backend");
        self.describe(now)
    }

    /// Make `kind` the active backend
    pub fn select(&self, kind: BackendKind) -> InferenceBackend {
        self.local_active
            .store(kind == BackendKind::Local, Ordering::SeqCst);
        self.describe(kind)
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    pub async fn generate(&self, prompt: &str) -> Result<String> {
        Ok(self.generate_detailed(prompt).await?.text)
    }

    /// Generate on the backend that is active when the call starts
    pub async fn generate_detailed(&self, prompt: &str) -> Result<Generation> {
        let kind = self.active_kind();
        let backend = Arc::clone(self.backend(kind));
        let policy = self.retry.with_timeout(backend.descriptor().timeout);

        tracing::debug!(%kind, model = backend.model_id(), "generating");
        let result = policy
            .run(kind, "generate", || {
                backend.generate_with_config(prompt, &self.config)
            })
            .await?;

        Ok(Generation {
            text: result.text,
            backend: kind,
            model: result.model_id,
        })
    }
}
