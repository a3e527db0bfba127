//! Deterministic in-process backends for tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use dualrag_core::{
    BackendDescriptor, BackendKind, EmbeddingBackend, EmbeddingSpec, Error, GenerationBackend,
    GenerationConfig, GenerationResult, Result, Vector,
};

/// Words that light up each dimension of a `KeywordEmbedder` vector
const CONCEPTS: &[&[&str]] = &[
    &["install", "installs", "curl", "setup"],
    &["local", "ollama"],
    &["private", "privacy"],
    &["rag", "retrieval", "hallucination"],
    &["model", "models"],
];

pub const KEYWORD_MODEL: &str = "keyword-test";

pub fn keyword_spec() -> EmbeddingSpec {
    EmbeddingSpec {
        model: KEYWORD_MODEL.to_string(),
        dimension: KeywordEmbedder::DIMENSION,
    }
}

/// Embeds text as keyword counts per concept
#[derive(Default)]
pub struct KeywordEmbedder {
    calls: AtomicUsize,
    failures: Mutex<VecDeque<Error>>,
}

impl KeywordEmbedder {
    pub const DIMENSION: usize = CONCEPTS.len();

    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Make the next call fail with `error`
    pub fn fail_next(&self, error: Error) {
        self.failures.lock().unwrap().push_back(error);
    }

    pub fn vector_for(&self, text: &str) -> Vector {
        let mut vector = vec![0.0; Self::DIMENSION];
        for word in text.split_whitespace() {
            let word = word
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase();
            for (dim, keywords) in CONCEPTS.iter().enumerate() {
                if keywords.contains(&word.as_str()) {
                    vector[dim] += 1.0;
                }
            }
        }
        vector
    }
}

#[async_trait]
impl EmbeddingBackend for KeywordEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vector>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn model_id(&self) -> &str {
        KEYWORD_MODEL
    }
}

/// Generation backend that echoes prompts and records them
pub struct ScriptedBackend {
    kind: BackendKind,
    model: String,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
    failures: Mutex<VecDeque<Error>>,
    gate: Mutex<Option<Arc<Notify>>>,
    called: Notify,
}

impl ScriptedBackend {
    pub fn new(kind: BackendKind, model: &str) -> Self {
        Self {
            kind,
            model: model.to_string(),
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            failures: Mutex::new(VecDeque::new()),
            gate: Mutex::new(None),
            called: Notify::new(),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, error: Error) {
        self.failures.lock().unwrap().push_back(error);
    }

    /// Block the next call until the returned handle is notified
    pub fn hold(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Resolve once a call has started
    pub async fn wait_until_called(&self) {
        self.called.notified().await
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    async fn generate_with_config(
        &self,
        prompt: &str,
        _config: &GenerationConfig,
    ) -> Result<GenerationResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.called.notify_one();

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }

        let failure = self.failures.lock().unwrap().pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(GenerationResult {
            text: format!("{} says: {}", self.model, prompt),
            model_id: self.model.clone(),
        })
    }

    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn descriptor(&self) -> BackendDescriptor {
        BackendDescriptor {
            endpoint: format!("test://{}", self.kind),
            model: self.model.clone(),
            timeout: Duration::from_secs(5),
        }
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
