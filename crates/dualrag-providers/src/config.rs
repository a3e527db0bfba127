//! Backend configuration

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use dualrag_core::{Error, Result};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_OPENAI_EMBEDDING_MODEL: &str = "text-embedding-3-small";

pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_CHAT_MODEL: &str = "llama3";
pub const DEFAULT_OLLAMA_EMBEDDING_MODEL: &str = "all-minilm";

/// Value shipped in the example env file; treated as "no key configured".
const PLACEHOLDER_API_KEY: &str = "your_openai_api_key_here";

/// Read `key` through `lookup` and parse it, falling back to `default` when unset.
pub fn parse_or<T>(lookup: &dyn Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw.trim().parse::<T>().map_err(|e| {
            Error::InvalidConfiguration(format!("{} has invalid value '{}': {}", key, raw, e))
        }),
        _ => Ok(default),
    }
}

/// Validate that `raw` is an absolute http(s) URL and return it without a trailing slash.
pub fn validate_base_url(key: &str, raw: &str) -> Result<String> {
    let parsed = Url::parse(raw)
        .map_err(|e| Error::InvalidConfiguration(format!("{} is not a valid URL '{}': {}", key, raw, e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(raw.trim_end_matches('/').to_string()),
        other => Err(Error::InvalidConfiguration(format!(
            "{} must use http or https, got '{}'",
            key, other
        ))),
    }
}

fn string_or(lookup: &dyn Fn(&str) -> Option<String>, key: &str, default: &str) -> String {
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Configuration for the network-hosted (OpenAI-compatible) backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenAiConfig {
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let api_key = lookup("OPENAI_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && k != PLACEHOLDER_API_KEY);

        let base_url = validate_base_url(
            "OPENAI_BASE_URL",
            &string_or(lookup, "OPENAI_BASE_URL", DEFAULT_OPENAI_BASE_URL),
        )?;

        Ok(Self {
            api_key,
            base_url,
            chat_model: string_or(lookup, "OPENAI_MODEL", DEFAULT_OPENAI_CHAT_MODEL),
            embedding_model: string_or(lookup, "OPENAI_EMBEDDING_MODEL", DEFAULT_OPENAI_EMBEDDING_MODEL),
            timeout: Duration::from_secs(parse_or(lookup, "CLOUD_TIMEOUT_SECS", 60u64)?),
        })
    }

    /// Create configuration with explicit values
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            chat_model: DEFAULT_OPENAI_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_OPENAI_EMBEDDING_MODEL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// Configuration for the local (Ollama) backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub timeout: Duration,
}

impl OllamaConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(&|key: &str| env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let base_url = validate_base_url(
            "OLLAMA_BASE_URL",
            &string_or(lookup, "OLLAMA_BASE_URL", DEFAULT_OLLAMA_BASE_URL),
        )?;

        Ok(Self {
            base_url,
            chat_model: string_or(lookup, "OLLAMA_MODEL", DEFAULT_OLLAMA_CHAT_MODEL),
            embedding_model: string_or(lookup, "OLLAMA_EMBEDDING_MODEL", DEFAULT_OLLAMA_EMBEDDING_MODEL),
            timeout: Duration::from_secs(parse_or(lookup, "LOCAL_TIMEOUT_SECS", 120u64)?),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
            chat_model: DEFAULT_OLLAMA_CHAT_MODEL.to_string(),
            embedding_model: DEFAULT_OLLAMA_EMBEDDING_MODEL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_placeholder_key_is_ignored() {
        let lookup = lookup_from(&[("OPENAI_API_KEY", "your_openai_api_key_here")]);
        let config = OpenAiConfig::from_lookup(&lookup).unwrap();
        assert!(!config.has_api_key());
        assert_eq!(config.base_url, DEFAULT_OPENAI_BASE_URL);
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let lookup = lookup_from(&[("OLLAMA_BASE_URL", "http://127.0.0.1:11434/")]);
        let config = OllamaConfig::from_lookup(&lookup).unwrap();
        assert_eq!(config.base_url, "http://127.0.0.1:11434");
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let lookup = lookup_from(&[("OLLAMA_BASE_URL", "localhost:11434")]);
        assert!(matches!(
            OllamaConfig::from_lookup(&lookup),
            Err(Error::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_invalid_timeout_is_rejected() {
        let lookup = lookup_from(&[("CLOUD_TIMEOUT_SECS", "soon")]);
        let err = OpenAiConfig::from_lookup(&lookup).unwrap_err();
        assert!(err.to_string().contains("CLOUD_TIMEOUT_SECS"));
    }
}
