//! TOML configuration plus environment-sourced secrets.
//!
//! Everything non-secret lives in the config file passed via `--config` and
//! is loaded once at process start. API keys come from the environment and
//! are resolved once, up front, so a missing key fails fast before any
//! pipeline work happens.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Name of the index on the vector-store service.
    pub name: String,
    #[serde(default = "default_store_provider")]
    pub provider: String,
    /// Namespace used when the CLI is not given one explicitly.
    #[serde(default = "default_namespace")]
    pub default_namespace: String,
}

fn default_store_provider() -> String {
    "pinecone".to_string()
}
fn default_namespace() -> String {
    "user-data".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters repeated between consecutive chunks.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            overlap: default_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    100
}
fn default_overlap() -> usize {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Number of matches requested from the similarity search.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: default_completion_model(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.index.name.trim().is_empty() {
        anyhow::bail!("index.name must not be empty");
    }

    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.overlap,
            config.chunking.chunk_size
        );
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be openai or ollama.",
            other
        ),
    }

    match config.index.provider.as_str() {
        "pinecone" => {}
        other => anyhow::bail!("Unknown vector-store provider: '{}'.", other),
    }

    Ok(config)
}

/// Environment variable holding the vector-store API key.
pub const VECTOR_STORE_KEY_VAR: &str = "PINECONE_API_KEY";
/// Environment variable holding the OpenAI API key.
pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";

/// Raised when a required environment key is absent.
#[derive(Debug)]
pub enum ConfigError {
    MissingKey(&'static str),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingKey(key) => {
                write!(f, "missing required configuration: {} is not set", key)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// API keys resolved once at startup.
#[derive(Debug, Clone)]
pub struct Secrets {
    pub vector_store_api_key: String,
    /// Present whenever an OpenAI-backed provider is configured.
    pub openai_api_key: Option<String>,
}

impl Secrets {
    /// Resolve secrets from the process environment.
    ///
    /// The OpenAI key is only required when the embedding provider is
    /// `openai`; answer synthesis also needs it, which [`Secrets::require_openai`]
    /// enforces at the point of use.
    pub fn from_env(config: &Config) -> Result<Self, ConfigError> {
        Self::from_lookup(config, |key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        config: &Config,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let vector_store_api_key = lookup(VECTOR_STORE_KEY_VAR)
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::MissingKey(VECTOR_STORE_KEY_VAR))?;

        let openai_api_key = lookup(OPENAI_KEY_VAR).filter(|v| !v.is_empty());
        if config.embedding.provider == "openai" && openai_api_key.is_none() {
            return Err(ConfigError::MissingKey(OPENAI_KEY_VAR));
        }

        Ok(Self {
            vector_store_api_key,
            openai_api_key,
        })
    }

    /// The OpenAI key, or a [`ConfigError::MissingKey`] naming it.
    pub fn require_openai(&self) -> Result<&str, ConfigError> {
        self.openai_api_key
            .as_deref()
            .ok_or(ConfigError::MissingKey(OPENAI_KEY_VAR))
    }
}
