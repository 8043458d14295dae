//! Configuration loading.
//!
//! Settings come from three layers, later ones winning:
//!
//! 1. Built-in defaults.
//! 2. A TOML file (`--config`, default `./config/docsage.toml`). A missing
//!    file is not an error.
//! 3. Environment overrides: `DB_PATH`, `TOP_K`, `MAX_DOCS`, `MAX_DOC_SIZE`,
//!    `GEMINI_GEN_MODEL`, `BIND_ADDR`.
//!
//! API keys are never read from the file; providers look them up in the
//! environment variable named by `api_key_env` when they are constructed.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/docs.db")
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    #[serde(default = "default_max_docs")]
    pub max_docs: usize,
    #[serde(default = "default_max_doc_size")]
    pub max_doc_size: usize,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_query_len")]
    pub min_query_len: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_docs: default_max_docs(),
            max_doc_size: default_max_doc_size(),
            top_k: default_top_k(),
            min_query_len: default_min_query_len(),
        }
    }
}

fn default_max_docs() -> usize {
    500
}
fn default_max_doc_size() -> usize {
    10 * 1024 * 1024
}
fn default_top_k() -> usize {
    3
}
fn default_min_query_len() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Endpoint URL; the provider's public endpoint when omitted.
    #[serde(default)]
    pub url: Option<String>,
    /// Name of the environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Expected vector length. Responses of any other length are rejected.
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            url: None,
            api_key_env: None,
            dims: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "jina".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn model_name(&self) -> &str {
        match (&self.model, self.provider.as_str()) {
            (Some(model), _) => model,
            (None, "openai") => "text-embedding-3-small",
            (None, _) => "jina-embeddings-v2-base-en",
        }
    }

    pub fn endpoint(&self) -> &str {
        match (&self.url, self.provider.as_str()) {
            (Some(url), _) => url,
            (None, "openai") => "https://api.openai.com/v1/embeddings",
            (None, _) => "https://api.jina.ai/v1/embeddings",
        }
    }

    pub fn key_env(&self) -> &str {
        match (&self.api_key_env, self.provider.as_str()) {
            (Some(var), _) => var,
            (None, "openai") => "OPENAI_API_KEY",
            (None, _) => "JINA_API_KEY",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_generation_base_url")]
    pub base_url: String,
    #[serde(default = "default_generation_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            base_url: default_generation_base_url(),
            api_key_env: default_generation_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_generation_provider() -> String {
    "gemini".to_string()
}
fn default_generation_model() -> String {
    "gemini-1.5-flash".to_string()
}
fn default_generation_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_generation_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

impl Config {
    /// Apply environment-style overrides. `lookup` is `std::env::var` in
    /// production and a map in tests.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("DB_PATH") {
            self.db.path = PathBuf::from(path);
        }
        if let Some(v) = lookup("TOP_K") {
            self.limits.top_k = parse_override("TOP_K", &v)?;
        }
        if let Some(v) = lookup("MAX_DOCS") {
            self.limits.max_docs = parse_override("MAX_DOCS", &v)?;
        }
        if let Some(v) = lookup("MAX_DOC_SIZE") {
            self.limits.max_doc_size = parse_override("MAX_DOC_SIZE", &v)?;
        }
        if let Some(model) = lookup("GEMINI_GEN_MODEL") {
            self.generation.model = model;
        }
        if let Some(bind) = lookup("BIND_ADDR") {
            self.server.bind = bind;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.limits.top_k < 1 {
            bail!("limits.top_k must be >= 1");
        }
        if self.limits.max_docs < 1 {
            bail!("limits.max_docs must be >= 1");
        }
        if self.limits.max_doc_size < 1 {
            bail!("limits.max_doc_size must be >= 1");
        }
        if self.limits.min_query_len < 1 {
            bail!("limits.min_query_len must be >= 1");
        }

        match self.embedding.provider.as_str() {
            "jina" | "openai" => {}
            other => bail!(
                "Unknown embedding provider: '{}'. Must be jina or openai.",
                other
            ),
        }
        if self.embedding.dims == Some(0) {
            bail!("embedding.dims must be > 0 when set");
        }
        if self.embedding.timeout_secs == 0 {
            bail!("embedding.timeout_secs must be > 0");
        }

        if self.generation.provider != "gemini" {
            bail!(
                "Unknown generation provider: '{}'. Must be gemini.",
                self.generation.provider
            );
        }
        if self.generation.model.trim().is_empty() {
            bail!("generation.model must not be empty");
        }
        if self.generation.timeout_secs == 0 {
            bail!("generation.timeout_secs must be > 0");
        }

        Ok(())
    }
}

fn parse_override<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: '{}'", key, value))
}

/// Parse a TOML config document without touching the environment.
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse config file")
}

/// Load the config file (if present), apply environment overrides and validate.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config(&content)?
    } else {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        Config::default()
    };

    config.apply_overrides(|key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}
