//! Text generation provider abstraction and the Gemini implementation.
//!
//! [`GeminiProvider`] calls
//! `POST {base_url}/v1beta/models/{model}:generateContent` with a single user
//! turn and concatenates the text parts of the first candidate. The API key
//! travels in the `x-goog-api-key` header, never in the URL, so it cannot
//! surface in transport error messages.
//! Requests are bounded by `generation.timeout_secs` and never retried.

use anyhow::bail;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::error::UpstreamError;

const SERVICE: &str = "generation";

/// Trait for text generation providers.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"gemini-1.5-flash"`).
    fn model_name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

/// Google Gemini `generateContent` client.
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        })
    }

    /// Create a provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key variable (`GEMINI_API_KEY` by default)
    /// is unset, empty, or still holds the `xxx` placeholder.
    pub fn from_config(config: &GenerationConfig) -> anyhow::Result<Self> {
        let api_key = match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() && key.trim() != "xxx" => key,
            _ => bail!("{} not found or not set", config.api_key_env),
        };

        Self::new(
            config.base_url.clone(),
            config.model.clone(),
            api_key,
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[async_trait]
impl GenerationProvider for GeminiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String, UpstreamError> {
        tracing::info!(model = %self.model, "Calling generation model");

        let request = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|source| UpstreamError::Transport {
                service: SERVICE,
                source: source.without_url(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            tracing::error!(
                status = status.as_u16(),
                body = %body_text,
                "generation API returned an error"
            );
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body: body_text,
            });
        }

        let parsed: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| UpstreamError::InvalidResponse {
                    service: SERVICE,
                    message: e.to_string(),
                })?;

        let answer = first_candidate_text(parsed).ok_or_else(|| UpstreamError::InvalidResponse {
            service: SERVICE,
            message: "no candidates returned".to_string(),
        })?;

        tracing::info!("LLM response received");
        Ok(answer)
    }
}

fn first_candidate_text(response: GenerateResponse) -> Option<String> {
    let content = response.candidates.into_iter().next()?.content?;
    Some(
        content
            .parts
            .into_iter()
            .filter_map(|p| p.text)
            .collect::<Vec<_>>()
            .join(""),
    )
}

/// Create the configured [`GenerationProvider`].
pub fn create_provider(config: &GenerationConfig) -> anyhow::Result<Arc<dyn GenerationProvider>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiProvider::from_config(config)?)),
        other => bail!("Unknown generation provider: {}", other),
    }
}
