//! Embedding provider abstraction and the HTTP implementation.
//!
//! Defines the [`EmbeddingProvider`] trait and [`HttpEmbeddingProvider`],
//! which speaks the `/v1/embeddings` wire format shared by Jina AI and
//! OpenAI:
//!
//! ```json
//! // request
//! { "model": "jina-embeddings-v2-base-en", "input": ["some text"] }
//! // response
//! { "data": [ { "embedding": [0.01, -0.2, ...] } ] }
//! ```
//!
//! Also provides the BLOB codec used by the SQLite store:
//! - [`vec_to_blob`] - encode a `Vec<f32>` as little-endian bytes
//! - [`blob_to_vec`] - decode a BLOB back into a `Vec<f32>`
//!
//! # Failure model
//!
//! Requests are bounded by `embedding.timeout_secs` and never retried.
//! Transport failures, non-2xx responses and malformed bodies all surface
//! as [`UpstreamError`].

use anyhow::bail;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::UpstreamError;

const SERVICE: &str = "embedding";

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"jina-embeddings-v2-base-en"`).
    fn model_name(&self) -> &str;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError>;
}

/// Embedding provider for Jina AI and OpenAI-compatible endpoints.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    dims: Option<usize>,
}

impl HttpEmbeddingProvider {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        dims: Option<usize>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: api_key.into(),
            dims,
        })
    }

    /// Create a provider from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key environment variable (`JINA_API_KEY`
    /// by default) is unset or empty.
    pub fn from_config(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let key_env = config.key_env();
        let api_key = match std::env::var(key_env) {
            Ok(key) if !key.trim().is_empty() => key,
            _ => bail!("{} environment variable not set", key_env),
        };

        Self::new(
            config.endpoint(),
            config.model_name(),
            api_key,
            Duration::from_secs(config.timeout_secs),
            config.dims,
        )
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, UpstreamError> {
        let snippet: String = text.chars().take(80).collect();
        tracing::info!(
            model = %self.model,
            "Requesting embedding for text snippet: {}...",
            snippet
        );

        let body = serde_json::json!({
            "model": self.model,
            "input": [text],
        });

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
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
                "embedding API returned an error"
            );
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: status.as_u16(),
                body: body_text,
            });
        }

        let json: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| UpstreamError::InvalidResponse {
                    service: SERVICE,
                    message: e.to_string(),
                })?;

        let embedding = parse_embedding_response(&json).map_err(|message| {
            UpstreamError::InvalidResponse {
                service: SERVICE,
                message,
            }
        })?;

        if let Some(dims) = self.dims {
            if embedding.len() != dims {
                return Err(UpstreamError::InvalidResponse {
                    service: SERVICE,
                    message: format!(
                        "expected {}-dimensional embedding, got {}",
                        dims,
                        embedding.len()
                    ),
                });
            }
        }

        tracing::info!(dims = embedding.len(), "Embedding received");
        Ok(embedding)
    }
}

/// Extract `data[0].embedding` from an embeddings API response.
fn parse_embedding_response(json: &serde_json::Value) -> Result<Vec<f32>, String> {
    let first = json
        .get("data")
        .and_then(|d| d.as_array())
        .and_then(|d| d.first())
        .ok_or_else(|| "missing data array".to_string())?;

    let values = first
        .get("embedding")
        .and_then(|e| e.as_array())
        .ok_or_else(|| "missing embedding".to_string())?;

    values
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| format!("non-numeric embedding component: {}", v))
        })
        .collect()
}

/// Create the configured [`EmbeddingProvider`].
///
/// | Config Value | Endpoint | Key variable |
/// |-------------|----------|--------------|
/// | `"jina"` | `https://api.jina.ai/v1/embeddings` | `JINA_API_KEY` |
/// | `"openai"` | `https://api.openai.com/v1/embeddings` | `OPENAI_API_KEY` |
pub fn create_provider(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "jina" | "openai" => Ok(Arc::new(HttpEmbeddingProvider::from_config(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use docsage::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer, dims: Option<usize>) -> HttpEmbeddingProvider {
        HttpEmbeddingProvider::new(
            format!("{}/v1/embeddings", server.uri()),
            "test-model",
            "secret",
            Duration::from_secs(5),
            dims,
        )
        .unwrap()
    }

    #[test]
    fn parses_first_embedding() {
        let json = json!({ "data": [ { "embedding": [0.5, -1.0, 2.0] } ] });
        assert_eq!(parse_embedding_response(&json).unwrap(), vec![0.5, -1.0, 2.0]);
    }

    #[test]
    fn rejects_malformed_response() {
        assert!(parse_embedding_response(&json!({})).is_err());
        assert!(parse_embedding_response(&json!({ "data": [] })).is_err());
        assert!(parse_embedding_response(&json!({ "data": [ { "embedding": ["x"] } ] })).is_err());
    }

    #[test]
    fn blob_layout_is_little_endian() {
        assert_eq!(vec_to_blob(&[1.0]), 1.0f32.to_le_bytes().to_vec());
        assert!(blob_to_vec(&[]).is_empty());
    }

    #[test]
    fn missing_api_key_is_a_startup_error() {
        let config = EmbeddingConfig {
            api_key_env: Some("DOCSAGE_TEST_EMBEDDING_KEY_NEVER_SET".to_string()),
            ..EmbeddingConfig::default()
        };
        let err = create_provider(&config).err().unwrap();
        assert!(err
            .to_string()
            .contains("DOCSAGE_TEST_EMBEDDING_KEY_NEVER_SET"));
    }

    #[tokio::test]
    async fn embed_posts_model_and_input() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("Authorization", "Bearer secret"))
            .and(body_partial_json(json!({ "model": "test-model", "input": ["hello"] })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": [ { "embedding": [0.1, 0.2] } ] })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let vector = provider(&server, None).embed("hello").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2]);
    }

    #[tokio::test]
    async fn transport_error_omits_request_url() {
        let closed_port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let provider = HttpEmbeddingProvider::new(
            format!("http://127.0.0.1:{}/v1/embeddings?token=hidden", closed_port),
            "test-model",
            "secret",
            Duration::from_secs(2),
            None,
        )
        .unwrap();

        let err = provider.embed("hello").await.unwrap_err();
        assert!(matches!(err, UpstreamError::Transport { .. }));
        assert!(!err.to_string().contains("hidden"), "{}", err);
        assert!(!err.to_string().contains("secret"));
    }

    #[tokio::test]
    async fn non_success_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let err = provider(&server, None).embed("hello").await.unwrap_err();
        match err {
            UpstreamError::Status { status, body, .. } => {
                assert_eq!(status, 401);
                assert_eq!(body, "invalid api key");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn unexpected_dimensionality_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": [ { "embedding": [0.1, 0.2] } ] })),
            )
            .mount(&server)
            .await;

        let err = provider(&server, Some(3)).embed("hello").await.unwrap_err();
        assert!(matches!(err, UpstreamError::InvalidResponse { .. }));
    }
}
