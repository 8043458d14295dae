//! Ingestion and query orchestration.
//!
//! [`RagService`] owns the three collaborators (store, embedding provider,
//! generation provider) and the configured limits. It is constructed once at
//! startup and shared by the HTTP handlers and CLI commands.
//!
//! # Upload
//!
//! ```text
//! count ≥ max_docs? ─▶ size > max_doc_size? ─▶ extract ─▶ embed ─▶ insert
//! ```
//!
//! Every arrow is a failure point; the document is written once, at the end.
//!
//! # Query
//!
//! ```text
//! length check ─▶ embed ─▶ rank ─▶ (empty? fixed answer) ─▶ prompt ─▶ generate
//! ```

use std::fmt::Write as _;
use std::sync::Arc;

use crate::config::{Config, LimitsConfig};
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{RagError, StorageError, ValidationError};
use crate::extract;
use crate::generation::{self, GenerationProvider};
use crate::models::{ContextRef, DocumentSummary, QueryAnswer, ScoredDocument, UploadOutcome};
use crate::rank;
use crate::store::sqlite::SqliteStore;
use crate::store::Store;

/// Answer returned when a query arrives before any document was uploaded.
pub const EMPTY_STORE_ANSWER: &str =
    "The document database is empty. Please upload some documents first.";

/// The RAG pipeline with its collaborators injected.
pub struct RagService {
    store: Arc<dyn Store>,
    embedder: Arc<dyn EmbeddingProvider>,
    generator: Arc<dyn GenerationProvider>,
    limits: LimitsConfig,
}

impl RagService {
    pub fn new(
        store: Arc<dyn Store>,
        embedder: Arc<dyn EmbeddingProvider>,
        generator: Arc<dyn GenerationProvider>,
        limits: LimitsConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            generator,
            limits,
        }
    }

    /// Build the production service: SQLite store plus the configured
    /// remote providers.
    ///
    /// Fails when credentials are missing, so a misconfigured process never
    /// starts serving.
    pub async fn from_config(config: &Config) -> anyhow::Result<Self> {
        let embedder = embedding::create_provider(&config.embedding)?;
        let generator = generation::create_provider(&config.generation)?;
        let store = SqliteStore::open(config).await?;
        Ok(Self::new(
            Arc::new(store),
            embedder,
            generator,
            config.limits.clone(),
        ))
    }

    pub fn limits(&self) -> &LimitsConfig {
        &self.limits
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Extract, embed and persist an uploaded file. Returns the new id.
    pub async fn upload(&self, filename: &str, bytes: &[u8]) -> Result<UploadOutcome, RagError> {
        let count = self.store.count().await?;
        if count >= self.limits.max_docs {
            return Err(ValidationError::StoreFull {
                max: self.limits.max_docs,
            }
            .into());
        }

        if bytes.len() > self.limits.max_doc_size {
            return Err(ValidationError::FileTooLarge {
                limit: self.limits.max_doc_size,
            }
            .into());
        }

        let text = extract_off_runtime(bytes, filename).await?;
        let embedding = self.embedder.embed(&text).await?;

        if let Some(expected) = self.store.embedding_dims().await? {
            if expected != embedding.len() {
                return Err(StorageError::DimensionMismatch {
                    expected,
                    actual: embedding.len(),
                }
                .into());
            }
        }

        let doc_id = self
            .store
            .insert_capped(filename, &text, &embedding, self.limits.max_docs)
            .await?
            .ok_or(ValidationError::StoreFull {
                max: self.limits.max_docs,
            })?;
        tracing::info!(
            doc_id,
            filename,
            "Document '{}' (ID: {}) uploaded and indexed",
            filename,
            doc_id
        );

        Ok(UploadOutcome {
            message: "Document uploaded successfully".to_string(),
            doc_id,
            filename: filename.to_string(),
        })
    }

    /// Extract text without storing anything.
    pub async fn extract(&self, filename: &str, bytes: &[u8]) -> Result<String, RagError> {
        Ok(extract_off_runtime(bytes, filename).await?)
    }

    /// Answer `question` from the most similar stored documents.
    pub async fn query(&self, question: &str) -> Result<QueryAnswer, RagError> {
        let question = question.trim();
        if question.chars().count() < self.limits.min_query_len {
            return Err(ValidationError::QueryTooShort {
                min: self.limits.min_query_len,
            }
            .into());
        }
        tracing::info!("Received query: '{}'", question);

        let query_vec = self.embedder.embed(question).await?;
        let hits = rank::retrieve(self.store.as_ref(), &query_vec, self.limits.top_k).await?;

        if hits.is_empty() {
            return Ok(QueryAnswer {
                answer: EMPTY_STORE_ANSWER.to_string(),
                contexts: Vec::new(),
            });
        }

        let prompt = build_prompt(&hits, question);
        let answer = self.generator.generate(&prompt).await?;

        Ok(QueryAnswer {
            answer,
            contexts: hits
                .iter()
                .map(|hit| ContextRef {
                    id: hit.id,
                    title: hit.title.clone(),
                    similarity: round4(hit.score),
                })
                .collect(),
        })
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentSummary>, RagError> {
        Ok(self.store.list().await?)
    }

    pub async fn document_count(&self) -> Result<usize, RagError> {
        Ok(self.store.count().await?)
    }

    /// Delete every stored document. Needed after switching embedding models.
    pub async fn reset(&self) -> Result<u64, RagError> {
        let removed = self.store.clear().await?;
        tracing::warn!(removed, "Document store cleared");
        Ok(removed)
    }
}

/// Run [`extract::extract_text`] on the blocking pool. PDF and DOCX parsing
/// is CPU-bound and must not stall a runtime worker.
async fn extract_off_runtime(bytes: &[u8], filename: &str) -> Result<String, ValidationError> {
    let owned_bytes = bytes.to_vec();
    let owned_name = filename.to_string();
    tokio::task::spawn_blocking(move || extract::extract_text(&owned_bytes, &owned_name))
        .await
        .map_err(extraction_aborted)?
}

/// A panicking or cancelled extraction is reported as an unreadable upload.
fn extraction_aborted(err: tokio::task::JoinError) -> ValidationError {
    let reason = if err.is_panic() {
        "the extractor crashed while parsing the file".to_string()
    } else {
        format!("extraction was cancelled: {}", err)
    };
    tracing::error!("text extraction aborted: {}", err);
    ValidationError::UnreadableDocument {
        kind: "uploaded",
        reason,
    }
}

/// Assemble the generation prompt from the ranked context documents.
pub fn build_prompt(hits: &[ScoredDocument], question: &str) -> String {
    let mut context = String::new();
    for hit in hits {
        let _ = write!(
            context,
            "### [id={}] Title: {}\n{}\n###\n\n",
            hit.id, hit.title, hit.content
        );
    }

    format!(
        "\nYou are a helpful assistant. Use the CONTEXT sections below to answer the QUESTION.\n\
         If the answer is not present in the context, answer \"I don't know\".\n\
         \n\
         CONTEXT:\n\
         {context}QUESTION: {question}\n\
         \n\
         Answer concisely and include the source id(s) in your answer (e.g., [id=12]).\n"
    )
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
