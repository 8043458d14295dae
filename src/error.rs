//! Error taxonomy shared by the ingestion and query pipelines.
//!
//! Every failure surfaced to a caller falls into one of three families:
//!
//! | Family | Meaning | HTTP |
//! |--------|---------|------|
//! | [`ValidationError`] | The request itself is unacceptable | 400 / 413 |
//! | [`UpstreamError`] | The embedding or generation API failed | 502 |
//! | [`StorageError`] | The document store failed or is inconsistent | 500 |
//!
//! [`RagError`] wraps all three and is what [`RagService`](crate::rag::RagService)
//! returns. The HTTP layer maps it onto status codes in `server.rs`.

use thiserror::Error;

use crate::similarity::DimensionMismatch;

/// Top-level error returned by the RAG service operations.
#[derive(Debug, Error)]
pub enum RagError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Upstream(#[from] UpstreamError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<DimensionMismatch> for RagError {
    fn from(err: DimensionMismatch) -> Self {
        RagError::Storage(StorageError::DimensionMismatch {
            expected: err.left,
            actual: err.right,
        })
    }
}

/// The caller sent something we refuse to process. Never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Unsupported file type: {extension}. Supported types: .pdf, .docx, .txt, .md")]
    UnsupportedFileType { extension: String },

    #[error("No text could be extracted from the document.")]
    EmptyText,

    #[error("Invalid file content. Only UTF-8 text files are supported.")]
    InvalidUtf8,

    #[error("Could not read {kind} document: {reason}")]
    UnreadableDocument { kind: &'static str, reason: String },

    #[error("File size exceeds the limit of {limit} bytes.")]
    FileTooLarge { limit: usize },

    #[error("Database is full. Maximum of {max} documents allowed.")]
    StoreFull { max: usize },

    #[error("Query must be at least {min} characters long.")]
    QueryTooShort { min: usize },

    #[error("No file was provided in the `file` form field.")]
    MissingFile,
}

/// A remote API call failed. The upstream message is kept for diagnostics.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} API error {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} returned an unexpected response: {message}")]
    InvalidResponse {
        service: &'static str,
        message: String,
    },
}

impl UpstreamError {
    /// Name of the remote service that failed (`"embedding"` or `"generation"`).
    pub fn service(&self) -> &'static str {
        match self {
            UpstreamError::Transport { service, .. }
            | UpstreamError::Status { service, .. }
            | UpstreamError::InvalidResponse { service, .. } => service,
        }
    }
}

/// The document store failed, or its contents violate the dimension invariant.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(
        "embedding dimension mismatch: store holds {expected}-dimensional vectors, got {actual}; \
         reset the store after changing embedding models"
    )]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("store backend error: {0}")]
    Backend(String),
}
