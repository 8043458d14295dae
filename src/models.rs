//! Core data models used throughout docsage.
//!
//! These types represent the documents and ranked results that flow through
//! the ingestion and query pipeline.

use serde::Serialize;

/// Lightweight document listing entry, as returned by `GET /documents`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentSummary {
    pub id: i64,
    pub title: String,
}

/// A stored document together with its embedding vector.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// A document scored against a query by the retrieval ranker.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    /// Cosine similarity between the query and the document embedding.
    pub score: f64,
    pub id: i64,
    pub title: String,
    pub content: String,
}

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadOutcome {
    pub message: String,
    pub doc_id: i64,
    pub filename: String,
}

/// A context document cited in a query answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextRef {
    pub id: i64,
    pub title: String,
    /// Similarity rounded to four decimal places.
    pub similarity: f64,
}

/// Answer to a query plus the documents that were used as context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryAnswer {
    pub answer: String,
    pub contexts: Vec<ContextRef>,
}
