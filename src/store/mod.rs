//! Storage abstraction for docsage.
//!
//! The [`Store`] trait defines the handful of operations the ingestion and
//! query pipelines need from a document table, enabling pluggable backends:
//!
//! - [`SqliteStore`](sqlite::SqliteStore) - the persistent backend used by
//!   the server and CLI.
//! - [`InMemoryStore`](memory::InMemoryStore) - for tests and for embedding
//!   the library without a database.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::models::{DocumentSummary, StoredDocument};

/// Abstract document table.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`insert`](Store::insert) | Persist a new document, returning its fresh id |
/// | [`insert_capped`](Store::insert_capped) | Same, unless the store already holds `max_docs` documents |
/// | [`list`](Store::list) | All `(id, title)` pairs in id order |
/// | [`all_with_embeddings`](Store::all_with_embeddings) | Full records for ranking |
/// | [`count`](Store::count) | Number of stored documents |
/// | [`embedding_dims`](Store::embedding_dims) | Dimensionality of stored vectors |
/// | [`clear`](Store::clear) | Delete every document |
///
/// Ids are assigned monotonically and never reused, even after
/// [`clear`](Store::clear).
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a document and return its newly assigned id.
    async fn insert(
        &self,
        title: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<i64, StorageError>;

    /// Insert a document only if fewer than `max_docs` are stored.
    ///
    /// The count check and the insert are one atomic step, so concurrent
    /// uploads cannot push the store past `max_docs`. Returns `None` when the
    /// store is full.
    async fn insert_capped(
        &self,
        title: &str,
        content: &str,
        embedding: &[f32],
        max_docs: usize,
    ) -> Result<Option<i64>, StorageError>;

    /// List every document's id and title, ordered by id.
    async fn list(&self) -> Result<Vec<DocumentSummary>, StorageError>;

    /// Load every document with its embedding, ordered by id.
    async fn all_with_embeddings(&self) -> Result<Vec<StoredDocument>, StorageError>;

    /// Number of stored documents.
    async fn count(&self) -> Result<usize, StorageError>;

    /// Length of the stored embeddings, or `None` when the store is empty.
    async fn embedding_dims(&self) -> Result<Option<usize>, StorageError>;

    /// Remove every document. Returns how many were deleted.
    async fn clear(&self) -> Result<u64, StorageError>;
}
