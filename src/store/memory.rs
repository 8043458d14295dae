//! In-memory [`Store`] implementation for testing and library use.
//!
//! Documents live in a `Vec` behind a `std::sync::RwLock`. Ids come from a
//! counter that is not reset by [`Store::clear`].

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::models::{DocumentSummary, StoredDocument};

use super::Store;

struct Inner {
    next_id: i64,
    docs: Vec<StoredDocument>,
}

impl Inner {
    fn push(&mut self, title: &str, content: &str, embedding: &[f32]) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        self.docs.push(StoredDocument {
            id,
            title: title.to_string(),
            content: content.to_string(),
            embedding: embedding.to_vec(),
        });
        id
    }
}

/// In-memory document store.
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_id: 1,
                docs: Vec::new(),
            }),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::Backend("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert(
        &self,
        title: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<i64, StorageError> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        Ok(inner.push(title, content, embedding))
    }

    async fn insert_capped(
        &self,
        title: &str,
        content: &str,
        embedding: &[f32],
        max_docs: usize,
    ) -> Result<Option<i64>, StorageError> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        if inner.docs.len() >= max_docs {
            return Ok(None);
        }
        Ok(Some(inner.push(title, content, embedding)))
    }

    async fn list(&self) -> Result<Vec<DocumentSummary>, StorageError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .docs
            .iter()
            .map(|d| DocumentSummary {
                id: d.id,
                title: d.title.clone(),
            })
            .collect())
    }

    async fn all_with_embeddings(&self) -> Result<Vec<StoredDocument>, StorageError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.docs.clone())
    }

    async fn count(&self) -> Result<usize, StorageError> {
        Ok(self.inner.read().map_err(poisoned)?.docs.len())
    }

    async fn embedding_dims(&self) -> Result<Option<usize>, StorageError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.docs.first().map(|d| d.embedding.len()))
    }

    async fn clear(&self) -> Result<u64, StorageError> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let removed = inner.docs.len() as u64;
        inner.docs.clear();
        Ok(removed)
    }
}
