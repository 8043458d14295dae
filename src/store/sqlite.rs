//! SQLite-backed [`Store`] implementation.
//!
//! One `documents` table (see `migrate.rs`). Embeddings are stored as
//! little-endian `f32` BLOBs next to their dimensionality.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::embedding::{blob_to_vec, vec_to_blob};
use crate::error::StorageError;
use crate::migrate;
use crate::models::{DocumentSummary, StoredDocument};

use super::Store;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
    /// Serializes capped inserts from this process. Two pooled connections
    /// racing the same INSERT would otherwise hit `SQLITE_BUSY` on a stale
    /// WAL snapshot instead of waiting.
    write_gate: tokio::sync::Mutex<()>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Connect to the configured database and make sure the schema exists.
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let pool = db::connect(&config.db.path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert(
        &self,
        title: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<i64, StorageError> {
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "INSERT INTO documents (title, content, embedding, dims, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(title)
        .bind(content)
        .bind(vec_to_blob(embedding))
        .bind(embedding.len() as i64)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn insert_capped(
        &self,
        title: &str,
        content: &str,
        embedding: &[f32],
        max_docs: usize,
    ) -> Result<Option<i64>, StorageError> {
        let _guard = self.write_gate.lock().await;
        // One statement: the COUNT and the INSERT see the same table state.
        let now = chrono::Utc::now().timestamp();
        let result = sqlx::query(
            "INSERT INTO documents (title, content, embedding, dims, created_at) \
             SELECT ?, ?, ?, ?, ? WHERE (SELECT COUNT(*) FROM documents) < ?",
        )
        .bind(title)
        .bind(content)
        .bind(vec_to_blob(embedding))
        .bind(embedding.len() as i64)
        .bind(now)
        .bind(max_docs as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        Ok(Some(result.last_insert_rowid()))
    }

    async fn list(&self) -> Result<Vec<DocumentSummary>, StorageError> {
        let rows = sqlx::query("SELECT id, title FROM documents ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<DocumentSummary, StorageError> {
                Ok(DocumentSummary {
                    id: row.try_get("id")?,
                    title: row.try_get("title")?,
                })
            })
            .collect()
    }

    async fn all_with_embeddings(&self) -> Result<Vec<StoredDocument>, StorageError> {
        let rows =
            sqlx::query("SELECT id, title, content, embedding FROM documents ORDER BY id ASC")
                .fetch_all(&self.pool)
                .await?;

        rows.iter()
            .map(|row| -> Result<StoredDocument, StorageError> {
                let blob: Vec<u8> = row.try_get("embedding")?;
                Ok(StoredDocument {
                    id: row.try_get("id")?,
                    title: row.try_get("title")?,
                    content: row.try_get("content")?,
                    embedding: blob_to_vec(&blob),
                })
            })
            .collect()
    }

    async fn count(&self) -> Result<usize, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    async fn embedding_dims(&self) -> Result<Option<usize>, StorageError> {
        let dims: Option<i64> =
            sqlx::query_scalar("SELECT dims FROM documents ORDER BY id ASC LIMIT 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(dims.map(|d| d as usize))
    }

    async fn clear(&self) -> Result<u64, StorageError> {
        let result = sqlx::query("DELETE FROM documents")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn temp_store(tmp: &TempDir) -> SqliteStore {
        let mut config = Config::default();
        config.db.path = tmp.path().join("data").join("docs.db");
        SqliteStore::open(&config).await.unwrap()
    }

    #[tokio::test]
    async fn insert_and_read_back() {
        let tmp = TempDir::new().unwrap();
        let store = temp_store(&tmp).await;

        let id = store
            .insert("notes.md", "# Notes\nhello", &[0.25, -1.5, 3.0])
            .await
            .unwrap();
        assert_eq!(id, 1);
        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.embedding_dims().await.unwrap(), Some(3));

        let docs = store.all_with_embeddings().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].title, "notes.md");
        assert_eq!(docs[0].content, "# Notes\nhello");
        assert_eq!(docs[0].embedding, vec![0.25, -1.5, 3.0]);
    }

    #[tokio::test]
    async fn list_is_ordered_by_id() {
        let tmp = TempDir::new().unwrap();
        let store = temp_store(&tmp).await;
        for name in ["c.txt", "a.txt", "b.txt"] {
            store.insert(name, "text", &[1.0]).await.unwrap();
        }
        let titles: Vec<String> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.title)
            .collect();
        assert_eq!(titles, vec!["c.txt", "a.txt", "b.txt"]);
    }

    #[tokio::test]
    async fn clear_keeps_id_sequence() {
        let tmp = TempDir::new().unwrap();
        let store = temp_store(&tmp).await;
        store.insert("a.txt", "a", &[1.0]).await.unwrap();
        store.insert("b.txt", "b", &[1.0]).await.unwrap();

        assert_eq!(store.clear().await.unwrap(), 2);
        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(store.embedding_dims().await.unwrap(), None);

        let id = store.insert("c.txt", "c", &[1.0]).await.unwrap();
        assert_eq!(id, 3);
    }

    #[tokio::test]
    async fn capped_insert_stops_at_limit() {
        let tmp = TempDir::new().unwrap();
        let store = temp_store(&tmp).await;

        assert_eq!(
            store.insert_capped("a.txt", "a", &[1.0], 2).await.unwrap(),
            Some(1)
        );
        assert_eq!(
            store.insert_capped("b.txt", "b", &[1.0], 2).await.unwrap(),
            Some(2)
        );
        assert_eq!(store.insert_capped("c.txt", "c", &[1.0], 2).await.unwrap(), None);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn concurrent_capped_inserts_respect_limit() {
        let tmp = TempDir::new().unwrap();
        let store = std::sync::Arc::new(temp_store(&tmp).await);

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .insert_capped(&format!("doc{}.txt", i), "text", &[1.0], 3)
                    .await
                    .unwrap()
            }));
        }
        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 3);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn reopening_preserves_documents() {
        let tmp = TempDir::new().unwrap();
        {
            let store = temp_store(&tmp).await;
            store.insert("keep.txt", "persisted", &[1.0, 2.0]).await.unwrap();
            store.pool().close().await;
        }
        let store = temp_store(&tmp).await;
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
