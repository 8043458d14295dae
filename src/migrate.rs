use anyhow::Result;
use sqlx::SqlitePool;

/// Create the schema if it does not exist yet. Safe to run on every startup;
/// existing documents are left untouched.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    // AUTOINCREMENT keeps ids monotonic: a deleted id is never handed out again.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            content TEXT NOT NULL,
            embedding BLOB NOT NULL,
            dims INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
