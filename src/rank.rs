//! Similarity-ranked retrieval.
//!
//! A brute-force scan: every stored embedding is compared against the query
//! vector and the best `top_k` are kept.
//!
//! 1. Score each record with [`cosine_similarity`].
//! 2. Stable-sort by score, descending. Ties keep scan (id) order.
//! 3. Truncate to `top_k`.
//!
//! Cost is O(n·d + n log n) per query, which is fine for the few hundred
//! documents the store is capped at and nothing more.

use crate::error::RagError;
use crate::models::{ScoredDocument, StoredDocument};
use crate::similarity::{cosine_similarity, DimensionMismatch};
use crate::store::Store;

/// Rank `records` against `query` and return at most `top_k` of them,
/// best first.
///
/// Returns an empty vector iff `records` is empty (or `top_k` is zero).
/// Fails if any record's embedding length differs from the query's.
pub fn rank(
    query: &[f32],
    records: Vec<StoredDocument>,
    top_k: usize,
) -> Result<Vec<ScoredDocument>, DimensionMismatch> {
    let mut scored = Vec::with_capacity(records.len());
    for record in records {
        let score = cosine_similarity(&record.embedding, query)?;
        scored.push(ScoredDocument {
            score,
            id: record.id,
            title: record.title,
            content: record.content,
        });
    }

    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(top_k);
    Ok(scored)
}

/// Load every stored document and rank it against `query`.
pub async fn retrieve(
    store: &dyn Store,
    query: &[f32],
    top_k: usize,
) -> Result<Vec<ScoredDocument>, RagError> {
    let records = store.all_with_embeddings().await?;
    if records.is_empty() {
        return Ok(Vec::new());
    }
    tracing::info!(
        documents = records.len(),
        "Calculating similarities against {} documents",
        records.len()
    );
    Ok(rank(query, records, top_k)?)
}
