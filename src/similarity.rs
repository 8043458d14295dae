//! Vector comparison.
//!
//! ```text
//!            a · b
//! cos(θ) = ─────────
//!          ‖a‖ × ‖b‖
//! ```
//!
//! Embeddings are stored as `f32`, but the dot product and norms are
//! accumulated in `f64` so long vectors do not lose precision.

use thiserror::Error;

/// Two vectors of different lengths were compared.
///
/// All embeddings in a store come from the same model, so this only happens
/// when the embedding model changed without the store being reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot compare vectors of length {left} and {right}")]
pub struct DimensionMismatch {
    pub left: usize,
    pub right: usize,
}

/// Cosine similarity between two equal-length vectors.
///
/// Returns a value in `[-1.0, 1.0]`. If either vector has zero norm
/// (including empty vectors) the result is `0.0`, so a zero vector is
/// treated as dissimilar to everything, itself included.
///
/// # Example
///
/// ```rust
/// use docsage::similarity::cosine_similarity;
///
/// let sim = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]).unwrap();
/// assert!((sim - 1.0).abs() < 1e-9);
/// assert!(cosine_similarity(&[1.0], &[1.0, 2.0]).is_err());
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, DimensionMismatch> {
    if a.len() != b.len() {
        return Err(DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}
