//! Cosine similarity over embedding vectors.

use crate::error::{WorkspaceError, WorkspaceResult};

/// Dot product over the product of Euclidean norms.
///
/// Returns 0 when either vector has zero norm. Vectors of different lengths
/// are rejected with [`WorkspaceError::InvalidInput`].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> WorkspaceResult<f64> {
    if a.len() != b.len() {
        return Err(WorkspaceError::InvalidInput {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    // Rounding can push identical vectors a hair past 1
    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}
