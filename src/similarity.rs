//! Cosine similarity over dense embedding vectors.

use crate::error::{EngineError, Result};

/// Compute the cosine similarity of two equal-length vectors.
///
/// Returns a value in `[-1.0, 1.0]`. A zero-magnitude vector on either side
/// yields `0.0` rather than `NaN`. Vectors of different lengths are a caller
/// bug and fail with [`EngineError::DimensionMismatch`].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64> {
    if a.len() != b.len() {
        return Err(EngineError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    // Rounding can push identical vectors a hair past 1.0.
    Ok((dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0))
}
