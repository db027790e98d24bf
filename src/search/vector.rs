//! Brute-force cosine ranking over stored chunk embeddings.

use crate::db::models::EmbeddedChunk;
use crate::error::Result;
use crate::similarity::cosine_similarity;

/// Default minimum cosine similarity for vector hits.
pub const DEFAULT_VECTOR_THRESHOLD: f64 = 0.3;

/// Score every chunk against `query` and keep the best `limit` at or above
/// `threshold`, as `(chunk_id, similarity)` pairs sorted descending.
///
/// A stored embedding whose length differs from the query's is an error.
pub fn rank_by_similarity(
    query: &[f32],
    chunks: &[EmbeddedChunk],
    threshold: f64,
    limit: usize,
) -> Result<Vec<(i64, f64)>> {
    let mut scored = Vec::new();
    for chunk in chunks {
        let similarity = cosine_similarity(query, &chunk.embedding)?;
        if similarity >= threshold {
            scored.push((chunk.id, similarity));
        }
    }

    scored.sort_by(|a, b| b.1.total_cmp(&a.1));
    scored.truncate(limit);
    Ok(scored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;

    fn chunk(id: i64, embedding: Vec<f32>) -> EmbeddedChunk {
        EmbeddedChunk {
            id,
            item_id: 1,
            embedding,
        }
    }

    #[test]
    fn test_ranks_descending() {
        let chunks = vec![
            chunk(1, vec![0.6, 0.8]),
            chunk(2, vec![1.0, 0.0]),
            chunk(3, vec![0.8, 0.6]),
        ];
        let ranked = rank_by_similarity(&[1.0, 0.0], &chunks, 0.0, 10).unwrap();
        let ids: Vec<i64> = ranked.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert!((ranked[0].1 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_excludes_weak_matches() {
        let chunks = vec![
            chunk(1, vec![1.0, 0.0]),
            chunk(2, vec![0.0, 1.0]),
            chunk(3, vec![-1.0, 0.0]),
        ];
        let ranked = rank_by_similarity(&[1.0, 0.0], &chunks, 0.3, 10).unwrap();
        assert_eq!(ranked.len(), 1);
        assert!(ranked.iter().all(|(_, s)| *s >= 0.3));
    }

    #[test]
    fn test_respects_limit() {
        let chunks: Vec<_> = (0..20).map(|i| chunk(i, vec![1.0, i as f32 * 0.01])).collect();
        let ranked = rank_by_similarity(&[1.0, 0.0], &chunks, 0.3, 5).unwrap();
        assert_eq!(ranked.len(), 5);
        assert_eq!(ranked[0].0, 0);
    }

    #[test]
    fn test_empty_corpus() {
        assert!(rank_by_similarity(&[1.0], &[], 0.3, 10).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch_propagates() {
        let chunks = vec![chunk(1, vec![1.0, 0.0, 0.0])];
        let err = rank_by_similarity(&[1.0, 0.0], &chunks, 0.3, 10).unwrap_err();
        assert!(matches!(err, EngineError::DimensionMismatch { .. }));
    }
}
