// Reciprocal Rank Fusion (RRF)

use std::collections::HashMap;

use crate::db::models::SearchResult;

/// Default rank damping constant.
///
/// 60 is the value recommended by Cormack, Clarke and Buettcher (SIGIR 2009).
/// Smaller values let the top ranks dominate; larger values flatten them.
pub const RRF_K: f64 = 60.0;

/// Merge ranked result lists using RRF.
///
/// RRF_score(d) = sum over lists of 1 / (k + rank(d)), rank 1-indexed.
///
/// Results are de-duplicated by chunk id. The first occurrence supplies the
/// row, and its `similarity` is replaced with the fused score. Output is
/// sorted by fused score descending; equal scores keep first-seen order.
pub fn reciprocal_rank_fusion(lists: &[&[SearchResult]], k: f64) -> Vec<SearchResult> {
    let mut fused: Vec<SearchResult> = Vec::new();
    let mut position: HashMap<i64, usize> = HashMap::new();

    for list in lists {
        for (rank, result) in list.iter().enumerate() {
            let contribution = 1.0 / (k + (rank + 1) as f64);
            match position.get(&result.chunk_id) {
                Some(&idx) => fused[idx].similarity += contribution,
                None => {
                    position.insert(result.chunk_id, fused.len());
                    let mut row = result.clone();
                    row.similarity = contribution;
                    fused.push(row);
                }
            }
        }
    }

    // Stable: ties stay in first-seen order
    fused.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    fused
}
