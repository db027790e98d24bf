//! Item-level grouping of chunk hits.
//!
//! Ordering among items with equal scores follows first appearance in the
//! input and is not otherwise guaranteed.

use std::collections::HashMap;

use serde::Serialize;

use crate::db::models::SearchResult;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BestChunk {
    pub chunk_id: i64,
    pub content: String,
    pub start_offset: Option<f64>,
    pub similarity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedResult {
    pub item_id: i64,
    pub external_id: String,
    pub title: String,
    pub source_name: Option<String>,
    pub thumbnail: Option<String>,
    pub score: f64,
    pub matched_chunk_count: usize,
    pub best_chunk: BestChunk,
}

/// Group chunk hits by item: max score, hit count and best chunk per item.
///
/// The best chunk is the first one seen with the maximum similarity.
pub fn aggregate_by_video(results: &[SearchResult]) -> Vec<AggregatedResult> {
    let mut groups: Vec<AggregatedResult> = Vec::new();
    let mut index: HashMap<i64, usize> = HashMap::new();

    for result in results {
        match index.get(&result.item_id) {
            Some(&idx) => {
                let group = &mut groups[idx];
                group.matched_chunk_count += 1;
                if result.similarity > group.score {
                    group.score = result.similarity;
                    group.best_chunk = best_chunk(result);
                }
            }
            None => {
                index.insert(result.item_id, groups.len());
                groups.push(AggregatedResult {
                    item_id: result.item_id,
                    external_id: result.external_id.clone(),
                    title: result.item_title.clone(),
                    source_name: result.source_name.clone(),
                    thumbnail: result.thumbnail.clone(),
                    score: result.similarity,
                    matched_chunk_count: 1,
                    best_chunk: best_chunk(result),
                });
            }
        }
    }

    groups.sort_by(|a, b| b.score.total_cmp(&a.score));
    groups
}

fn best_chunk(result: &SearchResult) -> BestChunk {
    BestChunk {
        chunk_id: result.chunk_id,
        content: result.content.clone(),
        start_offset: result.start_offset,
        similarity: result.similarity,
    }
}
