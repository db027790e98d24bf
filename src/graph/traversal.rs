//! "Related content" lookups over the persisted edge table.

use std::collections::HashMap;

use crate::db::models::RelatedChunk;
use crate::error::Result;
use crate::search::{validate_limit, validate_threshold};
use crate::store::CorpusStore;

#[derive(Debug, Clone, Default)]
pub struct RelatedOptions {
    /// `None` returns every match.
    pub limit: Option<usize>,
    pub min_similarity: Option<f64>,
    /// Also return chunks that belong to the queried item.
    pub include_within_video: bool,
}

/// Chunks related to any chunk of `item_id`, most similar first.
///
/// Targets reached from several of the item's chunks appear once, with the
/// highest similarity. Unknown items, items without chunks and items without
/// edges all yield an empty list.
pub fn related_chunks(
    store: &dyn CorpusStore,
    item_id: i64,
    options: &RelatedOptions,
) -> Result<Vec<RelatedChunk>> {
    if let Some(limit) = options.limit {
        validate_limit(limit)?;
    }
    if let Some(min) = options.min_similarity {
        validate_threshold("min_similarity", min)?;
    }

    let chunk_ids = store.find_chunk_ids_by_item(item_id)?;
    if chunk_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut related: Vec<RelatedChunk> = Vec::new();
    let mut seen: HashMap<i64, usize> = HashMap::new();

    for edge in store.find_edges_from(&chunk_ids)? {
        let target = edge.target;
        if !options.include_within_video && target.item.id == item_id {
            continue;
        }
        if options.min_similarity.is_some_and(|min| target.similarity < min) {
            continue;
        }

        match seen.get(&target.chunk_id) {
            Some(&idx) => {
                if target.similarity > related[idx].similarity {
                    related[idx] = target;
                }
            }
            None => {
                seen.insert(target.chunk_id, related.len());
                related.push(target);
            }
        }
    }

    related.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    if let Some(limit) = options.limit {
        related.truncate(limit);
    }
    Ok(related)
}
