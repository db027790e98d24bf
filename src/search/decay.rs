//! Temporal decay re-ranking.

use chrono::{DateTime, Utc};

use crate::db::models::SearchResult;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Exponential half-life factor for something published at `published_at`.
///
/// Unknown dates are treated as fresh (factor 1.0), and so are dates in the
/// future.
pub fn decay_factor(
    published_at: Option<DateTime<Utc>>,
    half_life_days: f64,
    now: DateTime<Utc>,
) -> f64 {
    let Some(published_at) = published_at else {
        return 1.0;
    };
    let age_days = (now - published_at).num_seconds() as f64 / SECONDS_PER_DAY;
    0.5_f64.powf(age_days.max(0.0) / half_life_days)
}

/// Multiply every score by its decay factor, then re-sort descending.
///
/// The sort is stable, so equal decayed scores keep their prior order.
pub fn apply_temporal_decay(
    mut results: Vec<SearchResult>,
    half_life_days: f64,
    now: DateTime<Utc>,
) -> Vec<SearchResult> {
    for result in &mut results {
        result.similarity *= decay_factor(result.published_at, half_life_days, now);
    }
    results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn hit(chunk_id: i64, similarity: f64, published_at: Option<DateTime<Utc>>) -> SearchResult {
        SearchResult {
            chunk_id,
            content: String::new(),
            start_offset: None,
            end_offset: None,
            similarity,
            item_id: chunk_id,
            item_title: String::new(),
            source_name: None,
            external_id: chunk_id.to_string(),
            thumbnail: None,
            published_at,
        }
    }

    #[test]
    fn test_one_half_life_halves() {
        let now = Utc::now();
        let factor = decay_factor(Some(now - Duration::days(30)), 30.0, now);
        assert!((factor - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_two_half_lives_quarter() {
        let now = Utc::now();
        let factor = decay_factor(Some(now - Duration::days(730)), 365.0, now);
        assert!((factor - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_date_is_fresh() {
        assert_eq!(decay_factor(None, 365.0, Utc::now()), 1.0);
    }

    #[test]
    fn test_future_date_is_fresh() {
        let now = Utc::now();
        assert_eq!(decay_factor(Some(now + Duration::days(10)), 365.0, now), 1.0);
    }

    #[test]
    fn test_newer_item_ranks_first_after_decay() {
        let now = Utc::now();
        let old = hit(1, 0.8, Some(now - Duration::days(400)));
        let new = hit(2, 0.8, Some(now - Duration::days(1)));

        let decayed = apply_temporal_decay(vec![old, new], 365.0, now);
        assert_eq!(decayed[0].chunk_id, 2);
        assert_eq!(decayed[1].chunk_id, 1);
        assert!(decayed[1].similarity < 0.4);
    }

    #[test]
    fn test_decay_can_reverse_order() {
        let now = Utc::now();
        let strong_old = hit(1, 0.9, Some(now - Duration::days(365)));
        let weak_new = hit(2, 0.6, Some(now));

        let decayed = apply_temporal_decay(vec![strong_old, weak_new], 365.0, now);
        assert_eq!(decayed[0].chunk_id, 2);
        assert!((decayed[1].similarity - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_undated_results_untouched() {
        let decayed = apply_temporal_decay(vec![hit(1, 0.7, None)], 30.0, Utc::now());
        assert_eq!(decayed[0].similarity, 0.7);
    }
}
