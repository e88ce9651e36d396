use super::fetcher::ArticleMetrics;

/// The four derived popularity indices.
///
/// Pure functions of the six raw counters; recomputed whenever counters
/// change. Values are unbounded non-negative floats and are comparable
/// only between articles scored with the same formulas; there is no
/// normalization against corpus statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Scores {
    pub engagement_rate: f64,
    pub virality_index: f64,
    pub content_value_index: f64,
    pub heat_score: f64,
}

/// Computes all four indices from raw counters.
///
/// The read count is clamped to at least 1 so a zero-read article scores
/// zero everywhere instead of dividing by zero.
pub fn compute_scores(metrics: &ArticleMetrics) -> Scores {
    let read = metrics.read_count.max(1) as f64;
    let likes = metrics.like_count.max(0) as f64;
    let wow = metrics.wow_count.max(0) as f64;
    let comments = metrics.comment_count.max(0) as f64;
    let shares = metrics.share_count.max(0) as f64;
    let favorites = metrics.favorite_count.max(0) as f64;

    Scores {
        // Interaction per thousand reads
        engagement_rate: (likes + wow) / read * 1000.0,
        // Shares weighted double; "wow" reactions signal onward spread
        virality_index: (shares * 2.0 + wow) / read * 1000.0,
        // Saves weighted double over comments
        content_value_index: (favorites * 2.0 + comments) / read * 1000.0,
        // Weighted composite of every counter, per hundred reads
        heat_score: (likes + wow * 2.0 + comments * 3.0 + favorites * 4.0 + shares * 5.0)
            / read
            * 100.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(
        read: i64,
        like: i64,
        wow: i64,
        comment: i64,
        share: i64,
        favorite: i64,
    ) -> ArticleMetrics {
        ArticleMetrics {
            read_count: read,
            like_count: like,
            wow_count: wow,
            comment_count: comment,
            share_count: share,
            favorite_count: favorite,
            is_simulated: false,
        }
    }

    #[test]
    fn test_reference_vector() {
        let scores = compute_scores(&metrics(1000, 50, 20, 5, 15, 10));
        assert_eq!(scores.engagement_rate, 70.0);
        assert_eq!(scores.virality_index, 50.0);
        assert_eq!(scores.content_value_index, 25.0);
        assert_eq!(scores.heat_score, 22.0);
    }

    #[test]
    fn test_zero_reads_clamped() {
        let scores = compute_scores(&metrics(0, 10, 0, 0, 0, 0));
        // Denominator clamps to 1: 10 likes over 1 read
        assert_eq!(scores.engagement_rate, 10_000.0);
        assert_eq!(scores.heat_score, 1_000.0);
    }

    #[test]
    fn test_all_zero_counters() {
        let scores = compute_scores(&metrics(0, 0, 0, 0, 0, 0));
        assert_eq!(scores, Scores::default());
    }

    #[test]
    fn test_negative_counters_treated_as_zero() {
        let scores = compute_scores(&metrics(1000, -5, -1, 0, 0, 0));
        assert_eq!(scores.engagement_rate, 0.0);
        assert_eq!(scores.heat_score, 0.0);
    }

    #[test]
    fn test_recomputation_is_consistent() {
        let m = metrics(12345, 678, 90, 12, 34, 56);
        assert_eq!(compute_scores(&m), compute_scores(&m));
    }
}
