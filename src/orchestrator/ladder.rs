use serde::{Deserialize, Serialize};

use crate::scoring::SearchResult;

/// Results surviving one rung of the threshold ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdBucket {
    pub threshold: f32,
    /// Matches at this rung before truncation to `top_k`.
    pub results_count: usize,
    pub results: Vec<SearchResult>,
}

/// Highest rung with at least `top_k` matches, else the lowest rung.
pub(crate) fn select_primary(
    buckets: &[ThresholdBucket],
    top_k: usize,
) -> Option<&ThresholdBucket> {
    buckets
        .iter()
        .find(|b| b.results_count >= top_k)
        .or_else(|| buckets.last())
}
