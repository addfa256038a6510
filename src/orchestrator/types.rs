use serde::{Deserialize, Serialize};

use crate::feedback::ThresholdConfig;
use crate::index::FeatureVector;
use crate::scoring::{QueryMetadata, SearchResult};

use super::ladder::ThresholdBucket;
use super::state::{SearchState, SearchStrategy};

/// Everything one orchestrated search needs besides the candidate source.
#[derive(Debug, Clone, Copy)]
pub struct SearchPlan<'a> {
    pub query: &'a FeatureVector,
    pub top_k: usize,
    pub strategy: SearchStrategy,
    /// Threshold snapshot taken when the request started.
    pub thresholds: &'a ThresholdConfig,
    pub query_metadata: Option<&'a QueryMetadata>,
    pub department: Option<&'a str>,
}

/// Scores of one candidate considered by a search, kept for feedback attribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub raw_similarity: f32,
    pub final_score: f32,
    pub stability: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    /// Terminal state: `Done` or `Exhausted`.
    pub state: SearchState,
    /// States visited, in order.
    pub path: Vec<SearchState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Vec<ThresholdBucket>>,
    /// Every candidate the index returned, best raw similarity first.
    #[serde(skip)]
    pub candidates: Vec<(String, CandidateScore)>,
}

impl SearchOutcome {
    pub fn is_exhausted(&self) -> bool {
        self.state == SearchState::Exhausted
    }

    pub fn used_fallback(&self) -> bool {
        self.path.contains(&SearchState::Aggressive)
    }

    pub fn best_similarity(&self) -> Option<f32> {
        self.results
            .iter()
            .map(|r| r.raw_similarity)
            .max_by(f32::total_cmp)
    }
}
