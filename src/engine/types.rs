use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::CacheStats;
use crate::constants::DEFAULT_TOP_K;
use crate::feedback::{StatisticsSnapshot, ThresholdConfig};
use crate::orchestrator::{SearchState, SearchStrategy, ThresholdBucket};
use crate::scoring::{QueryMetadata, SearchResult};

use super::error::SearchError;

/// Largest `top_k` a single request may ask for.
pub const MAX_TOP_K: usize = 1_000;

/// Per-request search parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Overrides the published similarity threshold for this request.
    #[serde(default)]
    pub min_similarity: Option<f32>,
    #[serde(default)]
    pub strategy: SearchStrategy,
    #[serde(default)]
    pub query_metadata: Option<QueryMetadata>,
    #[serde(default)]
    pub department: Option<String>,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_similarity: None,
            strategy: SearchStrategy::default(),
            query_metadata: None,
            department: None,
        }
    }
}

impl SearchRequest {
    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn min_similarity(mut self, min_similarity: f32) -> Self {
        self.min_similarity = Some(min_similarity);
        self
    }

    pub fn strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn query_metadata(mut self, metadata: QueryMetadata) -> Self {
        self.query_metadata = Some(metadata);
        self
    }

    pub fn department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if self.top_k == 0 || self.top_k > MAX_TOP_K {
            return Err(SearchError::invalid(format!(
                "top_k must be in 1..={MAX_TOP_K}, got {}",
                self.top_k
            )));
        }
        if let Some(min) = self.min_similarity
            && !(0.0..=1.0).contains(&min)
        {
            return Err(SearchError::invalid(format!(
                "min_similarity must be in [0, 1], got {min}"
            )));
        }
        Ok(())
    }

    /// Thresholds this request runs under, given the published ones.
    pub fn effective_thresholds(&self, published: ThresholdConfig) -> ThresholdConfig {
        match self.min_similarity {
            Some(similarity) => published.with_similarity(similarity),
            None => published,
        }
    }

    pub(crate) fn query_metadata_ref(&self) -> Option<&QueryMetadata> {
        self.query_metadata.as_ref().filter(|m| !m.is_empty())
    }

    pub(crate) fn department_ref(&self) -> Option<&str> {
        self.department
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResponse {
    /// Identifier to attach feedback to.
    pub query_id: Uuid,
    pub results: Vec<SearchResult>,
    pub strategy: SearchStrategy,
    pub state: SearchState,
    /// The aggressive step produced these results.
    pub fallback: bool,
    /// Served from the search cache (or a concurrent identical search).
    pub cached: bool,
    pub thresholds: ThresholdConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Vec<ThresholdBucket>>,
}

impl SearchResponse {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Items that could not be ingested in a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    pub item_id: String,
    pub error: SearchError,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchReport {
    pub ingested: usize,
    pub failures: Vec<ItemFailure>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexStats {
    pub variant: &'static str,
    pub dimension: usize,
    pub items: usize,
    pub generation: u64,
    pub trained: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineStats {
    pub searches: StatisticsSnapshot,
    pub index: IndexStats,
    pub feature_cache: CacheStats,
    pub search_cache: CacheStats,
    pub thresholds: ThresholdConfig,
    pub feedback_buffered: usize,
    pub extractions: u64,
    pub index_searches: u64,
}
