use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::DEFAULT_TOP_K;
use crate::engine::SearchRequest;
use crate::feedback::SignalType;
use crate::index::ItemMetadata;
use crate::orchestrator::SearchStrategy;
use crate::scoring::QueryMetadata;

/// Query string of `POST /v1/search`; the body is the raw image.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchParams {
    pub top_k: Option<usize>,
    pub min_similarity: Option<f32>,
    pub strategy: Option<SearchStrategy>,
    pub department: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
}

impl SearchParams {
    pub fn into_request(self) -> SearchRequest {
        let metadata = QueryMetadata {
            brand: self.brand,
            category: self.category,
        };
        SearchRequest {
            top_k: self.top_k.unwrap_or(DEFAULT_TOP_K),
            min_similarity: self.min_similarity,
            strategy: self.strategy.unwrap_or_default(),
            query_metadata: (!metadata.is_empty()).then_some(metadata),
            department: self.department,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct IngestParams {
    #[serde(default)]
    pub replace: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub item_id: String,
    pub items: usize,
    pub generation: u64,
}

/// Catalog metadata upserts keyed by item id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetadataPayload {
    pub items: HashMap<String, ItemMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataResponse {
    pub updated: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackPayload {
    pub query_id: Uuid,
    pub item_id: String,
    pub signal: SignalType,
    pub value: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptedResponse {
    pub status: String,
}

/// Body of `POST /v1/index/train`. An empty body trains on buffered samples only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainPayload {
    #[serde(default)]
    pub vectors: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainResponse {
    pub samples: usize,
    pub variant: String,
    pub generation: u64,
    pub trained: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleResponse {
    pub buffered: usize,
}
