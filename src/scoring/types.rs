use serde::{Deserialize, Serialize};

use crate::index::ItemMetadata;

/// Attributes of the query item used for metadata-agreement bonuses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueryMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl QueryMetadata {
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.brand.is_none() && self.category.is_none()
    }
}

/// One ranked match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub item_id: String,
    /// Cosine similarity from the index.
    pub raw_similarity: f32,
    /// Score after metadata bonuses and quality penalty.
    pub final_score: f32,
    /// Fraction of stability runs the item appeared in (`1.0` outside stability checks).
    pub stability: f32,
    pub metadata: ItemMetadata,
}

/// Orders by `final_score` descending, then `item_id` ascending.
pub fn sort_results(results: &mut [SearchResult]) {
    results.sort_by(|a, b| {
        b.final_score
            .total_cmp(&a.final_score)
            .then_with(|| a.item_id.cmp(&b.item_id))
    });
}
