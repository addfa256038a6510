//! Metadata-aware rescoring of index candidates.
//!
//! `final_score = w_sim * raw + brand_bonus * [brand match] + category_bonus * [category match]
//! - quality_penalty * max(0, quality_floor - image_quality_score)`.
//!
//! Scores are not clamped: a strong match with both bonuses may exceed `1.0`.

pub mod config;
pub mod reranker;
pub mod types;

#[cfg(test)]
mod tests;

pub use config::RerankerConfig;
pub use reranker::{RerankParams, Reranker};
pub use types::{QueryMetadata, SearchResult, sort_results};
