use tracing::debug;

use crate::config::ConfigError;
use crate::index::{IndexHit, ItemMetadata};

use super::config::RerankerConfig;
use super::types::{QueryMetadata, SearchResult, sort_results};

/// Filters applied around scoring.
#[derive(Debug, Clone, Copy)]
pub struct RerankParams<'a> {
    /// Candidates with `raw_similarity` below this are dropped before scoring.
    pub similarity_floor: f32,
    /// Results with `final_score` below this are dropped after scoring.
    pub relevance_floor: f32,
    pub query: Option<&'a QueryMetadata>,
    /// Restrict to items in this department (case-insensitive).
    pub department: Option<&'a str>,
    /// Max results returned.
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct Reranker {
    config: RerankerConfig,
}

fn same_value(a: Option<&str>, b: Option<&str>) -> bool {
    match (a.map(str::trim), b.map(str::trim)) {
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => {
            a.to_lowercase() == b.to_lowercase()
        }
        _ => false,
    }
}

impl Reranker {
    pub fn new(config: RerankerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &RerankerConfig {
        &self.config
    }

    /// Deterministic final score for one candidate.
    pub fn score(
        &self,
        raw_similarity: f32,
        metadata: &ItemMetadata,
        query: Option<&QueryMetadata>,
    ) -> f32 {
        let c = &self.config;
        let mut score = c.similarity_weight * raw_similarity;

        if let Some(q) = query {
            if same_value(q.brand.as_deref(), metadata.brand.as_deref()) {
                score += c.brand_bonus;
            }
            if same_value(q.category.as_deref(), metadata.category.as_deref()) {
                score += c.category_bonus;
            }
        }
        if let Some(quality) = metadata.image_quality_score {
            score -= c.quality_penalty * (c.quality_floor - quality).max(0.0);
        }
        score
    }

    pub fn in_department(metadata: &ItemMetadata, department: Option<&str>) -> bool {
        department.is_none_or(|d| same_value(Some(d), metadata.department.as_deref()))
    }

    /// Prefilters, scores, post-filters and orders `hits`.
    pub fn rerank(&self, hits: &[IndexHit], params: &RerankParams<'_>) -> Vec<SearchResult> {
        let mut results: Vec<SearchResult> = hits
            .iter()
            .filter(|h| h.raw_similarity >= params.similarity_floor)
            .filter(|h| Self::in_department(&h.metadata, params.department))
            .map(|h| SearchResult {
                item_id: h.item_id.clone(),
                raw_similarity: h.raw_similarity,
                final_score: self.score(h.raw_similarity, &h.metadata, params.query),
                stability: 1.0,
                metadata: (*h.metadata).clone(),
            })
            .filter(|r| r.final_score >= params.relevance_floor)
            .collect();

        sort_results(&mut results);
        results.truncate(params.limit);

        debug!(
            candidates = hits.len(),
            kept = results.len(),
            similarity_floor = params.similarity_floor,
            best_score = results.first().map(|r| r.final_score),
            "Reranked candidates"
        );
        results
    }
}
