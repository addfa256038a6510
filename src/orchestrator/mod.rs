//! Search strategy state machine.
//!
//! A search starts in the state its [`SearchStrategy`] selects and follows
//! [`TRANSITIONS`] until it reaches `Done` or `Exhausted`:
//!
//! ```text
//! STANDARD ---------empty--> AGGRESSIVE --empty--> EXHAUSTED
//! STABILITY_CHECK --empty--> AGGRESSIVE
//! MULTI_THRESHOLD --empty--> EXHAUSTED
//! any step --found--> DONE
//! ```
//!
//! The aggressive step runs at most once: as the fallback after a step produced zero
//! results, or as the first step when the caller picks [`SearchStrategy::Aggressive`].

pub mod config;
pub mod ladder;
mod stability;
pub mod state;
pub mod types;

#[cfg(test)]
mod tests;

pub use config::{
    DEFAULT_AGGRESSIVE_FLOOR, DEFAULT_STABILITY_RUNS, DEFAULT_THRESHOLD_LADDER,
    DEFAULT_TOP_K_MULTIPLIER, OrchestratorConfig,
};
pub use ladder::ThresholdBucket;
pub use state::{SearchState, SearchStrategy, StepOutcome, TRANSITIONS, transition};
pub use types::{CandidateScore, SearchOutcome, SearchPlan};

use std::collections::HashMap;
use std::future::Future;

use tracing::{debug, instrument};

use crate::config::ConfigError;
use crate::engine::SearchError;
use crate::index::{FeatureVector, IndexHit, VectorIndex};
use crate::scoring::{RerankParams, Reranker, SearchResult};

use stability::StabilityTally;

/// Anything that can produce ranked index candidates for a query vector.
pub trait CandidateSource: Send + Sync {
    /// Returns up to `top_k * overfetch` hits, best first.
    fn candidates(
        &self,
        query: &FeatureVector,
        top_k: usize,
    ) -> impl Future<Output = Result<Vec<IndexHit>, SearchError>> + Send;
}

impl CandidateSource for VectorIndex {
    fn candidates(
        &self,
        query: &FeatureVector,
        top_k: usize,
    ) -> impl Future<Output = Result<Vec<IndexHit>, SearchError>> + Send {
        std::future::ready(self.search(query, top_k).map_err(SearchError::from))
    }
}

struct Step {
    results: Vec<SearchResult>,
    pool: Vec<IndexHit>,
    stability: HashMap<String, f32>,
    distribution: Option<Vec<ThresholdBucket>>,
}

impl Step {
    fn plain(results: Vec<SearchResult>, pool: Vec<IndexHit>) -> Self {
        Self {
            results,
            pool,
            stability: HashMap::new(),
            distribution: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchOrchestrator {
    config: OrchestratorConfig,
    reranker: Reranker,
}

impl SearchOrchestrator {
    pub fn new(config: OrchestratorConfig, reranker: Reranker) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, reranker })
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn reranker(&self) -> &Reranker {
        &self.reranker
    }

    /// Drives the state machine to a terminal state.
    ///
    /// An empty result set is a successful [`SearchOutcome`] in the `Exhausted` state.
    #[instrument(skip(self, source, plan), fields(strategy = %plan.strategy, top_k = plan.top_k))]
    pub async fn run<S: CandidateSource>(
        &self,
        source: &S,
        plan: &SearchPlan<'_>,
    ) -> Result<SearchOutcome, SearchError> {
        let mut state = SearchState::initial(plan.strategy);
        let mut path = vec![state];
        let mut pool: HashMap<String, IndexHit> = HashMap::new();
        let mut stability = HashMap::new();
        let mut distribution = None;
        let mut results = Vec::new();

        while !state.is_terminal() {
            let step = match state {
                SearchState::Standard => self.standard(source, plan).await?,
                SearchState::StabilityCheck => self.stability_check(source, plan).await?,
                SearchState::Aggressive => self.aggressive(source, plan).await?,
                SearchState::MultiThreshold => self.multi_threshold(source, plan).await?,
                SearchState::Done | SearchState::Exhausted => break,
            };

            let outcome = StepOutcome::of(&step.results);
            debug!(
                state = %state,
                candidates = step.pool.len(),
                results = step.results.len(),
                "Search step finished"
            );

            for hit in step.pool {
                pool.entry(hit.item_id.clone()).or_insert(hit);
            }
            stability.extend(step.stability);
            if step.distribution.is_some() {
                distribution = step.distribution;
            }
            results = step.results;

            state = transition(state, outcome);
            path.push(state);
        }

        let candidates = self.candidate_scores(pool, &stability, plan);
        Ok(SearchOutcome {
            results,
            state,
            path,
            distribution,
            candidates,
        })
    }

    fn params<'a>(&self, plan: &SearchPlan<'a>) -> RerankParams<'a> {
        RerankParams {
            similarity_floor: plan.thresholds.similarity,
            relevance_floor: plan.thresholds.relevance,
            query: plan.query_metadata,
            department: plan.department,
            limit: plan.top_k,
        }
    }

    async fn standard<S: CandidateSource>(
        &self,
        source: &S,
        plan: &SearchPlan<'_>,
    ) -> Result<Step, SearchError> {
        let pool = source.candidates(plan.query, plan.top_k).await?;
        let results = self.reranker.rerank(&pool, &self.params(plan));
        Ok(Step::plain(results, pool))
    }

    async fn stability_check<S: CandidateSource>(
        &self,
        source: &S,
        plan: &SearchPlan<'_>,
    ) -> Result<Step, SearchError> {
        let runs = self.config.stability_runs;
        let params = self.params(plan);
        let mut tally = StabilityTally::new(runs);
        let mut pool = Vec::new();

        for run in 0..runs {
            let query = stability::perturb(plan.query, run, self.config.stability_noise);
            let hits = source.candidates(&query, plan.top_k).await?;
            tally.record(self.reranker.rerank(&hits, &params));
            if run == 0 {
                pool = hits;
            }
        }

        let fractions = tally.fractions();
        let results = tally.finish(
            plan.thresholds.confidence,
            self.config.max_score_variance,
            plan.top_k,
        );
        debug!(
            runs,
            seen = fractions.len(),
            stable = results.len(),
            "Stability runs aggregated"
        );
        Ok(Step {
            results,
            pool,
            stability: fractions,
            distribution: None,
        })
    }

    async fn aggressive<S: CandidateSource>(
        &self,
        source: &S,
        plan: &SearchPlan<'_>,
    ) -> Result<Step, SearchError> {
        let top_k = plan
            .top_k
            .saturating_mul(self.config.aggressive_top_k_multiplier);
        let params = RerankParams {
            similarity_floor: self
                .config
                .aggressive_similarity_floor
                .min(plan.thresholds.similarity),
            relevance_floor: self
                .config
                .aggressive_relevance_floor
                .min(plan.thresholds.relevance),
            limit: top_k,
            ..self.params(plan)
        };

        let pool = source.candidates(plan.query, top_k).await?;
        let results = self.reranker.rerank(&pool, &params);
        Ok(Step::plain(results, pool))
    }

    async fn multi_threshold<S: CandidateSource>(
        &self,
        source: &S,
        plan: &SearchPlan<'_>,
    ) -> Result<Step, SearchError> {
        let pool = source.candidates(plan.query, plan.top_k).await?;
        let base = self.params(plan);

        let buckets: Vec<ThresholdBucket> = self
            .config
            .threshold_ladder
            .iter()
            .map(|&rung| {
                let params = RerankParams {
                    similarity_floor: rung,
                    relevance_floor: base.relevance_floor.min(rung),
                    limit: usize::MAX,
                    ..base
                };
                let mut results = self.reranker.rerank(&pool, &params);
                let results_count = results.len();
                results.truncate(plan.top_k);
                ThresholdBucket {
                    threshold: rung,
                    results_count,
                    results,
                }
            })
            .collect();

        let results = ladder::select_primary(&buckets, plan.top_k)
            .map(|b| b.results.clone())
            .unwrap_or_default();

        Ok(Step {
            results,
            pool,
            stability: HashMap::new(),
            distribution: Some(buckets),
        })
    }

    fn candidate_scores(
        &self,
        pool: HashMap<String, IndexHit>,
        stability: &HashMap<String, f32>,
        plan: &SearchPlan<'_>,
    ) -> Vec<(String, CandidateScore)> {
        let unseen = if plan.strategy == SearchStrategy::StabilityCheck {
            0.0
        } else {
            1.0
        };

        let mut scores: Vec<(String, CandidateScore)> = pool
            .into_values()
            .map(|hit| {
                let score = CandidateScore {
                    raw_similarity: hit.raw_similarity,
                    final_score: self.reranker.score(
                        hit.raw_similarity,
                        &hit.metadata,
                        plan.query_metadata,
                    ),
                    stability: stability.get(&hit.item_id).copied().unwrap_or(unseen),
                };
                (hit.item_id, score)
            })
            .collect();

        scores.sort_by(|a, b| {
            b.1.raw_similarity
                .total_cmp(&a.1.raw_similarity)
                .then_with(|| a.0.cmp(&b.0))
        });
        scores
    }
}
