use crate::config::{ConfigError, check_unit_interval};

/// Thresholds walked by a multi-threshold search, strictest first.
pub const DEFAULT_THRESHOLD_LADDER: [f32; 7] = [0.5, 0.4, 0.3, 0.25, 0.2, 0.15, 0.1];

pub const DEFAULT_AGGRESSIVE_FLOOR: f32 = 0.1;
pub const DEFAULT_TOP_K_MULTIPLIER: usize = 2;
pub const DEFAULT_STABILITY_RUNS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorConfig {
    /// Similarity prefilter used by the aggressive fallback.
    pub aggressive_similarity_floor: f32,
    /// Relevance floor used by the aggressive fallback.
    pub aggressive_relevance_floor: f32,
    /// `top_k` multiplier for the aggressive fallback.
    pub aggressive_top_k_multiplier: usize,
    /// Total stability runs, the first one on the unperturbed query.
    pub stability_runs: usize,
    /// Max absolute per-component perturbation before renormalization.
    pub stability_noise: f32,
    /// Max variance of an item's final score across the runs it appeared in.
    pub max_score_variance: f32,
    pub threshold_ladder: Vec<f32>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            aggressive_similarity_floor: DEFAULT_AGGRESSIVE_FLOOR,
            aggressive_relevance_floor: DEFAULT_AGGRESSIVE_FLOOR,
            aggressive_top_k_multiplier: DEFAULT_TOP_K_MULTIPLIER,
            stability_runs: DEFAULT_STABILITY_RUNS,
            stability_noise: 0.02,
            max_score_variance: 0.01,
            threshold_ladder: DEFAULT_THRESHOLD_LADDER.to_vec(),
        }
    }
}

impl OrchestratorConfig {
    pub fn aggressive_floor(mut self, similarity: f32, relevance: f32) -> Self {
        self.aggressive_similarity_floor = similarity;
        self.aggressive_relevance_floor = relevance;
        self
    }

    pub fn aggressive_top_k_multiplier(mut self, multiplier: usize) -> Self {
        self.aggressive_top_k_multiplier = multiplier;
        self
    }

    pub fn stability(mut self, runs: usize, noise: f32, max_variance: f32) -> Self {
        self.stability_runs = runs;
        self.stability_noise = noise;
        self.max_score_variance = max_variance;
        self
    }

    pub fn threshold_ladder(mut self, ladder: Vec<f32>) -> Self {
        self.threshold_ladder = ladder;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit_interval(
            "aggressive_similarity_floor",
            self.aggressive_similarity_floor,
        )?;
        check_unit_interval("aggressive_relevance_floor", self.aggressive_relevance_floor)?;
        if self.aggressive_top_k_multiplier == 0 {
            return Err(ConfigError::out_of_range(
                "aggressive_top_k_multiplier",
                "must be at least 1",
            ));
        }
        if self.stability_runs == 0 {
            return Err(ConfigError::out_of_range(
                "stability_runs",
                "must be at least 1",
            ));
        }
        if !(0.0..1.0).contains(&self.stability_noise) {
            return Err(ConfigError::out_of_range(
                "stability_noise",
                "must be in [0, 1)",
            ));
        }
        if !self.max_score_variance.is_finite() || self.max_score_variance < 0.0 {
            return Err(ConfigError::out_of_range(
                "max_score_variance",
                "must be a non-negative number",
            ));
        }
        if self.threshold_ladder.is_empty() {
            return Err(ConfigError::out_of_range(
                "threshold_ladder",
                "must contain at least one threshold",
            ));
        }
        for &rung in &self.threshold_ladder {
            check_unit_interval("threshold_ladder", rung)?;
        }
        if self.threshold_ladder.windows(2).any(|w| w[0] <= w[1]) {
            return Err(ConfigError::out_of_range(
                "threshold_ladder",
                "must be strictly decreasing",
            ));
        }
        Ok(())
    }
}
