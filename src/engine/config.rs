use std::time::Duration;

use crate::cache::CacheConfig;
use crate::config::ConfigError;
use crate::extraction::PipelineConfig;
use crate::feedback::{
    DEFAULT_QUERY_LOG_CAPACITY, DEFAULT_QUERY_LOG_TTL, ThresholdConfig, TunerConfig,
};
use crate::index::IndexConfig;
use crate::orchestrator::OrchestratorConfig;
use crate::scoring::RerankerConfig;

pub const DEFAULT_FEEDBACK_CAPACITY: usize = 10_000;
pub const DEFAULT_TRAINING_BUFFER_CAPACITY: usize = 10_000;
pub const DEFAULT_EXTRACTION_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_INDEX_TIMEOUT: Duration = Duration::from_secs(2);
pub const DEFAULT_INDEX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(25);

/// Configuration of every component a [`SearchEngine`](super::SearchEngine) owns.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub index: IndexConfig,
    pub pipeline: PipelineConfig,
    pub feature_cache: CacheConfig,
    pub search_cache: CacheConfig,
    pub reranker: RerankerConfig,
    pub orchestrator: OrchestratorConfig,
    /// Initial thresholds; the tuner publishes replacements.
    pub thresholds: ThresholdConfig,
    pub tuner: TunerConfig,
    pub feedback_capacity: usize,
    /// Extracted samples held for the next index training; the oldest is dropped when full.
    pub training_buffer_capacity: usize,
    pub query_log_capacity: u64,
    pub query_log_ttl: Duration,
    /// Budget for one feature extraction.
    pub extraction_timeout: Duration,
    /// Budget for one index search attempt.
    pub index_timeout: Duration,
    /// Index attempts before a timeout is surfaced.
    pub index_attempts: u32,
    /// Delay before retry `n` is `n * retry_backoff`.
    pub retry_backoff: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            index: IndexConfig::default(),
            pipeline: PipelineConfig::default(),
            feature_cache: CacheConfig::default(),
            search_cache: CacheConfig::default(),
            reranker: RerankerConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            thresholds: ThresholdConfig::default(),
            tuner: TunerConfig::default(),
            feedback_capacity: DEFAULT_FEEDBACK_CAPACITY,
            training_buffer_capacity: DEFAULT_TRAINING_BUFFER_CAPACITY,
            query_log_capacity: DEFAULT_QUERY_LOG_CAPACITY,
            query_log_ttl: DEFAULT_QUERY_LOG_TTL,
            extraction_timeout: DEFAULT_EXTRACTION_TIMEOUT,
            index_timeout: DEFAULT_INDEX_TIMEOUT,
            index_attempts: DEFAULT_INDEX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }
}

impl EngineConfig {
    pub fn index(mut self, index: IndexConfig) -> Self {
        self.index = index;
        self
    }

    pub fn pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn feature_cache(mut self, cache: CacheConfig) -> Self {
        self.feature_cache = cache;
        self
    }

    pub fn search_cache(mut self, cache: CacheConfig) -> Self {
        self.search_cache = cache;
        self
    }

    pub fn reranker(mut self, reranker: RerankerConfig) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn orchestrator(mut self, orchestrator: OrchestratorConfig) -> Self {
        self.orchestrator = orchestrator;
        self
    }

    pub fn thresholds(mut self, thresholds: ThresholdConfig) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn tuner(mut self, tuner: TunerConfig) -> Self {
        self.tuner = tuner;
        self
    }

    pub fn feedback_capacity(mut self, capacity: usize) -> Self {
        self.feedback_capacity = capacity;
        self
    }

    pub fn training_buffer_capacity(mut self, capacity: usize) -> Self {
        self.training_buffer_capacity = capacity;
        self
    }

    pub fn timeouts(mut self, extraction: Duration, index: Duration) -> Self {
        self.extraction_timeout = extraction;
        self.index_timeout = index;
        self
    }

    pub fn index_retries(mut self, attempts: u32, backoff: Duration) -> Self {
        self.index_attempts = attempts;
        self.retry_backoff = backoff;
        self
    }

    /// Checks the settings the engine owns directly; component configs validate
    /// themselves when their component is built.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.feedback_capacity == 0 {
            return Err(ConfigError::out_of_range(
                "feedback_capacity",
                "must be at least 1",
            ));
        }
        if self.training_buffer_capacity == 0 {
            return Err(ConfigError::out_of_range(
                "training_buffer_capacity",
                "must be at least 1",
            ));
        }
        if self.query_log_capacity == 0 || self.query_log_ttl.is_zero() {
            return Err(ConfigError::out_of_range(
                "query_log",
                "capacity and ttl must be non-zero",
            ));
        }
        if self.extraction_timeout.is_zero() || self.index_timeout.is_zero() {
            return Err(ConfigError::out_of_range(
                "timeouts",
                "must be non-zero",
            ));
        }
        if self.index_attempts == 0 {
            return Err(ConfigError::out_of_range(
                "index_attempts",
                "must be at least 1",
            ));
        }
        Ok(())
    }
}
