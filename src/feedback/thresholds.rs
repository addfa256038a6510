use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{ConfigError, check_unit_interval};
use crate::constants::DEFAULT_MIN_SIMILARITY;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.5;
pub const DEFAULT_RELEVANCE_THRESHOLD: f32 = 0.25;

/// Process-wide search thresholds.
///
/// `generation` increases with every publication and takes part in search cache keys,
/// so cached results never outlive the thresholds they were computed under.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Minimum raw cosine similarity for a candidate to be scored.
    pub similarity: f32,
    /// Minimum fraction of stability runs a result must appear in.
    pub confidence: f32,
    /// Minimum final score after bonuses and penalties.
    pub relevance: f32,
    pub generation: u64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            similarity: DEFAULT_MIN_SIMILARITY,
            confidence: DEFAULT_CONFIDENCE_THRESHOLD,
            relevance: DEFAULT_RELEVANCE_THRESHOLD,
            generation: 0,
        }
    }
}

impl ThresholdConfig {
    pub fn with_similarity(mut self, similarity: f32) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_relevance(mut self, relevance: f32) -> Self {
        self.relevance = relevance;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit_interval("similarity threshold", self.similarity)?;
        check_unit_interval("confidence threshold", self.confidence)?;
        check_unit_interval("relevance threshold", self.relevance)?;
        Ok(())
    }

    /// True when the threshold values (not the generation) are equal.
    pub fn same_values(&self, other: &ThresholdConfig) -> bool {
        self.similarity == other.similarity
            && self.confidence == other.confidence
            && self.relevance == other.relevance
    }
}

/// Holder of the current [`ThresholdConfig`]; readers take a copy per query.
#[derive(Debug)]
pub struct ThresholdStore {
    current: RwLock<ThresholdConfig>,
}

impl ThresholdStore {
    pub fn new(initial: ThresholdConfig) -> Result<Self, ConfigError> {
        initial.validate()?;
        Ok(Self {
            current: RwLock::new(initial),
        })
    }

    #[inline]
    pub fn snapshot(&self) -> ThresholdConfig {
        *self.current.read()
    }

    /// Replaces the threshold values and bumps the generation.
    pub fn publish(&self, next: ThresholdConfig) -> Result<ThresholdConfig, ConfigError> {
        next.validate()?;
        let mut current = self.current.write();
        let published = ThresholdConfig {
            generation: current.generation + 1,
            ..next
        };
        *current = published;

        info!(
            similarity = published.similarity,
            confidence = published.confidence,
            relevance = published.relevance,
            generation = published.generation,
            "Thresholds published"
        );
        Ok(published)
    }
}
