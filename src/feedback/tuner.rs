use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::config::{ConfigError, check_unit_interval};
use crate::orchestrator::CandidateScore;

use super::buffer::FeedbackBuffer;
use super::model::Polarity;
use super::query_log::QueryLog;
use super::thresholds::{ThresholdConfig, ThresholdStore};

pub const DEFAULT_TUNER_BATCH_SIZE: usize = 100;
pub const DEFAULT_TUNER_INTERVAL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_STEP: f32 = 0.05;

/// Inclusive range a threshold is kept within.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThresholdBounds {
    pub min: f32,
    pub max: f32,
}

impl ThresholdBounds {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        check_unit_interval(name, self.min)?;
        check_unit_interval(name, self.max)?;
        if self.min > self.max {
            return Err(ConfigError::out_of_range(name, "min exceeds max"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TunerConfig {
    /// Records that wake the tuner before its interval elapses.
    pub batch_size: usize,
    pub interval: Duration,
    /// Largest change applied to any threshold in one run.
    pub max_step: f32,
    /// Distance to each side of the current value that is evaluated.
    pub probe_step: f32,
    pub similarity_bounds: ThresholdBounds,
    pub confidence_bounds: ThresholdBounds,
    pub relevance_bounds: ThresholdBounds,
    /// Cost of admitting one negative signal relative to gaining one positive.
    pub negative_weight: f32,
    /// Weight of click, dwell and refinement signals; explicit ratings weigh `1.0`.
    pub implicit_weight: f32,
    /// Dwell time that counts as engagement.
    pub dwell_cutoff: Duration,
    /// Attributed signals needed before any threshold moves.
    pub min_signals: usize,
}

impl Default for TunerConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_TUNER_BATCH_SIZE,
            interval: DEFAULT_TUNER_INTERVAL,
            max_step: DEFAULT_MAX_STEP,
            probe_step: DEFAULT_MAX_STEP,
            similarity_bounds: ThresholdBounds::new(0.3, 0.95),
            confidence_bounds: ThresholdBounds::new(0.2, 1.0),
            relevance_bounds: ThresholdBounds::new(0.05, 0.9),
            negative_weight: 1.0,
            implicit_weight: 0.5,
            dwell_cutoff: Duration::from_secs(10),
            min_signals: 10,
        }
    }
}

impl TunerConfig {
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn max_step(mut self, max_step: f32) -> Self {
        self.max_step = max_step;
        self
    }

    pub fn probe_step(mut self, probe_step: f32) -> Self {
        self.probe_step = probe_step;
        self
    }

    pub fn similarity_bounds(mut self, min: f32, max: f32) -> Self {
        self.similarity_bounds = ThresholdBounds::new(min, max);
        self
    }

    pub fn min_signals(mut self, min_signals: usize) -> Self {
        self.min_signals = min_signals;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::out_of_range(
                "tuner batch_size",
                "must be at least 1",
            ));
        }
        if self.interval.is_zero() {
            return Err(ConfigError::out_of_range(
                "tuner interval",
                "must be non-zero",
            ));
        }
        if !(self.max_step > 0.0 && self.max_step <= 1.0) {
            return Err(ConfigError::out_of_range("tuner max_step", "must be in (0, 1]"));
        }
        if !(self.probe_step > 0.0 && self.probe_step <= 1.0) {
            return Err(ConfigError::out_of_range(
                "tuner probe_step",
                "must be in (0, 1]",
            ));
        }
        self.similarity_bounds.validate("similarity bounds")?;
        self.confidence_bounds.validate("confidence bounds")?;
        self.relevance_bounds.validate("relevance bounds")?;
        if !(self.negative_weight >= 0.0 && self.implicit_weight >= 0.0) {
            return Err(ConfigError::out_of_range(
                "tuner signal weights",
                "must be non-negative",
            ));
        }
        Ok(())
    }

    pub(crate) fn dwell_cutoff_secs(&self) -> f32 {
        self.dwell_cutoff.as_secs_f32()
    }
}

/// Result of one tuning pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TuningReport {
    pub records: usize,
    /// Records whose `(query_id, item_id)` was found in the query log.
    pub attributed: usize,
    pub previous: ThresholdConfig,
    /// Set when new thresholds were published.
    pub published: Option<ThresholdConfig>,
}

struct Signal {
    score: CandidateScore,
    weight: f32,
    polarity: Polarity,
}

/// Nudges thresholds toward the value that best separates positive from negative feedback.
///
/// For a threshold `t` over score `s` the objective is
/// `J(t) = sum(w, positive, s >= t) - negative_weight * sum(w, negative, s >= t)`.
/// Each run evaluates `t - probe_step`, `t` and `t + probe_step`, moves toward the best
/// (staying put on ties) by at most `max_step`, and clamps to the bounds.
pub struct ThresholdTuner {
    config: TunerConfig,
    buffer: Arc<FeedbackBuffer>,
    query_log: QueryLog,
    store: Arc<ThresholdStore>,
}

impl std::fmt::Debug for ThresholdTuner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThresholdTuner")
            .field("config", &self.config)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

impl ThresholdTuner {
    pub fn new(
        config: TunerConfig,
        buffer: Arc<FeedbackBuffer>,
        query_log: QueryLog,
        store: Arc<ThresholdStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            buffer,
            query_log,
            store,
        })
    }

    pub fn config(&self) -> &TunerConfig {
        &self.config
    }

    /// Consumes the buffered batch and publishes adjusted thresholds if any moved.
    #[instrument(skip(self))]
    pub fn run_once(&self) -> TuningReport {
        let batch = self.buffer.drain();
        let previous = self.store.snapshot();
        let cutoff = self.config.dwell_cutoff_secs();

        let signals: Vec<Signal> = batch
            .iter()
            .filter_map(|record| {
                let score = self.query_log.score(&record.query_id, &record.item_id)?;
                let weight = if record.signal.is_explicit() {
                    1.0
                } else {
                    self.config.implicit_weight
                };
                Some(Signal {
                    score,
                    weight,
                    polarity: record.polarity(cutoff),
                })
            })
            .collect();

        let mut report = TuningReport {
            records: batch.len(),
            attributed: signals.len(),
            previous,
            published: None,
        };

        if signals.len() < self.config.min_signals.max(1) {
            debug!(
                records = report.records,
                attributed = report.attributed,
                "Not enough attributed feedback to tune"
            );
            return report;
        }

        let next = ThresholdConfig {
            similarity: self.nudge(
                previous.similarity,
                self.config.similarity_bounds,
                &signals,
                |s| s.raw_similarity,
            ),
            confidence: self.nudge(
                previous.confidence,
                self.config.confidence_bounds,
                &signals,
                |s| s.stability,
            ),
            relevance: self.nudge(
                previous.relevance,
                self.config.relevance_bounds,
                &signals,
                |s| s.final_score,
            ),
            generation: previous.generation,
        };

        if next.same_values(&previous) {
            debug!(attributed = report.attributed, "Thresholds unchanged");
            return report;
        }

        match self.store.publish(next) {
            Ok(published) => {
                info!(
                    records = report.records,
                    attributed = report.attributed,
                    similarity_from = previous.similarity,
                    similarity_to = published.similarity,
                    "Tuner adjusted thresholds"
                );
                report.published = Some(published);
            }
            Err(e) => warn!(error = %e, "Tuner produced invalid thresholds"),
        }
        report
    }

    fn nudge(
        &self,
        current: f32,
        bounds: ThresholdBounds,
        signals: &[Signal],
        score_of: impl Fn(&CandidateScore) -> f32,
    ) -> f32 {
        let objective = |t: f32| -> f32 {
            signals
                .iter()
                .filter(|s| score_of(&s.score) >= t)
                .map(|s| match s.polarity {
                    Polarity::Positive => s.weight,
                    Polarity::Negative => -self.config.negative_weight * s.weight,
                })
                .sum()
        };

        let step = self.config.probe_step;
        let here = objective(current);
        let down = objective((current - step).max(bounds.min));
        let up = objective((current + step).min(bounds.max));

        let target = if down > here && down > up {
            current - step
        } else if up > here && up > down {
            current + step
        } else {
            current
        };

        let delta = (target - current).clamp(-self.config.max_step, self.config.max_step);
        (current + delta).clamp(bounds.min, bounds.max)
    }
}
