use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::orchestrator::{SearchOutcome, SearchStrategy};

use super::model::{FeedbackRecord, Polarity};

/// Receives every feedback record for offline analysis.
pub trait AnalyticsSink: Send + Sync + 'static {
    fn record(&self, record: &FeedbackRecord);
}

/// Emits each record as a structured `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl AnalyticsSink for TracingSink {
    fn record(&self, record: &FeedbackRecord) {
        info!(
            target: "lookalike::analytics",
            query_id = %record.query_id,
            item_id = %record.item_id,
            signal = record.signal.name(),
            value = record.value,
            "Feedback received"
        );
    }
}

#[derive(Debug, Default)]
struct Counters {
    searches: u64,
    successful: u64,
    empty: u64,
    fallbacks: u64,
    by_strategy: BTreeMap<&'static str, u64>,
    best_similarity_sum: f64,
    feedback: u64,
    user_failures: u64,
}

/// Running totals over searches and feedback.
#[derive(Debug)]
pub struct SearchStatistics {
    counters: Mutex<Counters>,
}

impl Default for SearchStatistics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsSnapshot {
    pub total_searches: u64,
    pub successful_searches: u64,
    pub empty_searches: u64,
    /// Searches that needed the aggressive fallback.
    pub fallback_searches: u64,
    pub success_rate: f64,
    /// Mean best raw similarity over successful searches.
    pub average_best_similarity: f64,
    pub by_strategy: BTreeMap<&'static str, u64>,
    pub feedback_records: u64,
    /// Negative explicit ratings.
    pub user_reported_failures: u64,
}

impl SearchStatistics {
    pub fn new() -> Self {
        let mut counters = Counters::default();
        for strategy in SearchStrategy::ALL {
            counters.by_strategy.insert(strategy.name(), 0);
        }
        Self {
            counters: Mutex::new(counters),
        }
    }

    pub fn record_search(&self, strategy: SearchStrategy, outcome: &SearchOutcome) {
        let mut c = self.counters.lock();
        c.searches += 1;
        *c.by_strategy.entry(strategy.name()).or_insert(0) += 1;
        if outcome.used_fallback() {
            c.fallbacks += 1;
        }
        match outcome.best_similarity() {
            Some(best) => {
                c.successful += 1;
                c.best_similarity_sum += f64::from(best);
            }
            None => c.empty += 1,
        }
    }

    pub fn record_feedback(&self, record: &FeedbackRecord, dwell_cutoff_secs: f32) {
        let mut c = self.counters.lock();
        c.feedback += 1;
        if record.signal.is_explicit() && record.polarity(dwell_cutoff_secs) == Polarity::Negative
        {
            c.user_failures += 1;
        }
    }

    pub fn snapshot(&self) -> StatisticsSnapshot {
        let c = self.counters.lock();
        StatisticsSnapshot {
            total_searches: c.searches,
            successful_searches: c.successful,
            empty_searches: c.empty,
            fallback_searches: c.fallbacks,
            success_rate: if c.searches == 0 {
                0.0
            } else {
                c.successful as f64 / c.searches as f64
            },
            average_best_similarity: if c.successful == 0 {
                0.0
            } else {
                c.best_similarity_sum / c.successful as f64
            },
            by_strategy: c.by_strategy.clone(),
            feedback_records: c.feedback,
            user_reported_failures: c.user_failures,
        }
    }
}
