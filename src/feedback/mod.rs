//! Feedback ingestion and adaptive thresholds.
//!
//! [`FeedbackLoop::submit`] is fire-and-forget: the record is buffered, forwarded to the
//! analytics sink and counted. Every `batch_size` records wake the tuner, which also runs
//! on a fixed interval and publishes new thresholds through the [`ThresholdStore`].

pub mod buffer;
pub mod model;
pub mod query_log;
pub mod statistics;
pub mod thresholds;
pub mod tuner;
pub mod worker;

#[cfg(test)]
mod tests;

pub use buffer::FeedbackBuffer;
pub use model::{FeedbackRecord, Polarity, SignalType};
pub use query_log::{DEFAULT_QUERY_LOG_CAPACITY, DEFAULT_QUERY_LOG_TTL, QueryLog};
pub use statistics::{AnalyticsSink, SearchStatistics, StatisticsSnapshot, TracingSink};
pub use thresholds::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_RELEVANCE_THRESHOLD, ThresholdConfig, ThresholdStore,
};
pub use tuner::{
    DEFAULT_MAX_STEP, DEFAULT_TUNER_BATCH_SIZE, DEFAULT_TUNER_INTERVAL, ThresholdBounds,
    ThresholdTuner, TunerConfig, TuningReport,
};
pub use worker::{TunerHandle, spawn_tuner};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::Notify;
use tracing::debug;

pub struct FeedbackLoop {
    buffer: Arc<FeedbackBuffer>,
    sink: Arc<dyn AnalyticsSink>,
    statistics: Arc<SearchStatistics>,
    wake: Arc<Notify>,
    batch_size: usize,
    dwell_cutoff_secs: f32,
    since_wake: AtomicUsize,
}

impl std::fmt::Debug for FeedbackLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedbackLoop")
            .field("buffered", &self.buffer.len())
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl FeedbackLoop {
    pub fn new(
        buffer: Arc<FeedbackBuffer>,
        sink: Arc<dyn AnalyticsSink>,
        statistics: Arc<SearchStatistics>,
        tuner: &TunerConfig,
    ) -> Self {
        Self {
            buffer,
            sink,
            statistics,
            wake: Arc::new(Notify::new()),
            batch_size: tuner.batch_size.max(1),
            dwell_cutoff_secs: tuner.dwell_cutoff_secs(),
            since_wake: AtomicUsize::new(0),
        }
    }

    /// Notified every `batch_size` submissions.
    pub fn wake_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    pub fn buffer(&self) -> &Arc<FeedbackBuffer> {
        &self.buffer
    }

    pub fn submit(&self, record: FeedbackRecord) {
        self.sink.record(&record);
        self.statistics.record_feedback(&record, self.dwell_cutoff_secs);

        if let Some(evicted) = self.buffer.push(record) {
            debug!(query_id = %evicted.query_id, "Feedback buffer full, evicted oldest record");
        }

        let pending = self.since_wake.fetch_add(1, Ordering::AcqRel) + 1;
        if pending >= self.batch_size {
            self.since_wake.store(0, Ordering::Release);
            self.wake.notify_one();
        }
    }
}
