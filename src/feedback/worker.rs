use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::tuner::ThresholdTuner;

/// Handle to the background tuner task.
#[derive(Debug)]
pub struct TunerHandle {
    shutdown: Arc<AtomicBool>,
    wake: Arc<Notify>,
    task: JoinHandle<()>,
}

impl TunerHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stops the loop and waits for the current pass (if any) to finish.
    pub async fn shutdown(self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Tuner task ended abnormally");
        }
    }
}

/// Runs `tuner` whenever `wake` fires or its interval elapses.
pub fn spawn_tuner(tuner: Arc<ThresholdTuner>, wake: Arc<Notify>) -> TunerHandle {
    let shutdown = Arc::new(AtomicBool::new(false));
    let period = tuner.config().interval;

    let task = {
        let shutdown = Arc::clone(&shutdown);
        let wake = Arc::clone(&wake);
        tokio::spawn(async move {
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;

            info!(interval_secs = period.as_secs(), "Threshold tuner started");
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = wake.notified() => {}
                }
                if shutdown.load(Ordering::Acquire) {
                    break;
                }

                let tuner = Arc::clone(&tuner);
                match tokio::task::spawn_blocking(move || tuner.run_once()).await {
                    Ok(report) => debug!(
                        records = report.records,
                        published = report.published.is_some(),
                        "Tuner pass finished"
                    ),
                    Err(e) => error!(error = %e, "Tuner pass panicked"),
                }
            }
            info!("Threshold tuner stopped");
        })
    };

    TunerHandle {
        shutdown,
        wake,
        task,
    }
}
