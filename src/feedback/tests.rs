use super::*;
use crate::orchestrator::CandidateScore;
use std::time::Duration;
use uuid::Uuid;

fn score(raw: f32) -> CandidateScore {
    CandidateScore {
        raw_similarity: raw,
        final_score: raw,
        stability: 1.0,
    }
}

struct Harness {
    buffer: Arc<FeedbackBuffer>,
    log: QueryLog,
    store: Arc<ThresholdStore>,
    tuner: ThresholdTuner,
}

fn harness(config: TunerConfig) -> Harness {
    let buffer = Arc::new(FeedbackBuffer::new(10_000));
    let log = QueryLog::default();
    let store =
        Arc::new(ThresholdStore::new(ThresholdConfig::default()).expect("defaults are valid"));
    let tuner = ThresholdTuner::new(config, Arc::clone(&buffer), log.clone(), Arc::clone(&store))
        .expect("config should be valid");
    Harness {
        buffer,
        log,
        store,
        tuner,
    }
}

/// Logs one query whose only candidate has `raw` similarity and buffers `signal` for it.
fn feedback(h: &Harness, raw: f32, signal: SignalType, value: f32) {
    let query_id = Uuid::new_v4();
    h.log
        .record(query_id, &[("sku-1".to_string(), score(raw))]);
    h.buffer
        .push(FeedbackRecord::new(query_id, "sku-1", signal, value));
}

#[test]
fn test_buffer_evicts_oldest() {
    let buffer = FeedbackBuffer::new(2);
    let q = Uuid::new_v4();
    assert!(buffer.push(FeedbackRecord::new(q, "a", SignalType::Click, 1.0)).is_none());
    assert!(buffer.push(FeedbackRecord::new(q, "b", SignalType::Click, 1.0)).is_none());

    let evicted = buffer
        .push(FeedbackRecord::new(q, "c", SignalType::Click, 1.0))
        .expect("oldest should be evicted");
    assert_eq!(evicted.item_id, "a");

    let drained: Vec<_> = buffer.drain().into_iter().map(|r| r.item_id).collect();
    assert_eq!(drained, vec!["b", "c"]);
    assert!(buffer.is_empty());
}

#[test]
fn test_polarity_by_signal() {
    let q = Uuid::new_v4();
    let cutoff = 10.0;
    let rec = |signal, value| FeedbackRecord::new(q, "x", signal, value);

    assert_eq!(rec(SignalType::ExplicitRating, 0.9).polarity(cutoff), Polarity::Positive);
    assert_eq!(rec(SignalType::ExplicitRating, 0.1).polarity(cutoff), Polarity::Negative);
    assert_eq!(rec(SignalType::Click, 1.0).polarity(cutoff), Polarity::Positive);
    assert_eq!(rec(SignalType::Click, 0.0).polarity(cutoff), Polarity::Negative);
    assert_eq!(rec(SignalType::Dwell, 30.0).polarity(cutoff), Polarity::Positive);
    assert_eq!(rec(SignalType::Dwell, 2.0).polarity(cutoff), Polarity::Negative);
    assert_eq!(rec(SignalType::Refinement, 1.0).polarity(cutoff), Polarity::Negative);
}

#[test]
fn test_signal_type_serde_names() {
    let json = serde_json::to_string(&SignalType::ExplicitRating).expect("should serialize");
    assert_eq!(json, "\"explicit_rating\"");
    let parsed: SignalType = serde_json::from_str("\"dwell\"").expect("should parse");
    assert_eq!(parsed, SignalType::Dwell);
}

#[test]
fn test_threshold_store_publish_bumps_generation() {
    let store = ThresholdStore::new(ThresholdConfig::default()).expect("valid");
    let before = store.snapshot();
    assert_eq!(before.generation, 0);

    let published = store
        .publish(before.with_similarity(0.6))
        .expect("should publish");
    assert_eq!(published.generation, 1);
    assert_eq!(store.snapshot(), published);
    assert!((store.snapshot().similarity - 0.6).abs() < 1e-6);
}

#[test]
fn test_threshold_store_rejects_out_of_range() {
    assert!(ThresholdStore::new(ThresholdConfig::default().with_similarity(1.5)).is_err());

    let store = ThresholdStore::new(ThresholdConfig::default()).expect("valid");
    assert!(
        store
            .publish(ThresholdConfig::default().with_relevance(-0.1))
            .is_err()
    );
    assert_eq!(store.snapshot().generation, 0);
}

#[test]
fn test_query_log_lookup() {
    let log = QueryLog::default();
    let q = Uuid::new_v4();
    log.record(q, &[("a".to_string(), score(0.8)), ("b".to_string(), score(0.6))]);

    assert!(log.contains(&q));
    assert_eq!(log.score(&q, "b"), Some(score(0.6)));
    assert_eq!(log.score(&q, "missing"), None);
    assert_eq!(log.score(&Uuid::new_v4(), "a"), None);
}

#[test]
fn test_tuner_lowers_similarity_when_results_are_withheld() {
    let h = harness(TunerConfig::default());
    for _ in 0..1000 {
        feedback(&h, 0.66, SignalType::ExplicitRating, 1.0);
    }

    let report = h.tuner.run_once();
    assert_eq!(report.records, 1000);
    assert_eq!(report.attributed, 1000);

    let published = report.published.expect("thresholds should move");
    let step = h.tuner.config().max_step;
    assert!(published.similarity < 0.7);
    assert!(0.7 - published.similarity <= step + 1e-6);
    assert!(published.similarity >= h.tuner.config().similarity_bounds.min);
    assert_eq!(h.store.snapshot(), published);
    assert!(h.buffer.is_empty());
}

#[test]
fn test_tuner_raises_similarity_on_negative_feedback() {
    let h = harness(TunerConfig::default());
    for _ in 0..50 {
        feedback(&h, 0.72, SignalType::ExplicitRating, 0.0);
    }
    for _ in 0..10 {
        feedback(&h, 0.9, SignalType::Click, 1.0);
    }

    let published = h.tuner.run_once().published.expect("should move");
    assert!((published.similarity - 0.75).abs() < 1e-4);
}

#[test]
fn test_tuner_never_crosses_floor() {
    let config = TunerConfig::default().similarity_bounds(0.68, 0.95);
    let h = harness(config);
    for _ in 0..100 {
        feedback(&h, 0.69, SignalType::ExplicitRating, 1.0);
    }

    let published = h.tuner.run_once().published.expect("should move");
    assert!((published.similarity - 0.68).abs() < 1e-6);

    for _ in 0..100 {
        feedback(&h, 0.69, SignalType::ExplicitRating, 1.0);
    }
    let report = h.tuner.run_once();
    assert!(report.published.is_none(), "already at the floor");
}

#[test]
fn test_tuner_holds_on_balanced_feedback() {
    let h = harness(TunerConfig::default());
    for _ in 0..20 {
        feedback(&h, 0.8, SignalType::ExplicitRating, 1.0);
    }

    let report = h.tuner.run_once();
    assert!(report.published.is_none());
    assert_eq!(h.store.snapshot().generation, 0);
}

#[test]
fn test_tuner_ignores_unattributed_and_sparse_feedback() {
    let h = harness(TunerConfig::default().min_signals(5));
    for _ in 0..3 {
        feedback(&h, 0.6, SignalType::ExplicitRating, 1.0);
    }
    for _ in 0..10 {
        h.buffer.push(FeedbackRecord::new(
            Uuid::new_v4(),
            "unknown",
            SignalType::ExplicitRating,
            1.0,
        ));
    }

    let report = h.tuner.run_once();
    assert_eq!(report.records, 13);
    assert_eq!(report.attributed, 3);
    assert!(report.published.is_none());
}

#[test]
fn test_tuner_config_validation() {
    assert!(TunerConfig::default().validate().is_ok());
    assert!(TunerConfig::default().batch_size(0).validate().is_err());
    assert!(TunerConfig::default().max_step(0.0).validate().is_err());
    assert!(
        TunerConfig::default()
            .similarity_bounds(0.9, 0.3)
            .validate()
            .is_err()
    );
}

#[test]
fn test_statistics_counts_negative_ratings() {
    let stats = SearchStatistics::new();
    let q = Uuid::new_v4();
    stats.record_feedback(&FeedbackRecord::new(q, "a", SignalType::ExplicitRating, 0.0), 10.0);
    stats.record_feedback(&FeedbackRecord::new(q, "a", SignalType::Refinement, 1.0), 10.0);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.feedback_records, 2);
    assert_eq!(snapshot.user_reported_failures, 1);
    assert_eq!(snapshot.total_searches, 0);
    assert_eq!(snapshot.success_rate, 0.0);
    assert_eq!(snapshot.by_strategy.len(), 3);
}

#[tokio::test]
async fn test_feedback_loop_wakes_after_batch() {
    let stats = Arc::new(SearchStatistics::new());
    let feedback_loop = FeedbackLoop::new(
        Arc::new(FeedbackBuffer::new(100)),
        Arc::new(TracingSink),
        Arc::clone(&stats),
        &TunerConfig::default().batch_size(3),
    );
    let wake = feedback_loop.wake_handle();
    let q = Uuid::new_v4();

    for i in 0..3 {
        feedback_loop.submit(FeedbackRecord::new(q, format!("sku-{i}"), SignalType::Click, 1.0));
    }

    tokio::time::timeout(Duration::from_secs(1), wake.notified())
        .await
        .expect("batch should wake the tuner");
    assert_eq!(feedback_loop.buffer().len(), 3);
    assert_eq!(stats.snapshot().feedback_records, 3);
}

#[tokio::test]
async fn test_worker_publishes_after_wake() {
    let buffer = Arc::new(FeedbackBuffer::new(10_000));
    let log = QueryLog::default();
    let store =
        Arc::new(ThresholdStore::new(ThresholdConfig::default()).expect("defaults are valid"));
    let config = TunerConfig::default()
        .batch_size(10)
        .interval(Duration::from_secs(3600));
    let tuner = Arc::new(
        ThresholdTuner::new(config.clone(), Arc::clone(&buffer), log.clone(), Arc::clone(&store))
            .expect("valid"),
    );
    let feedback_loop = FeedbackLoop::new(
        Arc::clone(&buffer),
        Arc::new(TracingSink),
        Arc::new(SearchStatistics::new()),
        &config,
    );
    let handle = spawn_tuner(tuner, feedback_loop.wake_handle());

    for _ in 0..10 {
        let q = Uuid::new_v4();
        log.record(q, &[("sku-1".to_string(), score(0.66))]);
        feedback_loop.submit(FeedbackRecord::new(q, "sku-1", SignalType::ExplicitRating, 1.0));
    }

    let published = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let current = store.snapshot();
            if current.generation > 0 {
                return current;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("tuner should publish");

    assert!(published.similarity < 0.7);
    handle.shutdown().await;
}
