use super::*;
use crate::engine::Stage;
use crate::feedback::ThresholdConfig;
use crate::index::{IndexConfig, IndexEntry, ItemMetadata};
use crate::scoring::RerankerConfig;

fn vector(values: &[f32]) -> FeatureVector {
    FeatureVector::new(values.to_vec())
}

/// Unit 2-d vector whose cosine with `[1, 0]` is `similarity`.
fn at_similarity(similarity: f32) -> Vec<f32> {
    vec![similarity, (1.0 - similarity * similarity).sqrt()]
}

fn index_with(items: &[(&str, Vec<f32>)]) -> VectorIndex {
    let index = VectorIndex::new(2, IndexConfig::default()).expect("flat config should be valid");
    let entries = items
        .iter()
        .map(|(id, v)| IndexEntry::new(*id, vector(v), ItemMetadata::default()))
        .collect();
    index.add(entries).expect("should add");
    index
}

fn orchestrator() -> SearchOrchestrator {
    orchestrator_with(OrchestratorConfig::default())
}

fn orchestrator_with(config: OrchestratorConfig) -> SearchOrchestrator {
    let reranker = Reranker::new(RerankerConfig::default()).expect("default reranker is valid");
    SearchOrchestrator::new(config, reranker).expect("config should be valid")
}

fn plan<'a>(
    query: &'a FeatureVector,
    thresholds: &'a ThresholdConfig,
    top_k: usize,
    strategy: SearchStrategy,
) -> SearchPlan<'a> {
    SearchPlan {
        query,
        top_k,
        strategy,
        thresholds,
        query_metadata: None,
        department: None,
    }
}

fn ids(outcome: &SearchOutcome) -> Vec<&str> {
    outcome.results.iter().map(|r| r.item_id.as_str()).collect()
}

struct FailingSource;

impl CandidateSource for FailingSource {
    async fn candidates(
        &self,
        _query: &FeatureVector,
        _top_k: usize,
    ) -> Result<Vec<IndexHit>, SearchError> {
        Err(SearchError::InfrastructureTimeout {
            stage: Stage::Index,
            attempts: 3,
        })
    }
}

#[test]
fn test_transition_table() {
    use SearchState::*;
    assert_eq!(transition(Standard, StepOutcome::Found), Done);
    assert_eq!(transition(Standard, StepOutcome::Empty), Aggressive);
    assert_eq!(transition(StabilityCheck, StepOutcome::Empty), Aggressive);
    assert_eq!(transition(Aggressive, StepOutcome::Found), Done);
    assert_eq!(transition(Aggressive, StepOutcome::Empty), Exhausted);
    assert_eq!(transition(MultiThreshold, StepOutcome::Empty), Exhausted);
    assert_eq!(transition(Done, StepOutcome::Empty), Done);
    assert_eq!(transition(Exhausted, StepOutcome::Found), Exhausted);
}

#[test]
fn test_aggressive_is_only_entered_from_empty_steps() {
    for (from, outcome, to) in TRANSITIONS {
        if to == SearchState::Aggressive {
            assert_eq!(outcome, StepOutcome::Empty, "{from} enters AGGRESSIVE on results");
        }
        assert_ne!(from, to);
    }
    assert!(!TRANSITIONS.iter().any(|(from, _, _)| from.is_terminal()));
}

#[test]
fn test_initial_states() {
    assert_eq!(
        SearchState::initial(SearchStrategy::Standard),
        SearchState::Standard
    );
    assert_eq!(
        SearchState::initial(SearchStrategy::StabilityCheck),
        SearchState::StabilityCheck
    );
    assert_eq!(
        SearchState::initial(SearchStrategy::MultiThreshold),
        SearchState::MultiThreshold
    );
    assert_eq!(
        SearchState::initial(SearchStrategy::Aggressive),
        SearchState::Aggressive
    );
    assert_eq!(SearchStrategy::default(), SearchStrategy::Standard);
}

#[test]
fn test_strategy_serde_names() {
    let parsed: SearchStrategy =
        serde_json::from_str("\"stability_check\"").expect("should parse");
    assert_eq!(parsed, SearchStrategy::StabilityCheck);
    let parsed: SearchStrategy = serde_json::from_str("\"aggressive\"").expect("should parse");
    assert_eq!(parsed, SearchStrategy::Aggressive);
    assert_eq!(
        serde_json::to_string(&SearchState::MultiThreshold).expect("should serialize"),
        "\"MULTI_THRESHOLD\""
    );
}

#[test]
fn test_config_validation() {
    assert!(OrchestratorConfig::default().validate().is_ok());
    assert!(
        OrchestratorConfig::default()
            .threshold_ladder(vec![0.2, 0.4])
            .validate()
            .is_err()
    );
    assert!(
        OrchestratorConfig::default()
            .threshold_ladder(Vec::new())
            .validate()
            .is_err()
    );
    assert!(
        OrchestratorConfig::default()
            .stability(0, 0.02, 0.01)
            .validate()
            .is_err()
    );
    assert!(
        OrchestratorConfig::default()
            .aggressive_top_k_multiplier(0)
            .validate()
            .is_err()
    );
}

#[tokio::test]
async fn test_standard_search_finds_nearest() {
    let index = index_with(&[
        ("a", vec![1.0, 0.0]),
        ("b", vec![0.0, 1.0]),
        ("c", vec![0.9, 0.1]),
    ]);
    let query = vector(&[1.0, 0.0]);
    let thresholds = ThresholdConfig::default();

    let outcome = orchestrator()
        .run(&index, &plan(&query, &thresholds, 2, SearchStrategy::Standard))
        .await
        .expect("search should succeed");

    assert_eq!(ids(&outcome), vec!["a", "c"]);
    assert_eq!(outcome.state, SearchState::Done);
    assert_eq!(outcome.path, vec![SearchState::Standard, SearchState::Done]);
    assert!(!outcome.used_fallback());
    assert_eq!(outcome.candidates.len(), 3);
    assert_eq!(outcome.candidates[0].0, "a");
}

#[tokio::test]
async fn test_aggressive_fallback_after_empty_standard() {
    let index = index_with(&[("weak", at_similarity(0.3)), ("none", vec![0.0, 1.0])]);
    let query = vector(&[1.0, 0.0]);
    let thresholds = ThresholdConfig::default();

    let outcome = orchestrator()
        .run(&index, &plan(&query, &thresholds, 5, SearchStrategy::Standard))
        .await
        .expect("search should succeed");

    assert_eq!(ids(&outcome), vec!["weak"]);
    assert_eq!(
        outcome.path,
        vec![
            SearchState::Standard,
            SearchState::Aggressive,
            SearchState::Done
        ]
    );
    assert!(outcome.used_fallback());
}

#[tokio::test]
async fn test_aggressive_strategy_starts_at_the_fallback_floor() {
    let index = index_with(&[
        ("close", at_similarity(0.95)),
        ("weak", at_similarity(0.3)),
        ("none", vec![0.0, 1.0]),
    ]);
    let query = vector(&[1.0, 0.0]);
    let thresholds = ThresholdConfig::default();

    let outcome = orchestrator()
        .run(&index, &plan(&query, &thresholds, 5, SearchStrategy::Aggressive))
        .await
        .expect("search should succeed");

    assert_eq!(ids(&outcome), vec!["close", "weak"]);
    assert_eq!(outcome.path, vec![SearchState::Aggressive, SearchState::Done]);
    assert!(outcome.used_fallback());
}

#[tokio::test]
async fn test_aggressive_strategy_exhausts_without_a_second_fallback() {
    let index = index_with(&[("opposite", vec![-1.0, 0.0])]);
    let query = vector(&[1.0, 0.0]);
    let thresholds = ThresholdConfig::default();

    let outcome = orchestrator()
        .run(&index, &plan(&query, &thresholds, 5, SearchStrategy::Aggressive))
        .await
        .expect("no matches is not an error");

    assert!(outcome.results.is_empty());
    assert_eq!(
        outcome.path,
        vec![SearchState::Aggressive, SearchState::Exhausted]
    );
}

#[tokio::test]
async fn test_exhausted_is_not_an_error() {
    let index = index_with(&[("none", vec![0.0, 1.0]), ("opposite", vec![-1.0, 0.0])]);
    let query = vector(&[1.0, 0.0]);
    let thresholds = ThresholdConfig::default();

    let outcome = orchestrator()
        .run(&index, &plan(&query, &thresholds, 5, SearchStrategy::Standard))
        .await
        .expect("empty result is not an error");

    assert!(outcome.results.is_empty());
    assert!(outcome.is_exhausted());
    assert_eq!(
        outcome.path,
        vec![
            SearchState::Standard,
            SearchState::Aggressive,
            SearchState::Exhausted
        ]
    );
}

#[tokio::test]
async fn test_empty_index_exhausts() {
    let index = VectorIndex::new(2, IndexConfig::default()).expect("valid");
    let query = vector(&[1.0, 0.0]);
    let thresholds = ThresholdConfig::default();

    let outcome = orchestrator()
        .run(&index, &plan(&query, &thresholds, 5, SearchStrategy::Standard))
        .await
        .expect("empty index is not an error");
    assert!(outcome.is_exhausted());
    assert!(outcome.candidates.is_empty());
}

#[tokio::test]
async fn test_source_failure_propagates() {
    let query = vector(&[1.0, 0.0]);
    let thresholds = ThresholdConfig::default();

    let err = orchestrator()
        .run(
            &FailingSource,
            &plan(&query, &thresholds, 5, SearchStrategy::Standard),
        )
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.stage(), Some(Stage::Index));
}

#[tokio::test]
async fn test_stability_check_without_noise_is_fully_stable() {
    let index = index_with(&[("a", vec![1.0, 0.0]), ("c", vec![0.9, 0.1])]);
    let query = vector(&[1.0, 0.0]);
    let thresholds = ThresholdConfig::default();
    let orch = orchestrator_with(OrchestratorConfig::default().stability(3, 0.0, 0.01));

    let outcome = orch
        .run(
            &index,
            &plan(&query, &thresholds, 5, SearchStrategy::StabilityCheck),
        )
        .await
        .expect("search should succeed");

    assert_eq!(ids(&outcome), vec!["a", "c"]);
    assert!(outcome.results.iter().all(|r| r.stability == 1.0));
    assert_eq!(
        outcome.path,
        vec![SearchState::StabilityCheck, SearchState::Done]
    );
}

#[tokio::test]
async fn test_stability_check_is_deterministic_and_respects_confidence() {
    let index = index_with(&[
        ("exact", vec![1.0, 0.0]),
        ("edge", at_similarity(0.705)),
        ("far", vec![0.0, 1.0]),
    ]);
    let query = vector(&[1.0, 0.0]);
    let thresholds = ThresholdConfig::default().with_confidence(0.6);
    let orch = orchestrator_with(OrchestratorConfig::default().stability(5, 0.05, 0.01));
    let p = plan(&query, &thresholds, 5, SearchStrategy::StabilityCheck);

    let first = orch.run(&index, &p).await.expect("should succeed");
    let second = orch.run(&index, &p).await.expect("should succeed");

    assert_eq!(first.results, second.results);
    assert_eq!(first.results[0].item_id, "exact");
    assert!(first.results.iter().all(|r| r.stability >= 0.6));
    assert!(first.results.iter().all(|r| r.item_id != "far"));
}

#[tokio::test]
async fn test_multi_threshold_distribution() {
    let index = index_with(&[
        ("s45", at_similarity(0.45)),
        ("s35", at_similarity(0.35)),
        ("s28", at_similarity(0.28)),
        ("s12", at_similarity(0.12)),
    ]);
    let query = vector(&[1.0, 0.0]);
    let thresholds = ThresholdConfig::default();

    let outcome = orchestrator()
        .run(
            &index,
            &plan(&query, &thresholds, 2, SearchStrategy::MultiThreshold),
        )
        .await
        .expect("search should succeed");

    let distribution = outcome.distribution.as_ref().expect("ladder distribution");
    let counts: Vec<usize> = distribution.iter().map(|b| b.results_count).collect();
    assert_eq!(counts, vec![0, 1, 2, 3, 3, 3, 4]);
    assert!(distribution.iter().all(|b| b.results.len() <= 2));

    assert_eq!(ids(&outcome), vec!["s45", "s35"]);
    assert_eq!(
        outcome.path,
        vec![SearchState::MultiThreshold, SearchState::Done]
    );
}

#[tokio::test]
async fn test_multi_threshold_uses_lowest_rung_when_short() {
    let index = index_with(&[("s45", at_similarity(0.45)), ("s12", at_similarity(0.12))]);
    let query = vector(&[1.0, 0.0]);
    let thresholds = ThresholdConfig::default();

    let outcome = orchestrator()
        .run(
            &index,
            &plan(&query, &thresholds, 10, SearchStrategy::MultiThreshold),
        )
        .await
        .expect("search should succeed");

    assert_eq!(ids(&outcome), vec!["s45", "s12"]);
}

#[tokio::test]
async fn test_department_restricts_results() {
    let index = VectorIndex::new(2, IndexConfig::default()).expect("valid");
    index
        .add(vec![
            IndexEntry::new(
                "w",
                vector(&[1.0, 0.0]),
                ItemMetadata::default().with_department("women"),
            ),
            IndexEntry::new(
                "m",
                vector(&[0.95, 0.05]),
                ItemMetadata::default().with_department("men"),
            ),
        ])
        .expect("should add");
    let query = vector(&[1.0, 0.0]);
    let thresholds = ThresholdConfig::default();
    let p = SearchPlan {
        department: Some("Men"),
        ..plan(&query, &thresholds, 5, SearchStrategy::Standard)
    };

    let outcome = orchestrator().run(&index, &p).await.expect("should succeed");
    assert_eq!(ids(&outcome), vec!["m"]);
}
