//! Property tests for result ordering and threshold monotonicity.

use std::sync::Arc;

use proptest::prelude::*;

use lookalike::index::{IndexHit, ItemMetadata};
use lookalike::scoring::{RerankParams, Reranker, RerankerConfig, SearchResult, sort_results};

fn result(item_id: String, final_score: f32) -> SearchResult {
    SearchResult {
        item_id,
        raw_similarity: final_score,
        final_score,
        stability: 1.0,
        metadata: ItemMetadata::default(),
    }
}

fn hits(similarities: &[f32]) -> Vec<IndexHit> {
    similarities
        .iter()
        .enumerate()
        .map(|(i, s)| IndexHit {
            item_id: format!("item-{i:03}"),
            raw_similarity: *s,
            metadata: Arc::new(ItemMetadata::default()),
        })
        .collect()
}

fn params(similarity_floor: f32) -> RerankParams<'static> {
    RerankParams {
        similarity_floor,
        relevance_floor: 0.0,
        query: None,
        department: None,
        limit: usize::MAX,
    }
}

proptest! {
    // Scores drawn from a handful of values so ties are common.
    #[test]
    fn sorted_by_score_then_item_id(
        entries in prop::collection::vec(("[a-e]{1,2}", 0u8..4), 0..40)
    ) {
        let mut results: Vec<SearchResult> = entries
            .into_iter()
            .map(|(id, bucket)| result(id, f32::from(bucket) * 0.25))
            .collect();

        sort_results(&mut results);

        for pair in results.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(a.final_score >= b.final_score);
            if a.final_score == b.final_score {
                prop_assert!(a.item_id <= b.item_id);
            }
        }
    }

    #[test]
    fn sorting_is_independent_of_input_order(
        scores in prop::collection::vec(0u8..3, 1..20),
        rotation in 0usize..20,
    ) {
        let original: Vec<SearchResult> = scores
            .iter()
            .enumerate()
            .map(|(i, s)| result(format!("id-{i:02}"), f32::from(*s)))
            .collect();
        let mut rotated = original.clone();
        let len = rotated.len();
        rotated.rotate_left(rotation % len);

        let mut expected = original;
        sort_results(&mut expected);
        sort_results(&mut rotated);

        prop_assert_eq!(expected, rotated);
    }

    #[test]
    fn raising_similarity_floor_only_removes_results(
        similarities in prop::collection::vec(0.0f32..1.0, 0..50),
        low in 0.0f32..1.0,
        delta in 0.0f32..0.5,
    ) {
        let reranker = Reranker::new(RerankerConfig::default()).expect("default config is valid");
        let hits = hits(&similarities);
        let high = (low + delta).min(1.0);

        let loose = reranker.rerank(&hits, &params(low));
        let strict = reranker.rerank(&hits, &params(high));

        prop_assert!(strict.len() <= loose.len());
        for r in &strict {
            prop_assert!(loose.iter().any(|l| l.item_id == r.item_id));
            prop_assert!(r.raw_similarity >= high);
        }
    }
}
