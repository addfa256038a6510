use super::*;
use crate::index::{IndexHit, ItemMetadata};
use std::sync::Arc;

fn hit(id: &str, raw: f32, metadata: ItemMetadata) -> IndexHit {
    IndexHit {
        item_id: id.to_string(),
        raw_similarity: raw,
        metadata: Arc::new(metadata),
    }
}

fn params(similarity_floor: f32) -> RerankParams<'static> {
    RerankParams {
        similarity_floor,
        relevance_floor: 0.0,
        query: None,
        department: None,
        limit: 10,
    }
}

fn reranker() -> Reranker {
    Reranker::new(RerankerConfig::default()).expect("default config should be valid")
}

#[test]
fn test_score_without_metadata_is_raw() {
    let r = reranker();
    let score = r.score(0.8, &ItemMetadata::default(), None);
    assert!((score - 0.8).abs() < 1e-6);
}

#[test]
fn test_brand_and_category_bonuses() {
    let r = reranker();
    let query = QueryMetadata::default()
        .with_brand("  ACME ")
        .with_category("Sneakers");
    let item = ItemMetadata::default()
        .with_brand("acme")
        .with_category("sneakers");

    let score = r.score(0.9, &item, Some(&query));
    assert!((score - 1.2).abs() < 1e-6, "bonuses are not capped: {score}");
}

#[test]
fn test_empty_values_never_match() {
    let r = reranker();
    let query = QueryMetadata::default().with_brand("");
    let item = ItemMetadata::default().with_brand("");
    assert!((r.score(0.5, &item, Some(&query)) - 0.5).abs() < 1e-6);
}

#[test]
fn test_quality_penalty_below_floor() {
    let r = Reranker::new(RerankerConfig::default().with_quality_penalty(0.5, 0.6))
        .expect("should be valid");

    let poor = ItemMetadata::default().with_quality(0.2);
    let good = ItemMetadata::default().with_quality(0.9);

    assert!((r.score(0.8, &poor, None) - 0.6).abs() < 1e-6);
    assert!((r.score(0.8, &good, None) - 0.8).abs() < 1e-6);
}

#[test]
fn test_rerank_prefilters_and_orders() {
    let r = reranker();
    let hits = vec![
        hit("b", 0.75, ItemMetadata::default()),
        hit("low", 0.5, ItemMetadata::default()),
        hit("a", 0.75, ItemMetadata::default()),
        hit("top", 0.95, ItemMetadata::default()),
    ];

    let results = r.rerank(&hits, &params(0.7));
    let ids: Vec<_> = results.iter().map(|r| r.item_id.as_str()).collect();
    assert_eq!(ids, vec!["top", "a", "b"]);
    assert!(results.iter().all(|r| r.stability == 1.0));
}

#[test]
fn test_bonus_can_reorder_candidates() {
    let r = reranker();
    let query = QueryMetadata::default().with_brand("Acme");
    let hits = vec![
        hit("plain", 0.85, ItemMetadata::default()),
        hit("branded", 0.8, ItemMetadata::default().with_brand("Acme")),
    ];

    let p = RerankParams {
        query: Some(&query),
        ..params(0.7)
    };
    let results = r.rerank(&hits, &p);
    assert_eq!(results[0].item_id, "branded");
}

#[test]
fn test_relevance_floor_applies_after_scoring() {
    let r = Reranker::new(RerankerConfig::default().with_quality_penalty(1.0, 1.0))
        .expect("should be valid");
    let hits = vec![hit("blurry", 0.75, ItemMetadata::default().with_quality(0.2))];

    let p = RerankParams {
        relevance_floor: 0.25,
        ..params(0.7)
    };
    assert!(r.rerank(&hits, &p).is_empty());
}

#[test]
fn test_department_filter() {
    let r = reranker();
    let hits = vec![
        hit("w", 0.9, ItemMetadata::default().with_department("Women")),
        hit("m", 0.95, ItemMetadata::default().with_department("men")),
        hit("none", 0.99, ItemMetadata::default()),
    ];

    let p = RerankParams {
        department: Some("women"),
        ..params(0.0)
    };
    let results = r.rerank(&hits, &p);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].item_id, "w");
}

#[test]
fn test_limit_truncates() {
    let r = reranker();
    let hits: Vec<_> = (0..10)
        .map(|i| hit(&format!("sku-{i}"), 0.9 - i as f32 * 0.01, ItemMetadata::default()))
        .collect();

    let p = RerankParams {
        limit: 3,
        ..params(0.0)
    };
    assert_eq!(r.rerank(&hits, &p).len(), 3);
}

#[test]
fn test_raising_similarity_only_removes() {
    let r = reranker();
    let hits: Vec<_> = [0.95, 0.9, 0.85, 0.8, 0.75, 0.7, 0.65]
        .iter()
        .enumerate()
        .map(|(i, s)| hit(&format!("sku-{i}"), *s, ItemMetadata::default()))
        .collect();

    let loose = r.rerank(&hits, &params(0.7));
    let strict = r.rerank(&hits, &params(0.85));

    assert!(strict.len() < loose.len());
    for result in &strict {
        assert!(loose.iter().any(|l| l.item_id == result.item_id));
    }
}

#[test]
fn test_invalid_config_rejected() {
    assert!(
        Reranker::new(RerankerConfig {
            brand_bonus: -0.1,
            ..Default::default()
        })
        .is_err()
    );
    assert!(
        Reranker::new(RerankerConfig {
            quality_floor: 2.0,
            ..Default::default()
        })
        .is_err()
    );
}
