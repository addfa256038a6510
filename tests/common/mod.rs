//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use lookalike::engine::{EngineConfig, SearchEngine};
use lookalike::extraction::MockExtractor;
use lookalike::index::WriteMode;
use lookalike::metadata::InMemoryMetadataStore;

pub type MockEngine = SearchEngine<MockExtractor, InMemoryMetadataStore>;

pub const QUERY: &[u8] = b"query";

/// Unit 2-d vector whose cosine similarity to `[1, 0]` is `similarity`.
pub fn at_similarity(similarity: f32) -> Vec<f32> {
    vec![similarity, (1.0 - similarity * similarity).max(0.0).sqrt()]
}

/// Catalog of three items: `[1,0]`, `[0,1]` and `[0.9,0.1]`, queried with `[1,0]`.
pub fn scenario_extractor() -> MockExtractor {
    MockExtractor::new(2)
        .with_vector(b"img-a", vec![1.0, 0.0])
        .with_vector(b"img-b", vec![0.0, 1.0])
        .with_vector(b"img-c", vec![0.9, 0.1])
        .with_vector(QUERY, vec![1.0, 0.0])
}

pub fn mock_engine(config: EngineConfig, extractor: MockExtractor) -> Arc<MockEngine> {
    let engine = SearchEngine::with_components(
        config,
        Arc::new(extractor),
        Arc::new(InMemoryMetadataStore::new()),
    )
    .expect("engine should build");
    Arc::new(engine)
}

pub async fn seed(engine: &MockEngine, items: &[(&str, &[u8])]) {
    for (item_id, bytes) in items {
        engine
            .ingest_item(item_id, bytes, WriteMode::Insert)
            .await
            .expect("item should ingest");
    }
}

pub async fn scenario_engine(config: EngineConfig, extractor: MockExtractor) -> Arc<MockEngine> {
    let engine = mock_engine(config, extractor);
    seed(
        &engine,
        &[
            ("a", b"img-a".as_slice()),
            ("b", b"img-b".as_slice()),
            ("c", b"img-c".as_slice()),
        ],
    )
    .await;
    engine
}
