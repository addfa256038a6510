use std::sync::Arc;

use axum::{Router, body::Body, http::Request, http::StatusCode, response::IntoResponse};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::engine::{EngineConfig, SearchEngine, SearchError, Stage};
use crate::extraction::MockExtractor;
use crate::gateway::create_router_with_state;
use crate::gateway::error::GatewayError;
use crate::gateway::state::HandlerState;
use crate::gateway::status::{LOOKALIKE_CACHE_HEADER, LOOKALIKE_STATUS_HEADER};
use crate::index::{IndexConfig, IndexVariant};
use crate::metadata::InMemoryMetadataStore;

fn extractor() -> MockExtractor {
    MockExtractor::new(2)
        .with_vector(b"img-x", vec![1.0, 0.0])
        .with_vector(b"img-y", vec![0.0, 1.0])
        .with_vector(b"img-z", vec![0.9, 0.1])
        .with_vector(b"query", vec![1.0, 0.0])
}

fn create_test_router(config: EngineConfig) -> Router {
    let engine = SearchEngine::with_components(
        config,
        Arc::new(extractor()),
        Arc::new(InMemoryMetadataStore::new()),
    )
    .expect("engine should build");
    create_router_with_state(HandlerState::new(Arc::new(engine)))
}

async fn send(router: &Router, request: Request<Body>) -> axum::response::Response {
    router.clone().oneshot(request).await.unwrap()
}

async fn post_bytes(router: &Router, uri: &str, body: &'static [u8]) -> axum::response::Response {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/octet-stream")
        .body(Body::from(body))
        .unwrap();
    send(router, request).await
}

async fn post_json(
    router: &Router,
    uri: &str,
    body: serde_json::Value,
) -> axum::response::Response {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap();
    send(router, request).await
}

async fn get(router: &Router, uri: &str) -> axum::response::Response {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(router, request).await
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn header<'a>(response: &'a axum::response::Response, name: &str) -> &'a str {
    response.headers().get(name).unwrap().to_str().unwrap()
}

async fn seeded_router() -> Router {
    let router = create_test_router(EngineConfig::default());
    for (id, bytes) in [
        ("x", b"img-x" as &'static [u8]),
        ("y", b"img-y"),
        ("z", b"img-z"),
    ] {
        let response = post_bytes(&router, &format!("/v1/items/{id}"), bytes).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }
    router
}

mod health_tests {
    use super::*;

    #[tokio::test]
    async fn test_healthz_returns_ok() {
        let router = create_test_router(EngineConfig::default());
        let response = get(&router, "/healthz").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, LOOKALIKE_STATUS_HEADER), "healthy");
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_ready_with_flat_index() {
        let router = create_test_router(EngineConfig::default());
        let response = get(&router, "/ready").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["components"]["index"], "ready");
        assert_eq!(body["components"]["index_variant"], "flat");
    }

    #[tokio::test]
    async fn test_not_ready_until_trained() {
        let config = EngineConfig::default().index(IndexConfig::default().variant(
            IndexVariant::Ivf {
                partitions: 2,
                nprobe: 2,
            },
        ));
        let router = create_test_router(config);
        let response = get(&router, "/ready").await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(header(&response, LOOKALIKE_STATUS_HEADER), "not_ready");
    }
}

mod search_handler_tests {
    use super::*;

    #[tokio::test]
    async fn test_search_returns_ranked_results() {
        let router = seeded_router().await;
        let response = post_bytes(&router, "/v1/search?top_k=2&min_similarity=0.7", b"query").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, LOOKALIKE_STATUS_HEADER), "MATCH");
        assert_eq!(header(&response, LOOKALIKE_CACHE_HEADER), "MISS");

        let body = json_body(response).await;
        let ids: Vec<&str> = body["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["item_id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["x", "z"]);
        assert_eq!(body["state"], "DONE");
        assert!(body["query_id"].as_str().is_some());
    }

    #[tokio::test]
    async fn test_repeated_search_reports_cache_hit() {
        let router = seeded_router().await;
        post_bytes(&router, "/v1/search", b"query").await;
        let response = post_bytes(&router, "/v1/search", b"query").await;

        assert_eq!(header(&response, LOOKALIKE_CACHE_HEADER), "HIT");
    }

    #[tokio::test]
    async fn test_empty_index_is_not_an_error() {
        let router = create_test_router(EngineConfig::default());
        let response = post_bytes(&router, "/v1/search", b"query").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, LOOKALIKE_STATUS_HEADER), "EMPTY");
        let body = json_body(response).await;
        assert!(body["results"].as_array().unwrap().is_empty());
        assert_eq!(body["state"], "EXHAUSTED");
    }

    #[tokio::test]
    async fn test_multi_threshold_returns_distribution() {
        let router = seeded_router().await;
        let response =
            post_bytes(&router, "/v1/search?strategy=multi_threshold&top_k=2", b"query").await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["distribution"].as_array().unwrap().len(), 7);
    }

    #[tokio::test]
    async fn test_aggressive_strategy_is_selectable() {
        let router = seeded_router().await;
        let response =
            post_bytes(&router, "/v1/search?strategy=aggressive&top_k=2", b"query").await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, LOOKALIKE_STATUS_HEADER), "MATCH_FALLBACK");
        let body = json_body(response).await;
        assert_eq!(body["strategy"], "aggressive");
        assert_eq!(body["fallback"], true);
        assert_eq!(body["results"][0]["item_id"], "x");
    }

    #[tokio::test]
    async fn test_rejects_empty_body() {
        let router = seeded_router().await;
        let response = post_bytes(&router, "/v1/search", b"").await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["code"], "invalid_request");
        assert_eq!(body["retryable"], false);
    }

    #[tokio::test]
    async fn test_rejects_bad_query_params() {
        let router = seeded_router().await;

        let response = post_bytes(&router, "/v1/search?top_k=0", b"query").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = post_bytes(&router, "/v1/search?strategy=psychic", b"query").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(header(&response, LOOKALIKE_STATUS_HEADER), "invalid_request");
    }
}

mod ingest_handler_tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_item_conflicts_unless_replaced() {
        let router = seeded_router().await;

        let response = post_bytes(&router, "/v1/items/x", b"img-y").await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = json_body(response).await;
        assert_eq!(body["code"], "duplicate_item_id");
        assert_eq!(body["stage"], "ingest");

        let response = post_bytes(&router, "/v1/items/x?replace=true", b"img-y").await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(json_body(response).await["items"], 3);
    }

    #[tokio::test]
    async fn test_untrained_index_is_unavailable() {
        let config = EngineConfig::default().index(IndexConfig::default().variant(
            IndexVariant::Ivf {
                partitions: 2,
                nprobe: 2,
            },
        ));
        let router = create_test_router(config);

        let response = post_bytes(&router, "/v1/items/x", b"img-x").await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["code"], "index_not_trained");
    }

    #[tokio::test]
    async fn test_metadata_upsert_affects_ranking() {
        let router = seeded_router().await;
        let response = post_json(
            &router,
            "/v1/catalog/metadata",
            serde_json::json!({ "items": { "z": { "brand": "Acme" } } }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["updated"], 1);

        let response = post_bytes(&router, "/v1/search?brand=acme&top_k=2", b"query").await;
        let body = json_body(response).await;
        assert_eq!(body["results"][0]["item_id"], "z");
    }
}

mod training_handler_tests {
    use super::*;

    fn ivf_router() -> Router {
        create_test_router(EngineConfig::default().index(IndexConfig::default().variant(
            IndexVariant::Ivf {
                partitions: 2,
                nprobe: 2,
            },
        )))
    }

    #[tokio::test]
    async fn test_buffered_samples_make_the_index_ready() {
        let router = ivf_router();
        assert_eq!(
            get(&router, "/ready").await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );

        for (expected, bytes) in [
            (1, b"img-x" as &'static [u8]),
            (2, b"img-y"),
            (3, b"img-z"),
        ] {
            let response = post_bytes(&router, "/v1/index/samples", bytes).await;
            assert_eq!(response.status(), StatusCode::ACCEPTED);
            assert_eq!(json_body(response).await["buffered"], expected);
        }

        let request = Request::builder()
            .method("POST")
            .uri("/v1/index/train")
            .body(Body::empty())
            .unwrap();
        let response = send(&router, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(header(&response, LOOKALIKE_STATUS_HEADER), "stored");
        let body = json_body(response).await;
        assert_eq!(body["samples"], 3);
        assert_eq!(body["variant"], "ivf");
        assert_eq!(body["trained"], true);

        let response = get(&router, "/ready").await;
        assert_eq!(response.status(), StatusCode::OK);

        let response = post_bytes(&router, "/v1/items/x", b"img-x").await;
        assert_eq!(response.status(), StatusCode::CREATED);
        let response = post_bytes(&router, "/v1/search?top_k=1", b"query").await;
        assert_eq!(json_body(response).await["results"][0]["item_id"], "x");
    }

    #[tokio::test]
    async fn test_supplied_vectors_train_the_index() {
        let router = ivf_router();
        let response = post_json(
            &router,
            "/v1/index/train",
            serde_json::json!({ "vectors": [[1.0, 0.0], [0.0, 1.0], [0.7, 0.7]] }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["samples"], 3);
        assert_eq!(get(&router, "/ready").await.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_training_rejects_bad_input() {
        let router = ivf_router();

        let request = Request::builder()
            .method("POST")
            .uri("/v1/index/train")
            .body(Body::empty())
            .unwrap();
        let response = send(&router, request).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = post_json(
            &router,
            "/v1/index/train",
            serde_json::json!({ "vectors": [[1.0, 0.0, 0.0]] }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "invalid_request");

        let response = post_bytes(&router, "/v1/index/train", b"not json").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            get(&router, "/ready").await.status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}

mod feedback_handler_tests {
    use super::*;

    #[tokio::test]
    async fn test_feedback_is_accepted() {
        let router = seeded_router().await;
        let search = json_body(post_bytes(&router, "/v1/search", b"query").await).await;

        let response = post_json(
            &router,
            "/v1/feedback",
            serde_json::json!({
                "query_id": search["query_id"],
                "item_id": "x",
                "signal": "click",
                "value": 1.0
            }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let stats = json_body(get(&router, "/v1/stats").await).await;
        assert_eq!(stats["feedback_buffered"], 1);
        assert_eq!(stats["searches"]["total_searches"], 1);
    }

    #[tokio::test]
    async fn test_malformed_feedback_is_rejected() {
        let router = seeded_router().await;
        let response = post_json(
            &router,
            "/v1/feedback",
            serde_json::json!({ "query_id": "not-a-uuid", "item_id": "x" }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["code"], "invalid_request");
    }

    #[tokio::test]
    async fn test_thresholds_are_published() {
        let router = create_test_router(EngineConfig::default());
        let body = json_body(get(&router, "/v1/thresholds").await).await;

        assert_eq!(body["generation"], 0);
        assert!((body["similarity"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }
}

mod error_tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_maps_to_retryable_503() {
        let err = GatewayError::from(SearchError::InfrastructureTimeout {
            stage: Stage::Index,
            attempts: 3,
        });
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            header(&response, LOOKALIKE_STATUS_HEADER),
            "infrastructure_timeout"
        );
        let body = json_body(response).await;
        assert_eq!(body["retryable"], true);
        assert_eq!(body["stage"], "index");
    }

    #[tokio::test]
    async fn test_internal_error_hides_detail() {
        let err = GatewayError::from(SearchError::Internal {
            stage: Stage::Extraction,
            reason: "cuda OOM at kernel 7".to_string(),
        });
        let response = err.into_response();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert_eq!(body["error"], "extraction failed");
        assert!(!body.to_string().contains("OOM"));
    }
}
