//! HTTP round trips through the public router.

mod common;

use axum::{Router, body::Body, http::Request, http::StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use common::{mock_engine, scenario_extractor};
use lookalike::engine::EngineConfig;
use lookalike::gateway::{HandlerState, LOOKALIKE_STATUS_HEADER, create_router_with_state};

async fn call(router: &Router, request: Request<Body>) -> (StatusCode, String, serde_json::Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let header = response
        .headers()
        .get(LOOKALIKE_STATUS_HEADER)
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, header, body)
}

fn post(uri: &str, content_type: &str, body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", content_type)
        .body(body.into())
        .unwrap()
}

#[tokio::test]
async fn test_catalog_search_and_feedback_flow() {
    let engine = mock_engine(EngineConfig::default(), scenario_extractor());
    let router = create_router_with_state(HandlerState::new(engine.clone()));

    for (id, image) in [("a", "img-a"), ("b", "img-b"), ("c", "img-c")] {
        let (status, header, body) = call(
            &router,
            post(&format!("/v1/items/{id}"), "image/jpeg", image.as_bytes().to_vec()),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(header, "stored");
        assert_eq!(body["item_id"], id);
    }

    let metadata = serde_json::json!({
        "items": { "c": { "brand": "Acme", "category": "boots" } }
    });
    let (status, _, _) = call(
        &router,
        post("/v1/catalog/metadata", "application/json", metadata.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, header, search) = call(
        &router,
        post(
            "/v1/search?top_k=2&brand=acme&category=Boots",
            "image/jpeg",
            b"query".to_vec(),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(header, "MATCH");
    assert_eq!(search["results"][0]["item_id"], "c");
    assert_eq!(search["results"][1]["item_id"], "a");
    assert_eq!(search["results"][0]["metadata"]["brand"], "Acme");

    let feedback = serde_json::json!({
        "query_id": search["query_id"],
        "item_id": "c",
        "signal": "explicit_rating",
        "value": 0.0
    });
    let (status, header, _) = call(
        &router,
        post("/v1/feedback", "application/json", feedback.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(header, "accepted");

    let request = Request::builder()
        .uri("/v1/stats")
        .body(Body::empty())
        .unwrap();
    let (status, _, stats) = call(&router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["searches"]["total_searches"], 1);
    assert_eq!(stats["searches"]["user_reported_failures"], 1);
    assert_eq!(stats["index"]["items"], 3);
    assert_eq!(stats["extractions"], 4);
}

#[tokio::test]
async fn test_empty_upload_is_rejected() {
    let engine = mock_engine(EngineConfig::default(), scenario_extractor());
    let router = create_router_with_state(HandlerState::new(engine));

    let (status, header, body) = call(
        &router,
        post("/v1/items/broken", "image/jpeg", Vec::<u8>::new()),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(header, "invalid_request");
    assert_eq!(body["retryable"], false);
    assert!(body["stage"].is_null());
}
