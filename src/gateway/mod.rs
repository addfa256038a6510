//! HTTP gateway (axum) over a [`SearchEngine`](crate::engine::SearchEngine).
//!
//! This module is primarily used by the `lookalike` server binary.

pub mod error;
pub mod handler;
pub mod payload;
pub mod state;
pub mod status;

#[cfg(test)]
mod handler_tests;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode, header::HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

pub use error::{ErrorResponse, GatewayError};
pub use handler::{
    feedback_handler, ingest_handler, metadata_handler, search_handler, stats_handler,
    thresholds_handler, train_handler, training_sample_handler,
};
pub use state::HandlerState;
pub use status::{
    LOOKALIKE_CACHE_HEADER, LOOKALIKE_STATUS_ACCEPTED, LOOKALIKE_STATUS_ERROR,
    LOOKALIKE_STATUS_HEADER, LOOKALIKE_STATUS_HEALTHY, LOOKALIKE_STATUS_NOT_READY,
    LOOKALIKE_STATUS_READY, LOOKALIKE_STATUS_STORED, SearchStatus,
};

use crate::extraction::FeatureExtractor;
use crate::metadata::MetadataStore;

/// Largest accepted request body (raw image uploads).
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

pub fn create_router_with_state<E, M>(state: HandlerState<E, M>) -> Router
where
    E: FeatureExtractor,
    M: MetadataStore,
{
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/ready", get(ready_handler))
        .route("/v1/search", post(search_handler))
        .route("/v1/items/{item_id}", post(ingest_handler))
        .route("/v1/catalog/metadata", post(metadata_handler))
        .route("/v1/index/samples", post(training_sample_handler))
        .route("/v1/index/train", post(train_handler))
        .route("/v1/feedback", post(feedback_handler))
        .route("/v1/thresholds", get(thresholds_handler))
        .route("/v1/stats", get(stats_handler))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(serde::Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(serde::Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub components: ComponentStatus,
}

#[derive(serde::Serialize)]
pub struct ComponentStatus {
    pub http: &'static str,
    pub index: &'static str,
    pub index_variant: &'static str,
    pub items: usize,
}

#[tracing::instrument]
pub async fn health_handler() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(
        LOOKALIKE_STATUS_HEADER,
        HeaderValue::from_static(LOOKALIKE_STATUS_HEALTHY),
    );

    (
        StatusCode::OK,
        headers,
        Json(HealthResponse { status: "ok" }),
    )
        .into_response()
}

/// Ready once the index can accept items (flat, or a trained IVF variant).
#[tracing::instrument(skip(state))]
pub async fn ready_handler<E, M>(State(state): State<HandlerState<E, M>>) -> Response
where
    E: FeatureExtractor,
    M: MetadataStore,
{
    let generation = state.engine.index().pin();
    let is_ready = generation.is_trained();

    let components = ComponentStatus {
        http: LOOKALIKE_STATUS_READY,
        index: if is_ready {
            LOOKALIKE_STATUS_READY
        } else {
            LOOKALIKE_STATUS_NOT_READY
        },
        index_variant: generation.variant().name(),
        items: generation.len(),
    };

    let (status_code, status_msg) = if is_ready {
        (StatusCode::OK, LOOKALIKE_STATUS_READY)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, LOOKALIKE_STATUS_NOT_READY)
    };

    let mut headers = HeaderMap::new();
    headers.insert(LOOKALIKE_STATUS_HEADER, HeaderValue::from_static(status_msg));

    (
        status_code,
        headers,
        Json(ReadyResponse {
            status: status_msg,
            components,
        }),
    )
        .into_response()
}
