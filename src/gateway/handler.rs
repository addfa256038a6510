use axum::{
    Json,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, info, instrument};

use crate::constants::validate_embedding_dim;
use crate::extraction::FeatureExtractor;
use crate::index::{FeatureVector, WriteMode};
use crate::metadata::MetadataStore;

use super::error::GatewayError;
use super::payload::{
    AcceptedResponse, FeedbackPayload, IngestParams, IngestResponse, MetadataPayload,
    MetadataResponse, SampleResponse, SearchParams, TrainPayload, TrainResponse,
};
use super::state::HandlerState;
use super::status::{
    LOOKALIKE_CACHE_HEADER, LOOKALIKE_STATUS_ACCEPTED, LOOKALIKE_STATUS_HEADER,
    LOOKALIKE_STATUS_STORED, SearchStatus, cache_header_value,
};

#[instrument(skip(state, params, body), fields(bytes = body.len()))]
pub async fn search_handler<E, M>(
    State(state): State<HandlerState<E, M>>,
    params: Result<Query<SearchParams>, QueryRejection>,
    body: Bytes,
) -> Result<Response, GatewayError>
where
    E: FeatureExtractor,
    M: MetadataStore,
{
    let Query(params) = params.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;
    require_body(&body)?;

    let request = params.into_request();
    let response = state.engine.search(&body, &request).await?;
    let status = SearchStatus::of(&response);
    debug!(status = %status, results = response.results.len(), "Search answered");

    let mut headers = HeaderMap::new();
    headers.insert(
        LOOKALIKE_STATUS_HEADER,
        HeaderValue::from_static(status.as_header_value()),
    );
    headers.insert(
        LOOKALIKE_CACHE_HEADER,
        HeaderValue::from_static(cache_header_value(response.cached)),
    );
    Ok((StatusCode::OK, headers, Json(response)).into_response())
}

#[instrument(skip(state, params, body), fields(item_id = %item_id, bytes = body.len()))]
pub async fn ingest_handler<E, M>(
    State(state): State<HandlerState<E, M>>,
    Path(item_id): Path<String>,
    params: Result<Query<IngestParams>, QueryRejection>,
    body: Bytes,
) -> Result<Response, GatewayError>
where
    E: FeatureExtractor,
    M: MetadataStore,
{
    let Query(params) = params.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;
    require_body(&body)?;

    let mode = if params.replace {
        WriteMode::Replace
    } else {
        WriteMode::Insert
    };
    state.engine.ingest_item(&item_id, &body, mode).await?;

    let index = state.engine.index();
    let payload = IngestResponse {
        item_id,
        items: index.len(),
        generation: index.generation_id(),
    };
    Ok(with_status(StatusCode::CREATED, LOOKALIKE_STATUS_STORED, Json(payload)))
}

#[instrument(skip(state, payload))]
pub async fn metadata_handler<E, M>(
    State(state): State<HandlerState<E, M>>,
    payload: Result<Json<MetadataPayload>, JsonRejection>,
) -> Result<Response, GatewayError>
where
    E: FeatureExtractor,
    M: MetadataStore,
{
    let Json(payload) = payload.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;

    let store = state.engine.metadata_store();
    let updated = payload.items.len();
    for (item_id, metadata) in payload.items {
        store.put(&item_id, metadata);
    }
    info!(updated, total = store.len(), "Catalog metadata updated");

    Ok(with_status(
        StatusCode::OK,
        LOOKALIKE_STATUS_STORED,
        Json(MetadataResponse { updated }),
    ))
}

#[instrument(skip(state, payload))]
pub async fn feedback_handler<E, M>(
    State(state): State<HandlerState<E, M>>,
    payload: Result<Json<FeedbackPayload>, JsonRejection>,
) -> Result<Response, GatewayError>
where
    E: FeatureExtractor,
    M: MetadataStore,
{
    let Json(payload) = payload.map_err(|e| GatewayError::InvalidRequest(e.body_text()))?;
    state.engine.submit_feedback(
        payload.query_id,
        &payload.item_id,
        payload.signal,
        payload.value,
    )?;

    Ok(with_status(
        StatusCode::ACCEPTED,
        LOOKALIKE_STATUS_ACCEPTED,
        Json(AcceptedResponse {
            status: LOOKALIKE_STATUS_ACCEPTED.to_string(),
        }),
    ))
}

/// Buffers one raw image as an index training sample.
#[instrument(skip(state, body), fields(bytes = body.len()))]
pub async fn training_sample_handler<E, M>(
    State(state): State<HandlerState<E, M>>,
    body: Bytes,
) -> Result<Response, GatewayError>
where
    E: FeatureExtractor,
    M: MetadataStore,
{
    require_body(&body)?;
    let buffered = state.engine.add_training_sample(&body).await?;
    debug!(buffered, "Training sample buffered");

    Ok(with_status(
        StatusCode::ACCEPTED,
        LOOKALIKE_STATUS_ACCEPTED,
        Json(SampleResponse { buffered }),
    ))
}

/// Trains the index on buffered samples plus any vectors in the body.
#[instrument(skip(state, body), fields(bytes = body.len()))]
pub async fn train_handler<E, M>(
    State(state): State<HandlerState<E, M>>,
    body: Bytes,
) -> Result<Response, GatewayError>
where
    E: FeatureExtractor,
    M: MetadataStore,
{
    let payload = if body.is_empty() {
        TrainPayload::default()
    } else {
        serde_json::from_slice::<TrainPayload>(&body)
            .map_err(|e| GatewayError::InvalidRequest(format!("invalid training body: {e}")))?
    };

    let dimension = state.engine.index().dimension();
    let mut vectors = Vec::with_capacity(payload.vectors.len());
    for values in payload.vectors {
        validate_embedding_dim(values.len(), dimension)
            .map_err(|e| GatewayError::InvalidRequest(e.to_string()))?;
        if values.iter().any(|v| !v.is_finite()) {
            return Err(GatewayError::InvalidRequest(
                "training vectors must be finite".to_string(),
            ));
        }
        vectors.push(FeatureVector::new(values));
    }

    let samples = state.engine.train_buffered(vectors).await?;
    let generation = state.engine.index().pin();
    let payload = TrainResponse {
        samples,
        variant: generation.variant().name().to_string(),
        generation: generation.id(),
        trained: generation.is_trained(),
    };
    Ok(with_status(StatusCode::OK, LOOKALIKE_STATUS_STORED, Json(payload)))
}

pub async fn thresholds_handler<E, M>(State(state): State<HandlerState<E, M>>) -> Response
where
    E: FeatureExtractor,
    M: MetadataStore,
{
    Json(state.engine.thresholds()).into_response()
}

pub async fn stats_handler<E, M>(State(state): State<HandlerState<E, M>>) -> Response
where
    E: FeatureExtractor,
    M: MetadataStore,
{
    Json(state.engine.stats()).into_response()
}

fn require_body(body: &Bytes) -> Result<(), GatewayError> {
    if body.is_empty() {
        return Err(GatewayError::InvalidRequest(
            "request body must contain an image".to_string(),
        ));
    }
    Ok(())
}

fn with_status(status: StatusCode, value: &'static str, body: impl IntoResponse) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(LOOKALIKE_STATUS_HEADER, HeaderValue::from_static(value));
    (status, headers, body).into_response()
}
