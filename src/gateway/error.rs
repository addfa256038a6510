use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use crate::engine::{SearchError, Stage};

use super::status::{LOOKALIKE_STATUS_ERROR, LOOKALIKE_STATUS_HEADER};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub stage: Option<String>,
    pub retryable: bool,
    pub code: String,
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Search(e) => match e {
                SearchError::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
                SearchError::UnreadableImage { .. } | SearchError::UnsupportedFormat { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                SearchError::DuplicateItemId { .. } => StatusCode::CONFLICT,
                SearchError::IndexNotTrained { .. }
                | SearchError::InfrastructureTimeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
                SearchError::DimensionMismatch { .. } | SearchError::Internal { .. } => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }

    fn body(&self) -> ErrorResponse {
        match self {
            GatewayError::InvalidRequest(reason) => ErrorResponse {
                error: reason.clone(),
                stage: None,
                retryable: false,
                code: "invalid_request".to_string(),
            },
            GatewayError::Search(e) => ErrorResponse {
                error: e.public_message(),
                stage: e.stage().map(|s: Stage| s.name().to_string()),
                retryable: e.is_retryable(),
                code: e.code().to_string(),
            },
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, status = status.as_u16(), "Request failed");
        }
        let body = self.body();

        let mut headers = HeaderMap::new();
        headers.insert(
            LOOKALIKE_STATUS_HEADER,
            HeaderValue::from_str(&body.code)
                .unwrap_or(HeaderValue::from_static(LOOKALIKE_STATUS_ERROR)),
        );

        (status, headers, Json(body)).into_response()
    }
}
