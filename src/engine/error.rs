//! Engine error types.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::extraction::ExtractionError;
use crate::index::IndexError;
use crate::storage::StorageError;

/// Pipeline stage a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Extraction,
    Index,
    Rerank,
    Cache,
    Ingest,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Extraction => "extraction",
            Stage::Index => "index",
            Stage::Rerank => "rerank",
            Stage::Cache => "cache",
            Stage::Ingest => "ingest",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure of a search or ingest request.
///
/// `Clone` so every waiter on a shared computation observes the same failure.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SearchError {
    #[error("image could not be decoded: {reason}")]
    UnreadableImage { reason: String },

    #[error("unsupported image dimensions {width}x{height}")]
    UnsupportedFormat { width: u32, height: u32 },

    #[error("{variant} index is not trained")]
    IndexNotTrained { variant: &'static str },

    #[error("dimension mismatch: index holds {expected}-d vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{stage} timed out after {attempts} attempt(s)")]
    InfrastructureTimeout { stage: Stage, attempts: u32 },

    #[error("item '{item_id}' is already indexed")]
    DuplicateItemId { item_id: String },

    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("{stage} failed: {reason}")]
    Internal { stage: Stage, reason: String },
}

impl SearchError {
    pub(crate) fn internal(stage: Stage, reason: impl fmt::Display) -> Self {
        SearchError::Internal {
            stage,
            reason: reason.to_string(),
        }
    }

    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        SearchError::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Stage the failure happened in; `None` for rejected requests.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            SearchError::UnreadableImage { .. } | SearchError::UnsupportedFormat { .. } => {
                Some(Stage::Extraction)
            }
            SearchError::IndexNotTrained { .. } | SearchError::DimensionMismatch { .. } => {
                Some(Stage::Index)
            }
            SearchError::DuplicateItemId { .. } => Some(Stage::Ingest),
            SearchError::InvalidRequest { .. } => None,
            SearchError::InfrastructureTimeout { stage, .. }
            | SearchError::Internal { stage, .. } => Some(*stage),
        }
    }

    /// Transient failures the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SearchError::InfrastructureTimeout { .. })
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            SearchError::UnreadableImage { .. } => "unreadable_image",
            SearchError::UnsupportedFormat { .. } => "unsupported_format",
            SearchError::IndexNotTrained { .. } => "index_not_trained",
            SearchError::DimensionMismatch { .. } => "dimension_mismatch",
            SearchError::InfrastructureTimeout { .. } => "infrastructure_timeout",
            SearchError::DuplicateItemId { .. } => "duplicate_item_id",
            SearchError::InvalidRequest { .. } => "invalid_request",
            SearchError::Internal { .. } => "internal",
        }
    }

    /// Message safe to return to clients (no internal detail).
    pub fn public_message(&self) -> String {
        match self {
            SearchError::UnreadableImage { .. } => "image could not be decoded".to_string(),
            SearchError::UnsupportedFormat { width, height } => {
                format!("unsupported image dimensions {width}x{height}")
            }
            SearchError::IndexNotTrained { .. } => "index is not ready".to_string(),
            SearchError::DimensionMismatch { .. } => {
                "query is incompatible with the index".to_string()
            }
            SearchError::InfrastructureTimeout { stage, .. } => {
                format!("{stage} is temporarily unavailable")
            }
            SearchError::DuplicateItemId { item_id } => {
                format!("item '{item_id}' is already indexed")
            }
            SearchError::InvalidRequest { reason } => reason.clone(),
            SearchError::Internal { stage, .. } => format!("{stage} failed"),
        }
    }
}

impl From<ExtractionError> for SearchError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::UnreadableImage { reason } => SearchError::UnreadableImage { reason },
            ExtractionError::UnsupportedFormat { width, height } => {
                SearchError::UnsupportedFormat { width, height }
            }
            other => SearchError::internal(Stage::Extraction, other),
        }
    }
}

impl From<IndexError> for SearchError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::IndexNotTrained { variant } => SearchError::IndexNotTrained { variant },
            IndexError::DimensionMismatch { expected, actual } => {
                SearchError::DimensionMismatch { expected, actual }
            }
            IndexError::DuplicateItemId { item_id } => SearchError::DuplicateItemId { item_id },
            IndexError::InvalidVector { .. } | IndexError::InsufficientTrainingData { .. } => {
                SearchError::invalid(err.to_string())
            }
            other => SearchError::internal(Stage::Index, other),
        }
    }
}

/// Failure to construct or persist an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),

    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("extractor produces {extractor}-d vectors but the index holds {index}-d vectors")]
    DimensionMismatch { extractor: usize, index: usize },
}

pub type EngineResult<T> = Result<T, EngineError>;
