use thiserror::Error;

use crate::constants::DimValidationError;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum IndexError {
    #[error("dimension mismatch: index holds {expected}-d vectors, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("{variant} index must be trained before vectors can be added")]
    IndexNotTrained { variant: &'static str },

    #[error("item '{item_id}' is already indexed")]
    DuplicateItemId { item_id: String },

    #[error("training needs at least {required} samples, got {provided}")]
    InsufficientTrainingData { required: usize, provided: usize },

    #[error("invalid vector for item '{item_id}': {reason}")]
    InvalidVector { item_id: String, reason: String },

    #[error("invalid index configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("snapshot does not describe a valid index: {reason}")]
    CorruptSnapshot { reason: String },
}

pub type IndexResult<T> = Result<T, IndexError>;

impl From<DimValidationError> for IndexError {
    fn from(err: DimValidationError) -> Self {
        match err {
            DimValidationError::DimensionMismatch { expected, actual } => {
                IndexError::DimensionMismatch { expected, actual }
            }
            other => IndexError::InvalidConfig {
                reason: other.to_string(),
            },
        }
    }
}
