use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExtractionError {
    #[error("image could not be decoded: {reason}")]
    UnreadableImage { reason: String },

    #[error("unsupported image dimensions {width}x{height}")]
    UnsupportedFormat { width: u32, height: u32 },

    #[error("projection weights not found at path: {path}")]
    ModelNotFound { path: PathBuf },

    #[error("failed to load projection weights: {reason}")]
    ModelLoadFailed { reason: String },

    #[error("feature inference failed: {reason}")]
    InferenceFailed { reason: String },

    #[error("invalid pipeline configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl From<candle_core::Error> for ExtractionError {
    fn from(err: candle_core::Error) -> Self {
        ExtractionError::InferenceFailed {
            reason: err.to_string(),
        }
    }
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;
