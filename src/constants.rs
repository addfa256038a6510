//! Cross-cutting, shared constants.
//!
//! Prefer deriving secondary constants (e.g. fused dimensions) from primary ones to avoid drift.
//!
//! # Dimension Invariants
//!
//! Every vector held by one index generation has the same dimensionality. The pipeline
//! declares its output dimension at configuration time and the index is created with it:
//!
//! 1. Use [`DimConfig`] to pass dimensions through initialization
//! 2. Use [`validate_embedding_dim`] at module boundaries to catch mismatches early
//! 3. The compile-time constants remain as defaults for the standard pipeline

use thiserror::Error;

/// Side length (pixels) of the square model input after center crop.
pub const MODEL_INPUT_SIZE: u32 = 224;

/// Smallest accepted source image edge.
pub const MIN_IMAGE_EDGE: u32 = 16;

/// Largest accepted source image edge.
pub const MAX_IMAGE_EDGE: u32 = 12_000;

/// ImageNet per-channel mean (RGB).
pub const CHANNEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// ImageNet per-channel standard deviation (RGB).
pub const CHANNEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub const SEMANTIC_EMBEDDING_DIM: usize = 128;
pub const COLOR_HISTOGRAM_BINS: usize = 4;
pub const COLOR_HISTOGRAM_DIM: usize =
    COLOR_HISTOGRAM_BINS * COLOR_HISTOGRAM_BINS * COLOR_HISTOGRAM_BINS;
pub const TEXTURE_GRID: usize = 4;
pub const TEXTURE_ORIENTATIONS: usize = 8;
pub const TEXTURE_DIM: usize = TEXTURE_GRID * TEXTURE_GRID * TEXTURE_ORIENTATIONS;

/// Output dimension of the default (semantic + color + texture) pipeline.
pub const DEFAULT_EMBEDDING_DIM: usize = SEMANTIC_EMBEDDING_DIM + COLOR_HISTOGRAM_DIM + TEXTURE_DIM;

pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_MIN_SIMILARITY: f32 = 0.70;

/// Runtime dimension configuration for modules that agree on vector sizes at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DimConfig {
    /// The feature vector dimension (number of floats).
    pub embedding_dim: usize,
}

impl Default for DimConfig {
    fn default() -> Self {
        Self {
            embedding_dim: DEFAULT_EMBEDDING_DIM,
        }
    }
}

impl DimConfig {
    /// Creates a new dimension configuration with the specified feature dimension.
    pub fn new(embedding_dim: usize) -> Self {
        Self { embedding_dim }
    }

    /// Validates that this configuration is usable.
    ///
    /// Product quantization splits vectors into equal subspaces, so a quantized index
    /// additionally checks [`DimConfig::validate_subspaces`].
    pub fn validate(&self) -> Result<(), DimValidationError> {
        if self.embedding_dim == 0 {
            return Err(DimValidationError::ZeroDimension);
        }
        Ok(())
    }

    /// Checks that the dimension splits evenly into `subspaces` chunks.
    pub fn validate_subspaces(&self, subspaces: usize) -> Result<(), DimValidationError> {
        self.validate()?;
        if subspaces == 0 || !self.embedding_dim.is_multiple_of(subspaces) {
            return Err(DimValidationError::NotDivisible {
                dim: self.embedding_dim,
                subspaces,
            });
        }
        Ok(())
    }
}

/// Error returned when dimension validation fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DimValidationError {
    #[error("feature dimension cannot be zero")]
    ZeroDimension,

    #[error("feature dimension {dim} does not split into {subspaces} subspaces")]
    NotDivisible { dim: usize, subspaces: usize },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Validates that a runtime feature dimension matches the expected dimension.
///
/// # Example
///
/// ```
/// use lookalike::constants::{validate_embedding_dim, DEFAULT_EMBEDDING_DIM};
///
/// let pipeline_dim = DEFAULT_EMBEDDING_DIM;
/// validate_embedding_dim(pipeline_dim, DEFAULT_EMBEDDING_DIM).unwrap();
/// ```
pub fn validate_embedding_dim(actual: usize, expected: usize) -> Result<(), DimValidationError> {
    if actual != expected {
        return Err(DimValidationError::DimensionMismatch { expected, actual });
    }
    Ok(())
}
