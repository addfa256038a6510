//! Semantic embedding: average-pooled normalized pixels through a linear projection.
//!
//! Real deployments load the projection from safetensors. Without weights the encoder
//! runs in stub mode with a fixed pseudo-random projection, which keeps outputs
//! deterministic and still maps similar images to nearby vectors.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use tracing::{debug, info, warn};

use crate::constants::SEMANTIC_EMBEDDING_DIM;

use super::device::select_device;
use super::error::{ExtractionError, ExtractionResult};
use super::preprocess::PreparedImage;

/// Pooled feature map is `POOL_GRID x POOL_GRID` per channel.
pub const POOL_GRID: usize = 7;

/// Flattened pooled input length (3 channels).
pub const POOLED_DIM: usize = 3 * POOL_GRID * POOL_GRID;

/// Safetensors key holding the `[POOLED_DIM, SEMANTIC_EMBEDDING_DIM]` matrix.
pub const PROJECTION_TENSOR: &str = "projection";

const STUB_SEED: u64 = 0x5EED_1A6E;

pub struct SemanticEncoder {
    device: Device,
    projection: Tensor,
    stub: bool,
}

impl std::fmt::Debug for SemanticEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticEncoder")
            .field("device", &self.device)
            .field("stub", &self.stub)
            .field("output_dim", &SEMANTIC_EMBEDDING_DIM)
            .finish()
    }
}

impl SemanticEncoder {
    /// Loads projection weights from a safetensors file.
    pub fn load(path: &Path) -> ExtractionResult<Self> {
        if !path.is_file() {
            return Err(ExtractionError::ModelNotFound {
                path: path.to_path_buf(),
            });
        }
        let device = select_device();
        let mut tensors = candle_core::safetensors::load(path, &device).map_err(|e| {
            ExtractionError::ModelLoadFailed {
                reason: format!("failed to read safetensors: {}", e),
            }
        })?;
        let projection =
            tensors
                .remove(PROJECTION_TENSOR)
                .ok_or_else(|| ExtractionError::ModelLoadFailed {
                    reason: format!("tensor '{}' missing", PROJECTION_TENSOR),
                })?;

        let dims = projection.dims();
        if dims != [POOLED_DIM, SEMANTIC_EMBEDDING_DIM].as_slice() {
            return Err(ExtractionError::InvalidConfig {
                reason: format!(
                    "projection shape {:?}, expected [{}, {}]",
                    dims, POOLED_DIM, SEMANTIC_EMBEDDING_DIM
                ),
            });
        }
        let projection = projection.to_dtype(DType::F32)?;

        info!(
            path = %path.display(),
            output_dim = SEMANTIC_EMBEDDING_DIM,
            "Semantic projection loaded"
        );
        Ok(Self {
            device,
            projection,
            stub: false,
        })
    }

    /// Deterministic projection for tests and weightless deployments.
    pub fn stub() -> ExtractionResult<Self> {
        warn!("Semantic encoder running in STUB mode");
        let device = select_device();

        let scale = 1.0 / (POOLED_DIM as f32).sqrt();
        let mut state = STUB_SEED;
        let weights: Vec<f32> = (0..POOLED_DIM * SEMANTIC_EMBEDDING_DIM)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                (((state >> 32) as f32 / u32::MAX as f32) * 2.0 - 1.0) * scale
            })
            .collect();
        let projection = Tensor::from_vec(weights, (POOLED_DIM, SEMANTIC_EMBEDDING_DIM), &device)?;

        Ok(Self {
            device,
            projection,
            stub: true,
        })
    }

    pub fn is_stub(&self) -> bool {
        self.stub
    }

    /// Returns the raw (unnormalized) semantic block.
    pub fn encode(&self, image: &PreparedImage) -> ExtractionResult<Vec<f32>> {
        let size = image.size as usize;
        let window = size / POOL_GRID;

        let input = Tensor::from_slice(&image.chw, (1, 3, size, size), &self.device)?;
        let pooled = input.avg_pool2d(window)?.reshape((1, POOLED_DIM))?;
        let embedding = pooled.matmul(&self.projection)?.flatten_all()?.to_vec1::<f32>()?;

        debug!(dim = embedding.len(), stub = self.stub, "Semantic block computed");
        Ok(embedding)
    }
}
