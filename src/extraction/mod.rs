//! Image to feature-vector extraction.
//!
//! - [`preprocess`] decodes and normalizes raw bytes.
//! - [`semantic`] and [`descriptors`] produce the typed sub-vectors.
//! - [`FeaturePipeline`] fuses them into one unit-norm [`FeatureVector`].

pub mod config;
pub mod descriptors;
/// Device selection (CPU / Metal / CUDA).
pub mod device;
mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod pipeline;
pub mod preprocess;
pub mod semantic;


pub use config::{ExtractorKind, ExtractorSpec, PipelineConfig};
pub use error::{ExtractionError, ExtractionResult};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockExtractor;
pub use pipeline::FeaturePipeline;

use crate::index::FeatureVector;

/// Turns encoded image bytes into a fixed-length unit-norm vector.
///
/// Implementations are CPU-bound and synchronous; async callers run them on the
/// blocking pool. Identical bytes must yield identical vectors.
pub trait FeatureExtractor: Send + Sync + 'static {
    /// Dimension of every vector this extractor returns.
    fn output_dim(&self) -> usize;

    fn extract(&self, bytes: &[u8]) -> ExtractionResult<FeatureVector>;
}
