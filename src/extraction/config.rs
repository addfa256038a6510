use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{COLOR_HISTOGRAM_DIM, MODEL_INPUT_SIZE, SEMANTIC_EMBEDDING_DIM, TEXTURE_DIM};

use super::error::{ExtractionError, ExtractionResult};

/// A typed sub-extractor with a fixed output dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    /// Pooled pixels projected into a learned (or stub) embedding space.
    Semantic,
    /// Joint RGB histogram.
    ColorHistogram,
    /// Gradient-orientation histogram over a spatial grid.
    Texture,
}

impl ExtractorKind {
    pub fn output_dim(&self) -> usize {
        match self {
            ExtractorKind::Semantic => SEMANTIC_EMBEDDING_DIM,
            ExtractorKind::ColorHistogram => COLOR_HISTOGRAM_DIM,
            ExtractorKind::Texture => TEXTURE_DIM,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExtractorKind::Semantic => "semantic",
            ExtractorKind::ColorHistogram => "color_histogram",
            ExtractorKind::Texture => "texture",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtractorSpec {
    pub kind: ExtractorKind,
    /// Multiplier applied to the block after it is normalized.
    pub weight: f32,
}

impl ExtractorSpec {
    pub fn new(kind: ExtractorKind, weight: f32) -> Self {
        Self { kind, weight }
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Configuration for [`FeaturePipeline`](super::FeaturePipeline).
pub struct PipelineConfig {
    /// Sub-extractors in concatenation order.
    pub extractors: Vec<ExtractorSpec>,
    /// Square model input edge after center crop.
    pub input_size: u32,
    /// Semantic projection weights (safetensors, tensor `projection`).
    /// `None` selects the deterministic stub projection.
    pub model_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            extractors: vec![
                ExtractorSpec::new(ExtractorKind::Semantic, 1.0),
                ExtractorSpec::new(ExtractorKind::ColorHistogram, 0.5),
                ExtractorSpec::new(ExtractorKind::Texture, 0.5),
            ],
            input_size: MODEL_INPUT_SIZE,
            model_path: None,
        }
    }
}

impl PipelineConfig {
    /// Starts from an empty extractor list.
    pub fn empty() -> Self {
        Self {
            extractors: Vec::new(),
            ..Default::default()
        }
    }

    pub fn with_extractor(mut self, kind: ExtractorKind, weight: f32) -> Self {
        self.extractors.push(ExtractorSpec::new(kind, weight));
        self
    }

    pub fn model_path(mut self, path: Option<PathBuf>) -> Self {
        self.model_path = path;
        self
    }

    pub fn input_size(mut self, size: u32) -> Self {
        self.input_size = size;
        self
    }

    /// Sum of the declared sub-extractor dimensions.
    pub fn output_dim(&self) -> usize {
        self.extractors.iter().map(|e| e.kind.output_dim()).sum()
    }

    pub fn uses(&self, kind: ExtractorKind) -> bool {
        self.extractors.iter().any(|e| e.kind == kind)
    }

    pub fn validate(&self) -> ExtractionResult<()> {
        if self.extractors.is_empty() {
            return Err(ExtractionError::InvalidConfig {
                reason: "at least one extractor is required".to_string(),
            });
        }
        for spec in &self.extractors {
            if !spec.weight.is_finite() || spec.weight <= 0.0 {
                return Err(ExtractionError::InvalidConfig {
                    reason: format!(
                        "{} weight must be positive, got {}",
                        spec.kind.name(),
                        spec.weight
                    ),
                });
            }
        }
        let mut kinds: Vec<_> = self.extractors.iter().map(|e| e.kind).collect();
        kinds.sort_by_key(|k| k.name());
        kinds.dedup();
        if kinds.len() != self.extractors.len() {
            return Err(ExtractionError::InvalidConfig {
                reason: "each extractor kind may appear once".to_string(),
            });
        }
        if self.uses(ExtractorKind::Semantic)
            && !self.input_size.is_multiple_of(super::semantic::POOL_GRID as u32)
        {
            return Err(ExtractionError::InvalidConfig {
                reason: format!(
                    "input_size {} is not divisible by the {}x{} pooling grid",
                    self.input_size,
                    super::semantic::POOL_GRID,
                    super::semantic::POOL_GRID
                ),
            });
        }
        if self.input_size < crate::constants::MIN_IMAGE_EDGE {
            return Err(ExtractionError::InvalidConfig {
                reason: format!("input_size {} is too small", self.input_size),
            });
        }
        Ok(())
    }
}
