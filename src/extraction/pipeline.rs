use tracing::{debug, info};

use crate::constants::validate_embedding_dim;
use crate::index::FeatureVector;
use crate::index::model::l2_normalize_in_place;

use super::FeatureExtractor;
use super::config::{ExtractorKind, PipelineConfig};
use super::descriptors::{color_histogram, texture_descriptor};
use super::error::{ExtractionError, ExtractionResult};
use super::preprocess::{PreparedImage, decode, prepare};
use super::semantic::SemanticEncoder;

/// Weighted concatenation of typed sub-extractors.
///
/// Each block is L2-normalized, scaled by its weight, concatenated in configuration order
/// and the result re-normalized.
#[derive(Debug)]
pub struct FeaturePipeline {
    config: PipelineConfig,
    semantic: Option<SemanticEncoder>,
    output_dim: usize,
}

impl FeaturePipeline {
    pub fn new(config: PipelineConfig) -> ExtractionResult<Self> {
        config.validate()?;

        let semantic = if config.uses(ExtractorKind::Semantic) {
            Some(match &config.model_path {
                Some(path) => SemanticEncoder::load(path)?,
                None => SemanticEncoder::stub()?,
            })
        } else {
            None
        };

        let output_dim = config.output_dim();
        info!(
            output_dim,
            extractors = ?config.extractors.iter().map(|e| e.kind.name()).collect::<Vec<_>>(),
            "Feature pipeline ready"
        );

        Ok(Self {
            config,
            semantic,
            output_dim,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn block(&self, kind: ExtractorKind, image: &PreparedImage) -> ExtractionResult<Vec<f32>> {
        match kind {
            ExtractorKind::Semantic => self
                .semantic
                .as_ref()
                .ok_or_else(|| ExtractionError::InvalidConfig {
                    reason: "semantic encoder not loaded".to_string(),
                })?
                .encode(image),
            ExtractorKind::ColorHistogram => Ok(color_histogram(&image.rgb)),
            ExtractorKind::Texture => Ok(texture_descriptor(&image.rgb)),
        }
    }
}

impl FeatureExtractor for FeaturePipeline {
    fn output_dim(&self) -> usize {
        self.output_dim
    }

    fn extract(&self, bytes: &[u8]) -> ExtractionResult<FeatureVector> {
        let image = decode(bytes)?;
        let prepared = prepare(&image, self.config.input_size);

        let mut fused = Vec::with_capacity(self.output_dim);
        for spec in &self.config.extractors {
            let mut block = self.block(spec.kind, &prepared)?;
            if block.len() != spec.kind.output_dim() {
                return Err(ExtractionError::InferenceFailed {
                    reason: format!(
                        "{} produced {} values, declared {}",
                        spec.kind.name(),
                        block.len(),
                        spec.kind.output_dim()
                    ),
                });
            }
            l2_normalize_in_place(&mut block);
            fused.extend(block.into_iter().map(|v| v * spec.weight));
        }

        validate_embedding_dim(fused.len(), self.output_dim).map_err(|e| {
            ExtractionError::InferenceFailed {
                reason: e.to_string(),
            }
        })?;
        let vector = FeatureVector::new(fused);
        if !vector.is_finite() {
            return Err(ExtractionError::InferenceFailed {
                reason: "non-finite feature value".to_string(),
            });
        }
        debug!(bytes = bytes.len(), dim = vector.dim(), "Features extracted");
        Ok(vector)
    }
}
