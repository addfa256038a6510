use serde::{Deserialize, Serialize};

use crate::constants::DimConfig;

use super::error::{IndexError, IndexResult};

/// Largest catalog served by exact (flat) search.
pub const FLAT_MAX_ITEMS: usize = 10_000;
/// Largest catalog served by IVF without quantization.
pub const IVF_MAX_ITEMS: usize = 100_000;
pub const MAX_PARTITIONS: usize = 4096;
pub const DEFAULT_NPROBE: usize = 8;
pub const DEFAULT_PQ_SUBSPACES: usize = 16;
pub const DEFAULT_PQ_CODEBOOK_SIZE: usize = 256;
pub const MIN_OVERFETCH_FACTOR: usize = 2;
pub const DEFAULT_OVERFETCH_FACTOR: usize = 4;
pub const DEFAULT_KMEANS_ITERATIONS: usize = 20;
pub const DEFAULT_TRAINING_SEED: u64 = 42;

/// Index structure, declared in configuration rather than detected at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexVariant {
    /// Exact inner-product scan.
    #[default]
    Flat,
    /// Inverted file: k-means partitions, `nprobe` of them scanned per query.
    Ivf { partitions: usize, nprobe: usize },
    /// Inverted file with product-quantized rows.
    IvfPq {
        partitions: usize,
        nprobe: usize,
        subspaces: usize,
        codebook_size: usize,
    },
}

impl IndexVariant {
    /// Picks the variant for an expected catalog size.
    ///
    /// | items | variant |
    /// |-------|---------|
    /// | `< 10k` | flat |
    /// | `10k..=100k` | IVF, `min(4096, n/100)` partitions |
    /// | `> 100k` | IVF + PQ |
    pub fn for_catalog_size(expected_items: usize, nprobe: usize) -> Self {
        let partitions = (expected_items / 100).clamp(1, MAX_PARTITIONS);
        let nprobe = nprobe.clamp(1, partitions);
        if expected_items < FLAT_MAX_ITEMS {
            Self::Flat
        } else if expected_items <= IVF_MAX_ITEMS {
            Self::Ivf { partitions, nprobe }
        } else {
            Self::IvfPq {
                partitions,
                nprobe,
                subspaces: DEFAULT_PQ_SUBSPACES,
                codebook_size: DEFAULT_PQ_CODEBOOK_SIZE,
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Flat => "flat",
            Self::Ivf { .. } => "ivf",
            Self::IvfPq { .. } => "ivf_pq",
        }
    }

    /// Returns `true` for variants that need `train` before `add`.
    pub fn requires_training(&self) -> bool {
        !matches!(self, Self::Flat)
    }

    pub fn partitions(&self) -> usize {
        match self {
            Self::Flat => 1,
            Self::Ivf { partitions, .. } | Self::IvfPq { partitions, .. } => *partitions,
        }
    }

    pub fn nprobe(&self) -> usize {
        match self {
            Self::Flat => 1,
            Self::Ivf { nprobe, .. } | Self::IvfPq { nprobe, .. } => *nprobe,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexConfig {
    pub variant: IndexVariant,
    /// Candidates returned per requested result; the reranker needs headroom to reorder.
    pub overfetch_factor: usize,
    pub kmeans_iterations: usize,
    pub training_seed: u64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            variant: IndexVariant::Flat,
            overfetch_factor: DEFAULT_OVERFETCH_FACTOR,
            kmeans_iterations: DEFAULT_KMEANS_ITERATIONS,
            training_seed: DEFAULT_TRAINING_SEED,
        }
    }
}

impl IndexConfig {
    pub fn for_catalog_size(expected_items: usize, nprobe: usize) -> Self {
        Self {
            variant: IndexVariant::for_catalog_size(expected_items, nprobe),
            ..Default::default()
        }
    }

    pub fn variant(mut self, variant: IndexVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn overfetch_factor(mut self, factor: usize) -> Self {
        self.overfetch_factor = factor;
        self
    }

    pub fn training_seed(mut self, seed: u64) -> Self {
        self.training_seed = seed;
        self
    }

    /// Number of candidates an index search returns for `top_k` results.
    #[inline]
    pub fn candidate_limit(&self, top_k: usize) -> usize {
        top_k.saturating_mul(self.overfetch_factor)
    }

    pub fn validate(&self, dimension: usize) -> IndexResult<()> {
        let dims = DimConfig::new(dimension);
        dims.validate()?;

        if self.overfetch_factor < MIN_OVERFETCH_FACTOR {
            return Err(IndexError::InvalidConfig {
                reason: format!(
                    "overfetch_factor must be >= {}, got {}",
                    MIN_OVERFETCH_FACTOR, self.overfetch_factor
                ),
            });
        }
        if self.kmeans_iterations == 0 {
            return Err(IndexError::InvalidConfig {
                reason: "kmeans_iterations must be > 0".to_string(),
            });
        }

        match self.variant {
            IndexVariant::Flat => Ok(()),
            IndexVariant::Ivf { partitions, nprobe } => validate_ivf(partitions, nprobe),
            IndexVariant::IvfPq {
                partitions,
                nprobe,
                subspaces,
                codebook_size,
            } => {
                validate_ivf(partitions, nprobe)?;
                dims.validate_subspaces(subspaces)?;
                if codebook_size == 0 || codebook_size > 256 {
                    return Err(IndexError::InvalidConfig {
                        reason: format!(
                            "codebook_size must be in 1..=256 (u8 codes), got {}",
                            codebook_size
                        ),
                    });
                }
                Ok(())
            }
        }
    }
}

fn validate_ivf(partitions: usize, nprobe: usize) -> IndexResult<()> {
    if partitions == 0 || partitions > MAX_PARTITIONS {
        return Err(IndexError::InvalidConfig {
            reason: format!(
                "partitions must be in 1..={}, got {}",
                MAX_PARTITIONS, partitions
            ),
        });
    }
    if nprobe == 0 || nprobe > partitions {
        return Err(IndexError::InvalidConfig {
            reason: format!(
                "nprobe must be in 1..={} (partitions), got {}",
                partitions, nprobe
            ),
        });
    }
    Ok(())
}
