//! Product quantization: vectors split into `subspaces` chunks, each chunk replaced by
//! the id of its nearest codeword (one byte per chunk).

use super::error::{IndexError, IndexResult};
use super::kmeans::{Affinity, nearest_centroid, train_centroids};
use super::model::dot;

#[derive(Debug, Clone, PartialEq)]
pub struct ProductQuantizer {
    dim: usize,
    subspaces: usize,
    codebook_size: usize,
    sub_dim: usize,
    /// `subspaces * codebook_size * sub_dim` floats.
    codebooks: Vec<f32>,
}

impl ProductQuantizer {
    pub(crate) fn train(
        samples: &[&[f32]],
        dim: usize,
        subspaces: usize,
        codebook_size: usize,
        iterations: usize,
        seed: u64,
    ) -> IndexResult<Self> {
        if samples.len() < codebook_size {
            return Err(IndexError::InsufficientTrainingData {
                required: codebook_size,
                provided: samples.len(),
            });
        }
        let sub_dim = dim / subspaces;
        let mut codebooks = Vec::with_capacity(subspaces * codebook_size * sub_dim);

        for m in 0..subspaces {
            let chunks: Vec<&[f32]> = samples
                .iter()
                .map(|s| &s[m * sub_dim..(m + 1) * sub_dim])
                .collect();
            let book = train_centroids(
                &chunks,
                sub_dim,
                codebook_size,
                iterations,
                seed.wrapping_add(m as u64),
                Affinity::Euclidean,
            );
            codebooks.extend(book);
        }

        Ok(Self {
            dim,
            subspaces,
            codebook_size,
            sub_dim,
            codebooks,
        })
    }

    pub(crate) fn from_parts(
        dim: usize,
        subspaces: usize,
        codebook_size: usize,
        codebooks: Vec<f32>,
    ) -> IndexResult<Self> {
        if subspaces == 0 || !dim.is_multiple_of(subspaces) {
            return Err(IndexError::CorruptSnapshot {
                reason: format!("{} dims do not split into {} subspaces", dim, subspaces),
            });
        }
        let sub_dim = dim / subspaces;
        if codebooks.len() != subspaces * codebook_size * sub_dim {
            return Err(IndexError::CorruptSnapshot {
                reason: format!(
                    "codebook holds {} floats, expected {}",
                    codebooks.len(),
                    subspaces * codebook_size * sub_dim
                ),
            });
        }
        Ok(Self {
            dim,
            subspaces,
            codebook_size,
            sub_dim,
            codebooks,
        })
    }

    #[inline]
    pub fn code_len(&self) -> usize {
        self.subspaces
    }

    pub fn codebooks(&self) -> &[f32] {
        &self.codebooks
    }

    pub fn subspaces(&self) -> usize {
        self.subspaces
    }

    pub fn codebook_size(&self) -> usize {
        self.codebook_size
    }

    fn book(&self, m: usize) -> &[f32] {
        let span = self.codebook_size * self.sub_dim;
        &self.codebooks[m * span..(m + 1) * span]
    }

    pub fn encode(&self, v: &[f32]) -> Vec<u8> {
        (0..self.subspaces)
            .map(|m| {
                let chunk = &v[m * self.sub_dim..(m + 1) * self.sub_dim];
                nearest_centroid(self.book(m), self.sub_dim, chunk, Affinity::Euclidean) as u8
            })
            .collect()
    }

    /// Per-subspace inner products between `query` and every codeword.
    pub fn lookup_table(&self, query: &[f32]) -> Vec<f32> {
        let mut table = Vec::with_capacity(self.subspaces * self.codebook_size);
        for m in 0..self.subspaces {
            let chunk = &query[m * self.sub_dim..(m + 1) * self.sub_dim];
            table.extend(self.book(m).chunks_exact(self.sub_dim).map(|cw| dot(cw, chunk)));
        }
        table
    }

    /// Asymmetric inner-product estimate from a [`lookup_table`](Self::lookup_table).
    #[inline]
    pub fn score(&self, table: &[f32], codes: &[u8]) -> f32 {
        codes
            .iter()
            .enumerate()
            .map(|(m, &c)| table[m * self.codebook_size + c as usize])
            .sum()
    }
}
