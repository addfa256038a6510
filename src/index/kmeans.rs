//! Seeded Lloyd's k-means used for IVF partitions and PQ codebooks.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};

use super::model::{dot, l2_normalize_in_place, squared_l2};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Affinity {
    /// Spherical k-means: centroids are re-normalized, assignment maximizes the dot product.
    InnerProduct,
    /// Plain k-means on squared L2 distance (PQ subspaces).
    Euclidean,
}

/// Clusters `samples` (each `dim` long) into `k` centroids, returned flattened (`k * dim`).
///
/// Callers guarantee `samples.len() >= k > 0`. Same inputs and seed give the same centroids.
pub(crate) fn train_centroids(
    samples: &[&[f32]],
    dim: usize,
    k: usize,
    iterations: usize,
    seed: u64,
    affinity: Affinity,
) -> Vec<f32> {
    let n = samples.len();
    let mut rng = StdRng::seed_from_u64(seed);

    let mut centroids = Vec::with_capacity(k * dim);
    for idx in sample(&mut rng, n, k).into_iter() {
        centroids.extend_from_slice(samples[idx]);
    }

    let mut assignments = vec![usize::MAX; n];
    for _ in 0..iterations {
        let mut changed = false;
        for (i, s) in samples.iter().enumerate() {
            let nearest = nearest_centroid(&centroids, dim, s, affinity);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![0.0f32; k * dim];
        let mut counts = vec![0usize; k];
        for (s, &c) in samples.iter().zip(assignments.iter()) {
            counts[c] += 1;
            for (acc, v) in sums[c * dim..(c + 1) * dim].iter_mut().zip(s.iter()) {
                *acc += v;
            }
        }

        for c in 0..k {
            let centroid = &mut centroids[c * dim..(c + 1) * dim];
            if counts[c] == 0 {
                // Empty cluster: reseed from a random sample.
                let pick = rng.random_range(0..n);
                centroid.copy_from_slice(samples[pick]);
                continue;
            }
            let inv = 1.0 / counts[c] as f32;
            for (dst, acc) in centroid.iter_mut().zip(&sums[c * dim..(c + 1) * dim]) {
                *dst = acc * inv;
            }
            if affinity == Affinity::InnerProduct {
                l2_normalize_in_place(centroid);
            }
        }
    }

    centroids
}

/// Index of the closest centroid under `affinity`; ties go to the lower index.
pub(crate) fn nearest_centroid(
    centroids: &[f32],
    dim: usize,
    v: &[f32],
    affinity: Affinity,
) -> usize {
    let mut best = 0;
    let mut best_score = f32::NEG_INFINITY;
    for (c, centroid) in centroids.chunks_exact(dim).enumerate() {
        let score = match affinity {
            Affinity::InnerProduct => dot(centroid, v),
            Affinity::Euclidean => -squared_l2(centroid, v),
        };
        if score > best_score {
            best = c;
            best_score = score;
        }
    }
    best
}

/// Indices of the `n` centroids with the highest inner product against `query`.
pub(crate) fn closest_partitions(
    centroids: &[f32],
    dim: usize,
    query: &[f32],
    n: usize,
) -> Vec<usize> {
    let mut scored: Vec<(usize, f32)> = centroids
        .chunks_exact(dim)
        .map(|c| dot(c, query))
        .enumerate()
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.truncate(n);
    scored.into_iter().map(|(idx, _)| idx).collect()
}
