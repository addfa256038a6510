use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::hashing::{hash_to_u64, hash_vector};
use crate::index::FeatureVector;
use crate::scoring::{SearchResult, sort_results};

/// Deterministic jittered copy of `query` for stability run `run`.
///
/// Run 0 is the query itself. Other runs add uniform noise in `[-noise, noise]` per
/// component, seeded from the query content and run index, then renormalize.
pub(crate) fn perturb(query: &FeatureVector, run: usize, noise: f32) -> FeatureVector {
    if run == 0 || noise == 0.0 {
        return query.clone();
    }

    let mut seed_bytes = hash_vector(query.as_slice()).to_vec();
    seed_bytes.extend_from_slice(&(run as u64).to_le_bytes());
    let mut rng = StdRng::seed_from_u64(hash_to_u64(&seed_bytes));

    let values = query
        .iter()
        .map(|v| v + rng.random_range(-noise..=noise))
        .collect();
    FeatureVector::new(values)
}

struct Appearances {
    raw: Vec<f32>,
    scores: Vec<f32>,
    result: SearchResult,
}

/// Accumulates per-item scores across stability runs.
pub(crate) struct StabilityTally {
    runs: usize,
    items: HashMap<String, Appearances>,
}

impl StabilityTally {
    pub(crate) fn new(runs: usize) -> Self {
        Self {
            runs,
            items: HashMap::new(),
        }
    }

    pub(crate) fn record(&mut self, results: Vec<SearchResult>) {
        let runs = self.runs;
        for result in results {
            let entry = self
                .items
                .entry(result.item_id.clone())
                .or_insert_with(|| Appearances {
                    raw: Vec::with_capacity(runs),
                    scores: Vec::with_capacity(runs),
                    result: result.clone(),
                });
            entry.raw.push(result.raw_similarity);
            entry.scores.push(result.final_score);
        }
    }

    /// Fraction of runs each seen item appeared in.
    pub(crate) fn fractions(&self) -> HashMap<String, f32> {
        self.items
            .iter()
            .map(|(id, a)| (id.clone(), a.scores.len() as f32 / self.runs as f32))
            .collect()
    }

    /// Items seen in at least `min_fraction` of runs with score variance within
    /// `max_variance`, scored by their mean across appearances.
    pub(crate) fn finish(
        self,
        min_fraction: f32,
        max_variance: f32,
        limit: usize,
    ) -> Vec<SearchResult> {
        let runs = self.runs as f32;
        let mut results: Vec<SearchResult> = self
            .items
            .into_values()
            .filter_map(|a| {
                let fraction = a.scores.len() as f32 / runs;
                if fraction < min_fraction || variance(&a.scores) > max_variance {
                    return None;
                }
                let mut result = a.result;
                result.final_score = mean(&a.scores);
                result.raw_similarity = mean(&a.raw);
                result.stability = fraction;
                Some(result)
            })
            .collect();

        sort_results(&mut results);
        results.truncate(limit);
        results
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

/// Population variance.
fn variance(values: &[f32]) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m) * (v - m)).sum::<f32>() / values.len() as f32
}
