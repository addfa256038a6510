use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::RwLock;

use crate::hashing::fingerprint_image;
use crate::index::FeatureVector;

use super::FeatureExtractor;
use super::error::{ExtractionError, ExtractionResult};

/// Deterministic extractor for tests: no decoding, vectors derived from the byte content.
///
/// Specific payloads can be pinned to known vectors with [`MockExtractor::with_vector`].
#[derive(Debug)]
pub struct MockExtractor {
    dim: usize,
    pinned: RwLock<HashMap<[u8; 32], Vec<f32>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockExtractor {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            pinned: RwLock::new(HashMap::new()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Maps `bytes` to `values` (normalized on extraction).
    pub fn with_vector(self, bytes: &[u8], values: Vec<f32>) -> Self {
        self.pin(bytes, values);
        self
    }

    /// Sleeps this long inside every extraction (simulates inference time).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn pin(&self, bytes: &[u8], values: Vec<f32>) {
        self.pinned.write().insert(fingerprint_image(bytes), values);
    }

    /// Number of extractions performed so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn derived(&self, fingerprint: &[u8; 32]) -> Vec<f32> {
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&fingerprint[..8]);
        let mut state = u64::from_le_bytes(seed);
        (0..self.dim)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                ((state >> 32) as f32 / u32::MAX as f32) * 2.0 - 1.0
            })
            .collect()
    }
}

impl FeatureExtractor for MockExtractor {
    fn output_dim(&self) -> usize {
        self.dim
    }

    fn extract(&self, bytes: &[u8]) -> ExtractionResult<FeatureVector> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if bytes.is_empty() {
            return Err(ExtractionError::UnreadableImage {
                reason: "empty payload".to_string(),
            });
        }

        let fingerprint = fingerprint_image(bytes);
        let values = self
            .pinned
            .read()
            .get(&fingerprint)
            .cloned()
            .unwrap_or_else(|| self.derived(&fingerprint));
        Ok(FeatureVector::new(values))
    }
}
