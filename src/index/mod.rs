//! In-process ANN index over catalog feature vectors.
//!
//! [`VectorIndex`] owns the current [`IndexGeneration`]. Searches pin the generation they
//! start with, so a concurrent `add` or `train` never blocks or perturbs them; writers are
//! serialized and publish a new generation when they finish.

pub mod config;
pub mod error;
pub mod generation;
mod kmeans;
pub mod model;
pub mod quantization;


pub use config::{
    DEFAULT_NPROBE, DEFAULT_OVERFETCH_FACTOR, FLAT_MAX_ITEMS, IVF_MAX_ITEMS, IndexConfig,
    IndexVariant, MIN_OVERFETCH_FACTOR,
};
pub use error::{IndexError, IndexResult};
pub use generation::IndexGeneration;
pub use model::{FeatureVector, IndexEntry, IndexHit, ItemMetadata};
pub use quantization::ProductQuantizer;

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};

use crate::constants::validate_embedding_dim;
use crate::storage::IndexSnapshot;

/// Whether an incoming item may overwrite an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Fail with [`IndexError::DuplicateItemId`] if the id exists.
    #[default]
    Insert,
    /// Replace any existing entry with the same id.
    Replace,
}

pub struct VectorIndex {
    config: IndexConfig,
    dimension: usize,
    current: RwLock<Arc<IndexGeneration>>,
    writer: Mutex<()>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let generation = self.pin();
        f.debug_struct("VectorIndex")
            .field("variant", &self.config.variant)
            .field("dimension", &self.dimension)
            .field("items", &generation.len())
            .field("generation", &generation.id())
            .finish()
    }
}

impl VectorIndex {
    pub fn new(dimension: usize, config: IndexConfig) -> IndexResult<Self> {
        config.validate(dimension)?;
        Ok(Self {
            config,
            dimension,
            current: RwLock::new(Arc::new(IndexGeneration::empty(dimension, config.variant))),
            writer: Mutex::new(()),
        })
    }

    /// Restores an index from a persisted snapshot.
    pub fn from_snapshot(snapshot: IndexSnapshot, config: IndexConfig) -> IndexResult<Self> {
        let generation = IndexGeneration::from_snapshot(snapshot)?;
        let config = config.variant(generation.variant());
        config.validate(generation.dimension())?;
        info!(
            items = generation.len(),
            generation = generation.id(),
            variant = config.variant.name(),
            "Index restored from snapshot"
        );
        Ok(Self {
            config,
            dimension: generation.dimension(),
            current: RwLock::new(Arc::new(generation)),
            writer: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Returns the generation searches currently start from.
    #[inline]
    pub fn pin(&self) -> Arc<IndexGeneration> {
        Arc::clone(&self.current.read())
    }

    pub fn len(&self) -> usize {
        self.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pin().is_empty()
    }

    pub fn is_trained(&self) -> bool {
        self.pin().is_trained()
    }

    pub fn generation_id(&self) -> u64 {
        self.pin().id()
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.pin().contains(item_id)
    }

    pub fn metadata(&self, item_id: &str) -> Option<Arc<ItemMetadata>> {
        self.pin().metadata(item_id)
    }

    /// Fits partitions (and codebooks) on `samples`, then publishes the retrained generation.
    ///
    /// Runs entirely off the published generation; searches keep using the old one
    /// until the swap.
    pub fn train(&self, samples: &[FeatureVector]) -> IndexResult<()> {
        for s in samples {
            self.check_dimension(s.dim())?;
        }

        let _guard = self.writer.lock();
        let base = self.pin();
        let mut next = base.retrained(samples, &self.config)?;
        next.bump();

        info!(
            samples = samples.len(),
            items = next.len(),
            variant = self.config.variant.name(),
            generation = next.id(),
            "Index trained"
        );
        *self.current.write() = Arc::new(next);
        Ok(())
    }

    /// Adds entries; fails without side effects if any id already exists.
    pub fn add(&self, entries: Vec<IndexEntry>) -> IndexResult<usize> {
        self.write(entries, WriteMode::Insert)
    }

    /// Adds entries, replacing any existing ones with the same id.
    pub fn upsert(&self, entries: Vec<IndexEntry>) -> IndexResult<usize> {
        self.write(entries, WriteMode::Replace)
    }

    pub fn write(&self, entries: Vec<IndexEntry>, mode: WriteMode) -> IndexResult<usize> {
        if entries.is_empty() {
            return Ok(0);
        }

        let _guard = self.writer.lock();
        let base = self.pin();

        if !base.is_trained() {
            return Err(IndexError::IndexNotTrained {
                variant: self.config.variant.name(),
            });
        }

        let mut batch_ids = HashSet::with_capacity(entries.len());
        for entry in &entries {
            self.check_dimension(entry.vector.dim())?;
            if !entry.vector.is_finite() {
                return Err(IndexError::InvalidVector {
                    item_id: entry.item_id.clone(),
                    reason: "non-finite component".to_string(),
                });
            }
            let duplicate_in_batch = !batch_ids.insert(entry.item_id.as_str());
            if mode == WriteMode::Insert && (duplicate_in_batch || base.contains(&entry.item_id))
            {
                return Err(IndexError::DuplicateItemId {
                    item_id: entry.item_id.clone(),
                });
            }
        }
        drop(base);

        let count = entries.len();
        let mut current = self.current.write();
        // Mutates in place unless a search still holds this generation.
        let generation = Arc::make_mut(&mut *current);
        for entry in entries {
            generation.insert(entry);
        }
        generation.bump();

        debug!(
            added = count,
            items = generation.len(),
            generation = generation.id(),
            "Index generation published"
        );
        Ok(count)
    }

    /// Removes an item; returns `false` if it was not indexed.
    pub fn remove(&self, item_id: &str) -> bool {
        let _guard = self.writer.lock();
        if !self.pin().contains(item_id) {
            return false;
        }
        let mut current = self.current.write();
        let generation = Arc::make_mut(&mut *current);
        let removed = generation.remove(item_id);
        generation.bump();
        removed
    }

    /// Returns up to `top_k * overfetch_factor` hits, best first.
    pub fn search(&self, query: &FeatureVector, top_k: usize) -> IndexResult<Vec<IndexHit>> {
        let generation = self.pin();
        Self::search_generation(&generation, query, self.config.candidate_limit(top_k))
    }

    /// Searches an already pinned generation (used from blocking tasks).
    pub fn search_generation(
        generation: &IndexGeneration,
        query: &FeatureVector,
        limit: usize,
    ) -> IndexResult<Vec<IndexHit>> {
        if query.dim() != generation.dimension() {
            error!(
                expected = generation.dimension(),
                actual = query.dim(),
                "Query vector dimension does not match index"
            );
            return Err(IndexError::DimensionMismatch {
                expected: generation.dimension(),
                actual: query.dim(),
            });
        }
        Ok(generation.search(query, limit))
    }

    pub fn snapshot(&self) -> IndexSnapshot {
        self.pin().to_snapshot(chrono::Utc::now().timestamp())
    }

    fn check_dimension(&self, actual: usize) -> IndexResult<()> {
        validate_embedding_dim(actual, self.dimension).map_err(|e| {
            error!(
                expected = self.dimension,
                actual, "Vector dimension does not match index"
            );
            IndexError::from(e)
        })
    }
}
