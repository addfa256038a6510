//! One immutable-once-published view of the index.
//!
//! Searches pin an `Arc<IndexGeneration>`; writers mutate a private copy and swap it in.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use crate::storage::{
    IndexSnapshot, SNAPSHOT_FORMAT_VERSION, StoredItem, StoredMetadata, StoredVariant,
    VARIANT_FLAT, VARIANT_IVF, VARIANT_IVF_PQ,
};

use super::config::{IndexConfig, IndexVariant};
use super::error::{IndexError, IndexResult};
use super::kmeans::{Affinity, closest_partitions, nearest_centroid, train_centroids};
use super::model::{FeatureVector, IndexEntry, IndexHit, ItemMetadata, dot};
use super::quantization::ProductQuantizer;

/// IVF-PQ shortlists `limit * PQ_REFINE_FACTOR` candidates by code before the exact pass.
const PQ_REFINE_FACTOR: usize = 4;

/// Contiguous fixed-stride rows with parallel ids.
#[derive(Debug, Clone)]
struct RowSet<T> {
    ids: Vec<String>,
    data: Vec<T>,
    stride: usize,
}

impl<T: Copy> RowSet<T> {
    fn new(stride: usize) -> Self {
        Self {
            ids: Vec::new(),
            data: Vec::new(),
            stride,
        }
    }

    fn push(&mut self, id: String, row: &[T]) -> usize {
        self.ids.push(id);
        self.data.extend_from_slice(row);
        self.ids.len() - 1
    }

    fn row(&self, slot: usize) -> &[T] {
        &self.data[slot * self.stride..(slot + 1) * self.stride]
    }

    /// Removes `slot` by moving the last row into it; returns the id that moved.
    fn swap_remove(&mut self, slot: usize) -> Option<String> {
        let last = self.ids.len() - 1;
        self.ids.swap_remove(slot);
        if slot != last {
            self.data
                .copy_within(last * self.stride..(last + 1) * self.stride, slot * self.stride);
        }
        self.data.truncate(last * self.stride);
        (slot != last).then(|| self.ids[slot].clone())
    }

    fn iter(&self) -> impl Iterator<Item = (&str, &[T])> {
        self.ids
            .iter()
            .map(String::as_str)
            .zip(self.data.chunks_exact(self.stride))
    }
}

#[derive(Debug, Clone)]
enum Layout {
    Flat {
        rows: RowSet<f32>,
    },
    Ivf {
        centroids: Option<Vec<f32>>,
        lists: Vec<RowSet<f32>>,
    },
    IvfPq {
        centroids: Option<Vec<f32>>,
        quantizer: Option<ProductQuantizer>,
        lists: Vec<RowSet<u8>>,
        /// Full-precision rows, slot-aligned with `lists`, for the exact rerank.
        vectors: Vec<RowSet<f32>>,
    },
}

#[derive(Debug, Clone)]
struct Slot {
    partition: usize,
    row: usize,
    metadata: Arc<ItemMetadata>,
}

#[derive(Debug, Clone)]
pub struct IndexGeneration {
    id: u64,
    dimension: usize,
    variant: IndexVariant,
    layout: Layout,
    slots: HashMap<String, Slot>,
}

impl IndexGeneration {
    pub(crate) fn empty(dimension: usize, variant: IndexVariant) -> Self {
        let layout = match variant {
            IndexVariant::Flat => Layout::Flat {
                rows: RowSet::new(dimension),
            },
            IndexVariant::Ivf { partitions, .. } => Layout::Ivf {
                centroids: None,
                lists: (0..partitions).map(|_| RowSet::new(dimension)).collect(),
            },
            IndexVariant::IvfPq {
                partitions,
                subspaces,
                ..
            } => Layout::IvfPq {
                centroids: None,
                quantizer: None,
                lists: (0..partitions).map(|_| RowSet::new(subspaces)).collect(),
                vectors: (0..partitions).map(|_| RowSet::new(dimension)).collect(),
            },
        };
        Self {
            id: 0,
            dimension,
            variant,
            layout,
            slots: HashMap::new(),
        }
    }

    /// Monotonic counter, bumped on every published change.
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn bump(&mut self) {
        self.id += 1;
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn variant(&self) -> IndexVariant {
        self.variant
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_trained(&self) -> bool {
        match &self.layout {
            Layout::Flat { .. } => true,
            Layout::Ivf { centroids, .. } => centroids.is_some(),
            Layout::IvfPq {
                centroids,
                quantizer,
                ..
            } => centroids.is_some() && quantizer.is_some(),
        }
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.slots.contains_key(item_id)
    }

    pub fn metadata(&self, item_id: &str) -> Option<Arc<ItemMetadata>> {
        self.slots.get(item_id).map(|s| Arc::clone(&s.metadata))
    }

    pub fn item_ids(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Stored full-precision row for `item_id`.
    pub fn reconstruct(&self, item_id: &str) -> Option<Vec<f32>> {
        let slot = self.slots.get(item_id)?;
        let row = match &self.layout {
            Layout::Flat { rows } => rows.row(slot.row),
            Layout::Ivf { lists, .. } => lists[slot.partition].row(slot.row),
            Layout::IvfPq { vectors, .. } => vectors[slot.partition].row(slot.row),
        };
        Some(row.to_vec())
    }

    /// Inserts or replaces `entry`. Callers validate dimension and training state first.
    pub(crate) fn insert(&mut self, entry: IndexEntry) {
        self.remove(&entry.item_id);

        let IndexEntry {
            item_id,
            vector,
            metadata,
        } = entry;
        let dim = self.dimension;

        let (partition, row) = match &mut self.layout {
            Layout::Flat { rows } => (0, rows.push(item_id.clone(), &vector)),
            Layout::Ivf { centroids, lists } => {
                let Some(centroids) = centroids else {
                    return;
                };
                let p = nearest_centroid(centroids, dim, &vector, Affinity::InnerProduct);
                (p, lists[p].push(item_id.clone(), &vector))
            }
            Layout::IvfPq {
                centroids,
                quantizer,
                lists,
                vectors,
            } => {
                let (Some(centroids), Some(pq)) = (centroids, quantizer) else {
                    return;
                };
                let p = nearest_centroid(centroids, dim, &vector, Affinity::InnerProduct);
                let codes = pq.encode(&vector);
                vectors[p].push(item_id.clone(), &vector);
                (p, lists[p].push(item_id.clone(), &codes))
            }
        };

        self.slots.insert(
            item_id,
            Slot {
                partition,
                row,
                metadata: Arc::new(metadata),
            },
        );
    }

    /// Removes `item_id`; returns `false` if it was not present.
    pub(crate) fn remove(&mut self, item_id: &str) -> bool {
        let Some(slot) = self.slots.remove(item_id) else {
            return false;
        };

        let moved = match &mut self.layout {
            Layout::Flat { rows } => rows.swap_remove(slot.row),
            Layout::Ivf { lists, .. } => lists[slot.partition].swap_remove(slot.row),
            Layout::IvfPq { lists, vectors, .. } => {
                vectors[slot.partition].swap_remove(slot.row);
                lists[slot.partition].swap_remove(slot.row)
            }
        };

        if let Some(moved_id) = moved
            && let Some(moved_slot) = self.slots.get_mut(&moved_id)
        {
            moved_slot.row = slot.row;
        }
        true
    }

    /// Top `limit` hits by inner product, ties broken by ascending item id.
    ///
    /// IVF-PQ ranks probed rows by asymmetric distance, then rescores the shortlist
    /// against the full-precision rows, so reported similarities are exact.
    pub fn search(&self, query: &[f32], limit: usize) -> Vec<IndexHit> {
        if limit == 0 || self.slots.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f32, &str)> = Vec::new();
        match &self.layout {
            Layout::Flat { rows } => {
                scored.extend(rows.iter().map(|(id, row)| (dot(query, row), id)));
            }
            Layout::Ivf { centroids, lists } => {
                let Some(centroids) = centroids else {
                    return Vec::new();
                };
                let probes =
                    closest_partitions(centroids, self.dimension, query, self.variant.nprobe());
                for p in probes {
                    scored.extend(lists[p].iter().map(|(id, row)| (dot(query, row), id)));
                }
            }
            Layout::IvfPq {
                centroids,
                quantizer,
                lists,
                vectors,
            } => {
                let (Some(centroids), Some(pq)) = (centroids, quantizer) else {
                    return Vec::new();
                };
                let table = pq.lookup_table(query);
                let probes =
                    closest_partitions(centroids, self.dimension, query, self.variant.nprobe());
                let mut shortlist: Vec<(f32, &str, &[f32])> = Vec::new();
                for p in probes {
                    shortlist.extend(
                        lists[p]
                            .iter()
                            .zip(vectors[p].iter())
                            .map(|((id, codes), (_, row))| (pq.score(&table, codes), id, row)),
                    );
                }
                let keep = limit.saturating_mul(PQ_REFINE_FACTOR);
                if shortlist.len() > keep {
                    shortlist.select_nth_unstable_by(keep, |a, b| {
                        rank_hits(&(a.0, a.1), &(b.0, b.1))
                    });
                    shortlist.truncate(keep);
                }
                scored.extend(
                    shortlist
                        .into_iter()
                        .map(|(_, id, row)| (dot(query, row), id)),
                );
            }
        }

        if scored.len() > limit {
            scored.select_nth_unstable_by(limit, rank_hits);
            scored.truncate(limit);
        }
        scored.sort_by(rank_hits);

        scored
            .into_iter()
            .filter_map(|(score, id)| {
                self.slots.get(id).map(|slot| IndexHit {
                    item_id: id.to_string(),
                    raw_similarity: score,
                    metadata: Arc::clone(&slot.metadata),
                })
            })
            .collect()
    }

    /// Builds a trained copy of this generation; existing rows are re-assigned.
    pub(crate) fn retrained(
        &self,
        samples: &[FeatureVector],
        config: &IndexConfig,
    ) -> IndexResult<Self> {
        let sample_rows: Vec<&[f32]> = samples.iter().map(|s| s.as_slice()).collect();
        let mut next = Self::empty(self.dimension, self.variant);
        next.id = self.id;

        match (&mut next.layout, self.variant) {
            (Layout::Flat { .. }, _) => {}
            (Layout::Ivf { centroids, .. }, IndexVariant::Ivf { partitions, .. }) => {
                require_samples(sample_rows.len(), partitions)?;
                *centroids = Some(train_centroids(
                    &sample_rows,
                    self.dimension,
                    partitions,
                    config.kmeans_iterations,
                    config.training_seed,
                    Affinity::InnerProduct,
                ));
            }
            (
                Layout::IvfPq {
                    centroids,
                    quantizer,
                    ..
                },
                IndexVariant::IvfPq {
                    partitions,
                    subspaces,
                    codebook_size,
                    ..
                },
            ) => {
                require_samples(sample_rows.len(), partitions.max(codebook_size))?;
                *centroids = Some(train_centroids(
                    &sample_rows,
                    self.dimension,
                    partitions,
                    config.kmeans_iterations,
                    config.training_seed,
                    Affinity::InnerProduct,
                ));
                *quantizer = Some(ProductQuantizer::train(
                    &sample_rows,
                    self.dimension,
                    subspaces,
                    codebook_size,
                    config.kmeans_iterations,
                    config.training_seed,
                )?);
            }
            _ => {
                return Err(IndexError::InvalidConfig {
                    reason: "layout does not match declared variant".to_string(),
                });
            }
        }

        let mut ids: Vec<&str> = self.item_ids().collect();
        ids.sort_unstable();
        for id in ids {
            let (Some(row), Some(metadata)) = (self.reconstruct(id), self.metadata(id)) else {
                continue;
            };
            next.insert(IndexEntry {
                item_id: id.to_string(),
                vector: FeatureVector::new(row),
                metadata: (*metadata).clone(),
            });
        }
        Ok(next)
    }

    pub fn to_snapshot(&self, saved_at: i64) -> IndexSnapshot {
        let (variant, centroids, codebooks) = match (&self.layout, self.variant) {
            (Layout::Flat { .. }, _) => (StoredVariant::flat(), Vec::new(), Vec::new()),
            (Layout::Ivf { centroids, .. }, v) => (
                stored_variant(VARIANT_IVF, v),
                centroids.clone().unwrap_or_default(),
                Vec::new(),
            ),
            (
                Layout::IvfPq {
                    centroids,
                    quantizer,
                    ..
                },
                v,
            ) => (
                stored_variant(VARIANT_IVF_PQ, v),
                centroids.clone().unwrap_or_default(),
                quantizer
                    .as_ref()
                    .map(|pq| pq.codebooks().to_vec())
                    .unwrap_or_default(),
            ),
        };

        let mut items: Vec<StoredItem> = self
            .slots
            .iter()
            .map(|(id, slot)| {
                let (vector, codes) = match &self.layout {
                    Layout::Flat { rows } => (rows.row(slot.row).to_vec(), Vec::new()),
                    Layout::Ivf { lists, .. } => {
                        (lists[slot.partition].row(slot.row).to_vec(), Vec::new())
                    }
                    Layout::IvfPq { lists, vectors, .. } => (
                        vectors[slot.partition].row(slot.row).to_vec(),
                        lists[slot.partition].row(slot.row).to_vec(),
                    ),
                };
                StoredItem {
                    item_id: id.clone(),
                    partition: slot.partition as u32,
                    vector,
                    codes,
                    metadata: stored_metadata(&slot.metadata),
                }
            })
            .collect();
        items.sort_by(|a, b| a.item_id.cmp(&b.item_id));

        IndexSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            generation: self.id,
            dimension: self.dimension as u32,
            variant,
            centroids,
            codebooks,
            items,
            saved_at,
        }
    }

    pub fn from_snapshot(snapshot: IndexSnapshot) -> IndexResult<Self> {
        if snapshot.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(IndexError::CorruptSnapshot {
                reason: format!("unsupported format version {}", snapshot.format_version),
            });
        }
        let dimension = snapshot.dimension as usize;
        let variant = restored_variant(&snapshot.variant)?;
        let mut generation = Self::empty(dimension, variant);
        generation.id = snapshot.generation;

        match &mut generation.layout {
            Layout::Flat { .. } => {}
            Layout::Ivf { centroids, .. } => {
                *centroids = restored_centroids(snapshot.centroids, variant, dimension)?;
            }
            Layout::IvfPq {
                centroids,
                quantizer,
                ..
            } => {
                *centroids = restored_centroids(snapshot.centroids, variant, dimension)?;
                if !snapshot.codebooks.is_empty() {
                    *quantizer = Some(ProductQuantizer::from_parts(
                        dimension,
                        snapshot.variant.subspaces as usize,
                        snapshot.variant.codebook_size as usize,
                        snapshot.codebooks,
                    )?);
                }
            }
        }

        for item in snapshot.items {
            let partition = item.partition as usize;
            let row = match &mut generation.layout {
                Layout::Flat { rows } => {
                    check_row_len(&item.item_id, item.vector.len(), dimension)?;
                    rows.push(item.item_id.clone(), &item.vector)
                }
                Layout::Ivf { lists, .. } => {
                    check_row_len(&item.item_id, item.vector.len(), dimension)?;
                    let list = lists.get_mut(partition).ok_or_else(|| bad_partition(&item))?;
                    list.push(item.item_id.clone(), &item.vector)
                }
                Layout::IvfPq { lists, vectors, .. } => {
                    check_row_len(&item.item_id, item.vector.len(), dimension)?;
                    let (Some(list), Some(full)) =
                        (lists.get_mut(partition), vectors.get_mut(partition))
                    else {
                        return Err(bad_partition(&item));
                    };
                    check_row_len(&item.item_id, item.codes.len(), list.stride)?;
                    full.push(item.item_id.clone(), &item.vector);
                    list.push(item.item_id.clone(), &item.codes)
                }
            };
            generation.slots.insert(
                item.item_id,
                Slot {
                    partition,
                    row,
                    metadata: Arc::new(item_metadata(item.metadata)),
                },
            );
        }

        Ok(generation)
    }
}

fn rank_hits(a: &(f32, &str), b: &(f32, &str)) -> Ordering {
    b.0.total_cmp(&a.0).then_with(|| a.1.cmp(b.1))
}

fn require_samples(provided: usize, required: usize) -> IndexResult<()> {
    if provided < required {
        return Err(IndexError::InsufficientTrainingData { required, provided });
    }
    Ok(())
}

fn stored_variant(kind: u8, variant: IndexVariant) -> StoredVariant {
    let (subspaces, codebook_size) = match variant {
        IndexVariant::IvfPq {
            subspaces,
            codebook_size,
            ..
        } => (subspaces as u32, codebook_size as u32),
        _ => (0, 0),
    };
    StoredVariant {
        kind,
        partitions: variant.partitions() as u32,
        nprobe: variant.nprobe() as u32,
        subspaces,
        codebook_size,
    }
}

fn restored_variant(stored: &StoredVariant) -> IndexResult<IndexVariant> {
    let partitions = stored.partitions as usize;
    let nprobe = stored.nprobe as usize;
    match stored.kind {
        VARIANT_FLAT => Ok(IndexVariant::Flat),
        VARIANT_IVF => Ok(IndexVariant::Ivf { partitions, nprobe }),
        VARIANT_IVF_PQ => Ok(IndexVariant::IvfPq {
            partitions,
            nprobe,
            subspaces: stored.subspaces as usize,
            codebook_size: stored.codebook_size as usize,
        }),
        other => Err(IndexError::CorruptSnapshot {
            reason: format!("unknown variant tag {}", other),
        }),
    }
}

fn restored_centroids(
    centroids: Vec<f32>,
    variant: IndexVariant,
    dimension: usize,
) -> IndexResult<Option<Vec<f32>>> {
    if centroids.is_empty() {
        return Ok(None);
    }
    let expected = variant.partitions() * dimension;
    if centroids.len() != expected {
        return Err(IndexError::CorruptSnapshot {
            reason: format!(
                "centroid table holds {} floats, expected {}",
                centroids.len(),
                expected
            ),
        });
    }
    Ok(Some(centroids))
}

fn check_row_len(item_id: &str, actual: usize, expected: usize) -> IndexResult<()> {
    if actual != expected {
        return Err(IndexError::CorruptSnapshot {
            reason: format!(
                "row for '{}' has {} values, expected {}",
                item_id, actual, expected
            ),
        });
    }
    Ok(())
}

fn bad_partition(item: &StoredItem) -> IndexError {
    IndexError::CorruptSnapshot {
        reason: format!(
            "item '{}' references missing partition {}",
            item.item_id, item.partition
        ),
    }
}

fn stored_metadata(metadata: &ItemMetadata) -> StoredMetadata {
    StoredMetadata {
        brand: metadata.brand.clone(),
        category: metadata.category.clone(),
        department: metadata.department.clone(),
        product_name: metadata.product_name.clone(),
        image_quality_score: metadata.image_quality_score,
    }
}

fn item_metadata(stored: StoredMetadata) -> ItemMetadata {
    ItemMetadata {
        brand: stored.brand,
        category: stored.category,
        department: stored.department,
        product_name: stored.product_name,
        image_quality_score: stored.image_quality_score,
    }
}
