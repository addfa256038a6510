use std::ops::Deref;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Immutable, unit-norm feature vector shared between the caches and the index.
///
/// Construction always L2-normalizes, so cosine similarity reduces to an inner product.
/// A zero vector stays zero and scores `0.0` against everything.
#[derive(Clone, PartialEq)]
pub struct FeatureVector {
    values: Arc<[f32]>,
}

impl FeatureVector {
    /// Normalizes `values` and freezes them.
    pub fn new(mut values: Vec<f32>) -> Self {
        l2_normalize_in_place(&mut values);
        Self {
            values: values.into(),
        }
    }

    /// Wraps values that were already normalized (e.g. restored from a snapshot).
    pub(crate) fn from_normalized(values: Vec<f32>) -> Self {
        Self {
            values: values.into(),
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    #[inline]
    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if every component is finite.
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    /// Inner product with another vector of the same length.
    #[inline]
    pub fn dot(&self, other: &[f32]) -> f32 {
        dot(&self.values, other)
    }

    pub fn to_vec(&self) -> Vec<f32> {
        self.values.to_vec()
    }
}

impl Deref for FeatureVector {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.values
    }
}

impl std::fmt::Debug for FeatureVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureVector")
            .field("dim", &self.values.len())
            .field("head", &&self.values[..self.values.len().min(4)])
            .finish()
    }
}

/// Catalog metadata copied into the index at ingestion time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    /// Source image quality in `[0, 1]`; absent means "unknown" and is never penalized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_quality_score: Option<f32>,
}

impl ItemMetadata {
    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    pub fn with_product_name(mut self, name: impl Into<String>) -> Self {
        self.product_name = Some(name.into());
        self
    }

    pub fn with_quality(mut self, score: f32) -> Self {
        self.image_quality_score = Some(score);
        self
    }
}

/// One catalog item as handed to the index.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub item_id: String,
    pub vector: FeatureVector,
    pub metadata: ItemMetadata,
}

impl IndexEntry {
    pub fn new(item_id: impl Into<String>, vector: FeatureVector, metadata: ItemMetadata) -> Self {
        Self {
            item_id: item_id.into(),
            vector,
            metadata,
        }
    }
}

/// Raw ANN hit before reranking.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub item_id: String,
    pub raw_similarity: f32,
    pub metadata: Arc<ItemMetadata>,
}

#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Scales `values` to unit length; leaves zero (or non-finite norm) vectors untouched.
pub fn l2_normalize_in_place(values: &mut [f32]) {
    let norm: f32 = values.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for x in values.iter_mut() {
            *x /= norm;
        }
    }
}
