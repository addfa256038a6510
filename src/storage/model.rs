//! Storage model types.

use rkyv::{Archive, Deserialize, Serialize};

/// Current on-disk layout version; bump when a field changes meaning.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 2;

pub const VARIANT_FLAT: u8 = 0;
pub const VARIANT_IVF: u8 = 1;
pub const VARIANT_IVF_PQ: u8 = 2;

/// Persisted index generation.
///
/// Stored as `rkyv` bytes and memory-mapped on load.
///
/// # Example
/// ```rust
/// use lookalike::storage::{IndexSnapshot, StoredVariant, SNAPSHOT_FORMAT_VERSION};
///
/// let snapshot = IndexSnapshot {
///     format_version: SNAPSHOT_FORMAT_VERSION,
///     generation: 0,
///     dimension: 2,
///     variant: StoredVariant::flat(),
///     centroids: vec![],
///     codebooks: vec![],
///     items: vec![],
///     saved_at: 0,
/// };
/// assert!(snapshot.items.is_empty());
/// ```
#[derive(Archive, Deserialize, Serialize, Debug, PartialEq, Clone)]
pub struct IndexSnapshot {
    pub format_version: u32,
    /// Generation counter at save time.
    pub generation: u64,
    pub dimension: u32,
    pub variant: StoredVariant,
    /// IVF centroids, `partitions * dimension` floats (empty for flat or untrained).
    pub centroids: Vec<f32>,
    /// PQ codebooks (empty unless the variant is quantized and trained).
    pub codebooks: Vec<f32>,
    pub items: Vec<StoredItem>,
    /// Unix timestamp of the save.
    pub saved_at: i64,
}

#[derive(Archive, Deserialize, Serialize, Debug, PartialEq, Clone, Copy)]
pub struct StoredVariant {
    pub kind: u8,
    pub partitions: u32,
    pub nprobe: u32,
    pub subspaces: u32,
    pub codebook_size: u32,
}

impl StoredVariant {
    pub fn flat() -> Self {
        Self {
            kind: VARIANT_FLAT,
            partitions: 1,
            nprobe: 1,
            subspaces: 0,
            codebook_size: 0,
        }
    }
}

#[derive(Archive, Deserialize, Serialize, Debug, PartialEq, Clone)]
pub struct StoredItem {
    pub item_id: String,
    pub partition: u32,
    /// Full-precision row (every variant).
    pub vector: Vec<f32>,
    /// PQ codes (IVF-PQ only).
    pub codes: Vec<u8>,
    pub metadata: StoredMetadata,
}

#[derive(Archive, Deserialize, Serialize, Debug, PartialEq, Clone, Default)]
pub struct StoredMetadata {
    pub brand: Option<String>,
    pub category: Option<String>,
    pub department: Option<String>,
    pub product_name: Option<String>,
    pub image_quality_score: Option<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rkyv::rancor::Error;
    use rkyv::{access, from_bytes, to_bytes};

    fn sample_snapshot() -> IndexSnapshot {
        IndexSnapshot {
            format_version: SNAPSHOT_FORMAT_VERSION,
            generation: 7,
            dimension: 2,
            variant: StoredVariant::flat(),
            centroids: vec![],
            codebooks: vec![],
            items: vec![StoredItem {
                item_id: "sku-1".to_string(),
                partition: 0,
                vector: vec![1.0, 0.0],
                codes: vec![],
                metadata: StoredMetadata {
                    brand: Some("Acme".to_string()),
                    image_quality_score: Some(0.9),
                    ..Default::default()
                },
            }],
            saved_at: 1_760_000_000,
        }
    }

    #[test]
    fn test_snapshot_archive_access() {
        let snapshot = sample_snapshot();
        let bytes = to_bytes::<Error>(&snapshot).expect("should serialize");

        let archived =
            access::<ArchivedIndexSnapshot, Error>(&bytes).expect("should validate archive");
        assert_eq!(archived.generation, 7_u64);
        assert_eq!(archived.items.len(), 1);
        assert_eq!(archived.items[0].item_id.as_str(), "sku-1");
    }

    #[test]
    fn test_snapshot_deserialize_matches() {
        let snapshot = sample_snapshot();
        let bytes = to_bytes::<Error>(&snapshot).expect("should serialize");
        let restored = from_bytes::<IndexSnapshot, Error>(&bytes).expect("should deserialize");
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn test_truncated_bytes_rejected() {
        let bytes = to_bytes::<Error>(&sample_snapshot()).expect("should serialize");
        let truncated = &bytes[..bytes.len() / 2];
        assert!(from_bytes::<IndexSnapshot, Error>(truncated).is_err());
    }
}
