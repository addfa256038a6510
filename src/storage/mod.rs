//! Index persistence: `rkyv` snapshot models and the file store that writes them.

pub mod error;
mod model;
pub mod snapshot;

#[cfg(test)]
mod tests;

pub use error::{StorageError, StorageResult};
pub use model::{
    ArchivedIndexSnapshot, IndexSnapshot, SNAPSHOT_FORMAT_VERSION, StoredItem, StoredMetadata,
    StoredVariant, VARIANT_FLAT, VARIANT_IVF, VARIANT_IVF_PQ,
};
pub use snapshot::{SnapshotHeader, SnapshotStore};
