//! Read-side catalog metadata.
//!
//! The engine only reads from a [`MetadataStore`]; catalog owners push updates through
//! [`MetadataStore::put`]. Reads are eventually consistent with those writes.

#[cfg(test)]
mod tests;

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::index::ItemMetadata;

pub trait MetadataStore: Send + Sync + 'static {
    fn get(&self, item_id: &str) -> Option<ItemMetadata>;

    fn put(&self, item_id: &str, metadata: ItemMetadata);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    items: RwLock<HashMap<String, ItemMetadata>>,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-loads a catalog, replacing existing entries with the same ids.
    pub fn extend(&self, entries: impl IntoIterator<Item = (String, ItemMetadata)>) {
        self.items.write().extend(entries);
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn get(&self, item_id: &str) -> Option<ItemMetadata> {
        self.items.read().get(item_id).cloned()
    }

    fn put(&self, item_id: &str, metadata: ItemMetadata) {
        self.items.write().insert(item_id.to_string(), metadata);
    }

    fn len(&self) -> usize {
        self.items.read().len()
    }
}
