use super::*;

#[test]
fn test_put_and_get() {
    let store = InMemoryMetadataStore::new();
    assert!(store.is_empty());

    store.put("sku-1", ItemMetadata::default().with_brand("Acme"));
    assert_eq!(
        store.get("sku-1").and_then(|m| m.brand),
        Some("Acme".to_string())
    );
    assert!(store.get("sku-2").is_none());
}

#[test]
fn test_extend_replaces_existing() {
    let store = InMemoryMetadataStore::new();
    store.put("sku-1", ItemMetadata::default().with_category("boots"));

    store.extend([
        (
            "sku-1".to_string(),
            ItemMetadata::default().with_category("sandals"),
        ),
        (
            "sku-2".to_string(),
            ItemMetadata::default().with_department("women"),
        ),
    ]);

    assert_eq!(store.len(), 2);
    assert_eq!(
        store.get("sku-1").and_then(|m| m.category),
        Some("sandals".to_string())
    );
}
