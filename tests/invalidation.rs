//! End-to-end tag invalidation: debounced flushes over real storage
//! partitions, with and without a tag registry.

use std::sync::Arc;
use std::time::Duration;

use ssr_cache::prelude::*;

fn metadata_with_tags(tags: &[&str]) -> EntryMetadata {
    EntryMetadata {
        cache_tags: tags.iter().map(|t| (*t).to_owned()).collect(),
        ..EntryMetadata::default()
    }
}

async fn store(storages: &StoragePartitions, kind: CacheKind, key: &str, tags: &[&str]) {
    let blob = encode("body", &metadata_with_tags(tags)).unwrap();
    storages
        .get(kind)
        .set_raw(key, blob, SetOptions::default())
        .await
        .unwrap();
}

async fn exists(storages: &StoragePartitions, kind: CacheKind, key: &str) -> bool {
    storages.get(kind).get_raw(key).await.unwrap().is_some()
}

#[tokio::test(start_paused = true)]
async fn debounced_invalidation_through_the_registry() {
    let storages = StoragePartitions::in_memory();
    let registry = Arc::new(InMemoryTagRegistry::new());

    store(&storages, CacheKind::Route, "/a", &["post:1"]).await;
    store(&storages, CacheKind::Route, "/b", &["post:2"]).await;
    store(&storages, CacheKind::Component, "nav", &["post:1"]).await;
    for (kind, key, tag) in [
        (CacheKind::Route, "/a", "post:1"),
        (CacheKind::Route, "/b", "post:2"),
        (CacheKind::Component, "nav", "post:1"),
    ] {
        registry
            .add_cache_tags(kind, key, &[tag.to_owned()])
            .await
            .unwrap();
    }

    let invalidator = DebouncedInvalidator::new(storages.clone())
        .with_registry(registry.clone())
        .with_delay(Duration::from_secs(5));

    invalidator.add(["post:1"]).await;
    // A second request for the same tag within the window is absorbed.
    invalidator.add(["post:1"]).await;

    // Nothing happens until the window closes.
    assert!(exists(&storages, CacheKind::Route, "/a").await);

    tokio::time::sleep(Duration::from_secs(6)).await;

    assert!(!exists(&storages, CacheKind::Route, "/a").await);
    assert!(!exists(&storages, CacheKind::Component, "nav").await);
    assert!(exists(&storages, CacheKind::Route, "/b").await);

    assert!(registry
        .cache_keys_for_tags(&["post:1".to_owned()])
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test(start_paused = true)]
async fn fallback_scan_invalidates_without_a_registry() {
    let storages = StoragePartitions::in_memory();

    store(&storages, CacheKind::Route, "/a", &["shared", "route-only"]).await;
    store(&storages, CacheKind::Data, "query:1", &["shared"]).await;
    store(&storages, CacheKind::Data, "query:2", &["unrelated"]).await;

    let invalidator =
        DebouncedInvalidator::new(storages.clone()).with_delay(Duration::from_secs(5));

    invalidator.add(["shared"]).await;
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert!(!exists(&storages, CacheKind::Route, "/a").await);
    assert!(!exists(&storages, CacheKind::Data, "query:1").await);
    assert!(exists(&storages, CacheKind::Data, "query:2").await);
}

#[tokio::test(start_paused = true)]
async fn the_window_is_fixed_not_sliding() {
    let storages = StoragePartitions::in_memory();
    store(&storages, CacheKind::Route, "/a", &["t1"]).await;
    store(&storages, CacheKind::Route, "/b", &["t2"]).await;

    let invalidator =
        DebouncedInvalidator::new(storages.clone()).with_delay(Duration::from_secs(10));

    invalidator.add(["t1"]).await;
    tokio::time::sleep(Duration::from_secs(8)).await;
    // This add lands inside the open window and must not extend it.
    invalidator.add(["t2"]).await;
    tokio::time::sleep(Duration::from_secs(3)).await;

    // 11 seconds after the first add, both tags are flushed.
    assert!(!exists(&storages, CacheKind::Route, "/a").await);
    assert!(!exists(&storages, CacheKind::Route, "/b").await);
}

#[tokio::test]
async fn manual_invalidate_flushes_immediately() {
    let storages = StoragePartitions::in_memory();
    store(&storages, CacheKind::Data, "query:1", &["now"]).await;

    let invalidator = DebouncedInvalidator::new(storages.clone());
    invalidator.add(["now"]).await;
    invalidator.invalidate().await.unwrap();

    assert!(!exists(&storages, CacheKind::Data, "query:1").await);

    // Flushing again with nothing pending is a no-op.
    invalidator.invalidate().await.unwrap();
}
