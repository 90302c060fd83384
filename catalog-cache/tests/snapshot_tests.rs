//! Snapshot persistence tests against the catalog record type.

use catalog_cache::{
    CacheManager, CatalogCache, FetcherRegistry, PersistedEntry, ReadSource, Snapshot,
    SnapshotStore,
};
use catalog_core::{CacheConfig, CatalogRecord, Clock, FetchParams, ResourceKind};
use catalog_test_utils::{fixtures, CountingFetcher, ManualClock};
use chrono::Utc;
use std::time::Duration;
use tempfile::TempDir;

fn catalog_fetchers() -> (
    CountingFetcher<CatalogRecord>,
    CountingFetcher<CatalogRecord>,
    FetcherRegistry<CatalogRecord>,
) {
    let templates = CountingFetcher::new(fixtures::templates(2));
    let shops = CountingFetcher::new(fixtures::shops(3));
    let registry = FetcherRegistry::new()
        .register(ResourceKind::Templates, templates.clone())
        .register(ResourceKind::Shops, shops.clone());
    (templates, shops, registry)
}

#[tokio::test]
async fn test_snapshot_round_trip_serves_from_cache() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path().join("catalog.json"));
    let params = FetchParams::page(1).with_filter("city", "Lisbon");

    let (_, _, registry) = catalog_fetchers();
    let cache = CatalogCache::new(CacheConfig::default(), registry);
    cache.get(ResourceKind::Templates, &params, false).await.unwrap();
    cache.get(ResourceKind::Shops, &params, false).await.unwrap();
    let original = cache.entry(ResourceKind::Shops).unwrap();

    assert_eq!(cache.save_snapshot(&store).unwrap(), 2);

    let (templates, shops, registry) = catalog_fetchers();
    let restored = CatalogCache::new(CacheConfig::default(), registry);
    assert_eq!(restored.restore_from(&store).unwrap(), 2);

    let entry = restored.entry(ResourceKind::Shops).unwrap();
    assert_eq!(entry.stored_at(), original.stored_at());
    assert_eq!(entry.data().as_slice(), original.data().as_slice());

    let read = restored
        .read(ResourceKind::Shops, &params, false)
        .await
        .unwrap();
    assert_eq!(read.source(), ReadSource::Cache);
    assert_eq!(shops.calls(), 0);
    assert_eq!(templates.calls(), 0);
}

#[tokio::test]
async fn test_stale_rehydrated_entry_is_refetched() {
    let clock = ManualClock::default();
    let (_, shops, registry) = catalog_fetchers();
    let config = CacheConfig::new().with_ttl(Duration::from_secs(60));
    let cache = CacheManager::with_clock(config, registry, clock.clone());

    let mut snapshot = Snapshot::new();
    snapshot.entries.insert(
        ResourceKind::Shops,
        PersistedEntry {
            data: fixtures::shops(1),
            stored_at: Utc::now(),
            fetch_params: FetchParams::default(),
        },
    );
    clock.set(Utc::now() + chrono::Duration::minutes(5));

    assert_eq!(cache.restore_snapshot(snapshot), 1);
    assert!(cache.is_stale(ResourceKind::Shops));

    let records = cache
        .get(ResourceKind::Shops, &FetchParams::default(), false)
        .await
        .unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(shops.calls(), 1);
}

#[tokio::test]
async fn test_restore_keeps_newer_entries_and_skips_unregistered_kinds() {
    let (_, _, registry) = catalog_fetchers();
    let cache = CatalogCache::new(CacheConfig::default(), registry);
    cache
        .get(ResourceKind::Shops, &FetchParams::default(), false)
        .await
        .unwrap();
    let current = cache.entry(ResourceKind::Shops).unwrap();

    let older = Utc::now() - chrono::Duration::minutes(1);
    let mut snapshot = Snapshot::new();
    snapshot.entries.insert(
        ResourceKind::Shops,
        PersistedEntry {
            data: fixtures::shops(1),
            stored_at: older,
            fetch_params: FetchParams::default(),
        },
    );
    snapshot.entries.insert(
        ResourceKind::Guides,
        PersistedEntry {
            data: fixtures::guides(1),
            stored_at: older,
            fetch_params: FetchParams::default(),
        },
    );

    assert_eq!(cache.restore_snapshot(snapshot), 0);
    assert_eq!(
        cache.entry(ResourceKind::Shops).unwrap().stored_at(),
        current.stored_at()
    );
    assert!(cache.entry(ResourceKind::Guides).is_none());
}

#[tokio::test]
async fn test_missing_snapshot_restores_nothing() {
    let dir = TempDir::new().unwrap();
    let store = SnapshotStore::new(dir.path().join("absent.json"));
    let (_, _, registry) = catalog_fetchers();
    let cache = CatalogCache::new(CacheConfig::default(), registry);

    assert_eq!(cache.restore_from(&store).unwrap(), 0);
    assert!(cache.all_stale());
}

#[tokio::test]
async fn test_export_includes_stale_entries() {
    let clock = ManualClock::default();
    let (_, _, registry) = catalog_fetchers();
    let config = CacheConfig::new().with_ttl(Duration::from_secs(1));
    let cache = CacheManager::with_clock(config, registry, clock.clone());

    cache
        .get(ResourceKind::Templates, &FetchParams::default(), false)
        .await
        .unwrap();
    clock.advance(Duration::from_secs(10));

    let snapshot = cache.export_snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(
        snapshot.entries[&ResourceKind::Templates].stored_at,
        clock.now() - chrono::Duration::seconds(10)
    );
}
