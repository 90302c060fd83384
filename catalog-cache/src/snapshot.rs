//! Persisted snapshots of the entry store.
//!
//! A snapshot is a versioned JSON document holding each kind's last entry.
//! Restoring one rehydrates entries with their original `stored_at`, so the
//! usual TTL check decides whether they are still served.

use catalog_core::constants::SNAPSHOT_FORMAT_VERSION;
use catalog_core::{
    CacheConfig, CatalogResult, Clock, FetchParams, ResourceKind, SnapshotError, Timestamp,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::entry::CacheEntry;
use crate::manager::CacheManager;

/// One persisted entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedEntry<T> {
    pub data: Vec<T>,
    pub stored_at: Timestamp,
    pub fetch_params: FetchParams,
}

impl<T: Clone> PersistedEntry<T> {
    fn from_entry(entry: &CacheEntry<T>) -> Self {
        Self {
            data: entry.data().as_ref().clone(),
            stored_at: entry.stored_at(),
            fetch_params: entry.fetch_params().clone(),
        }
    }
}

impl<T> PersistedEntry<T> {
    fn into_entry(self) -> CacheEntry<T> {
        CacheEntry::new(self.data, self.stored_at, self.fetch_params)
    }
}

/// Every entry of a cache at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    pub version: u32,
    pub entries: BTreeMap<ResourceKind, PersistedEntry<T>>,
}

impl<T> Default for Snapshot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Snapshot<T> {
    pub fn new() -> Self {
        Self {
            version: SNAPSHOT_FORMAT_VERSION,
            entries: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Deserialize)]
struct SnapshotHeader {
    version: u32,
}

/// A snapshot file on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The store at the configured snapshot path, if one is configured.
    pub fn from_config(config: &CacheConfig) -> Option<Self> {
        config.snapshot_path.as_ref().map(Self::new)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot file.
    ///
    /// Returns `Ok(None)` when the file does not exist or was written with a
    /// different format version.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Option<Snapshot<T>>, SnapshotError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let header: SnapshotHeader = serde_json::from_str(&contents)?;
        if header.version != SNAPSHOT_FORMAT_VERSION {
            tracing::warn!(
                path = %self.path.display(),
                found = header.version,
                expected = SNAPSHOT_FORMAT_VERSION,
                "Ignoring snapshot with unsupported format version"
            );
            return Ok(None);
        }

        let snapshot = serde_json::from_str::<Snapshot<T>>(&contents)?;
        Ok(Some(snapshot))
    }

    /// Write the snapshot file.
    ///
    /// The document is written to a sibling temp file and renamed over the
    /// target, so readers never see a partial file.
    pub fn save<T: Serialize>(&self, snapshot: &Snapshot<T>) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.temp_path();
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("snapshot"));
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl<T, C> CacheManager<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: Clock,
{
    /// Copy every current entry, fresh or not, into a snapshot.
    pub fn export_snapshot(&self) -> Snapshot<T> {
        let mut snapshot = Snapshot::new();
        for (kind, entry) in self.store.entries() {
            snapshot
                .entries
                .insert(kind, PersistedEntry::from_entry(&entry));
        }
        snapshot
    }

    /// Rehydrate entries from a snapshot, returning how many were restored.
    ///
    /// Entries of kinds without a registered fetcher are skipped. An existing
    /// entry that is newer than the persisted one is kept.
    pub fn restore_snapshot(&self, snapshot: Snapshot<T>) -> usize {
        let mut restored = 0;
        for (kind, persisted) in snapshot.entries {
            if !self.kinds().contains(&kind) {
                tracing::debug!(kind = %kind, "Skipping snapshot entry for unregistered kind");
                continue;
            }
            let newer_in_memory = self
                .store
                .get(kind)
                .is_some_and(|current| current.stored_at() >= persisted.stored_at);
            if newer_in_memory {
                continue;
            }
            self.store.replace(kind, persisted.into_entry());
            restored += 1;
        }
        tracing::debug!(restored, "Restored cache entries from snapshot");
        restored
    }
}

impl<T, C> CacheManager<T, C>
where
    T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
    C: Clock,
{
    /// Export the cache and write it to `store`. Returns the entry count.
    pub fn save_snapshot(&self, store: &SnapshotStore) -> CatalogResult<usize> {
        let snapshot = self.export_snapshot();
        store.save(&snapshot)?;
        tracing::debug!(
            path = %store.path().display(),
            entries = snapshot.len(),
            "Saved cache snapshot"
        );
        Ok(snapshot.len())
    }

    /// Load `store` and restore its entries. A missing or ignored snapshot
    /// restores nothing.
    pub fn restore_from(&self, store: &SnapshotStore) -> CatalogResult<usize> {
        match store.load::<T>()? {
            Some(snapshot) => Ok(self.restore_snapshot(snapshot)),
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn sample_snapshot() -> Snapshot<u32> {
        let mut snapshot = Snapshot::new();
        snapshot.entries.insert(
            ResourceKind::Shops,
            PersistedEntry {
                data: vec![1, 2, 3],
                stored_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
                fetch_params: FetchParams::page(2),
            },
        );
        snapshot
    }

    #[test]
    fn test_load_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("missing.json"));
        assert!(store.load::<u32>().unwrap().is_none());
    }

    #[test]
    fn test_load_unreadable_path_is_io_error() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let err = store.load::<u32>().unwrap_err();
        assert!(matches!(err, SnapshotError::Io { .. }));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("nested").join("cache.json"));

        store.save(&sample_snapshot()).unwrap();
        let loaded = store.load::<u32>().unwrap().unwrap();

        assert_eq!(loaded, sample_snapshot());
        assert!(!dir.path().join("nested").join("cache.json.tmp").exists());
    }

    #[test]
    fn test_version_mismatch_is_ignored() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, r#"{"version": 999, "entries": {}}"#).unwrap();

        let store = SnapshotStore::new(&path);
        assert!(store.load::<u32>().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json").unwrap();

        let err = SnapshotStore::new(&path).load::<u32>().unwrap_err();
        assert!(matches!(err, SnapshotError::Serde { .. }));
    }

    #[test]
    fn test_from_config() {
        assert!(SnapshotStore::from_config(&CacheConfig::default()).is_none());

        let config = CacheConfig::default().with_snapshot_path("/tmp/catalog.json");
        let store = SnapshotStore::from_config(&config).unwrap();
        assert_eq!(store.path(), Path::new("/tmp/catalog.json"));
    }
}
