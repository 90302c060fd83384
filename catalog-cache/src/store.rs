//! Entry store: one current entry slot per resource kind.

use catalog_core::ResourceKind;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::entry::CacheEntry;

/// Holds the current [`CacheEntry`] (or its absence) for each kind.
///
/// Reads return a clone of the whole entry and writes swap the whole entry,
/// so no caller ever observes a partially updated slot. The lock is never
/// held across an await point.
#[derive(Debug)]
pub struct EntryStore<T> {
    slots: Mutex<HashMap<ResourceKind, CacheEntry<T>>>,
}

impl<T> Default for EntryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> EntryStore<T> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Acquire the slot map, recovering from a poisoned lock.
    ///
    /// Entries are only ever swapped whole, so a panic while the lock was
    /// held cannot leave a slot half-written.
    fn slots(&self) -> MutexGuard<'_, HashMap<ResourceKind, CacheEntry<T>>> {
        match self.slots.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Entry store lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    pub fn get(&self, kind: ResourceKind) -> Option<CacheEntry<T>> {
        self.slots().get(&kind).cloned()
    }

    /// Replace the entry for `kind`, returning the previous one.
    pub fn replace(&self, kind: ResourceKind, entry: CacheEntry<T>) -> Option<CacheEntry<T>> {
        self.slots().insert(kind, entry)
    }

    /// Remove the entry for `kind`. Returns true if one was present.
    pub fn remove(&self, kind: ResourceKind) -> bool {
        self.slots().remove(&kind).is_some()
    }

    /// Remove every entry, returning how many were present.
    pub fn clear(&self) -> usize {
        let mut slots = self.slots();
        let count = slots.len();
        slots.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    /// Clone out every current entry.
    pub fn entries(&self) -> Vec<(ResourceKind, CacheEntry<T>)> {
        self.slots()
            .iter()
            .map(|(kind, entry)| (*kind, entry.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::FetchParams;
    use chrono::Utc;
    use std::sync::Arc;

    fn entry(values: Vec<u32>) -> CacheEntry<u32> {
        CacheEntry::new(values, Utc::now(), FetchParams::default())
    }

    #[test]
    fn test_replace_swaps_whole_entry() {
        let store = EntryStore::new();
        assert!(store.replace(ResourceKind::Shops, entry(vec![1, 2])).is_none());

        let previous = store
            .replace(ResourceKind::Shops, entry(vec![3]))
            .expect("previous entry");
        assert_eq!(previous.data().as_slice(), &[1, 2]);
        assert_eq!(
            store.get(ResourceKind::Shops).unwrap().data().as_slice(),
            &[3]
        );
    }

    #[test]
    fn test_kinds_are_independent() {
        let store = EntryStore::new();
        store.replace(ResourceKind::Shops, entry(vec![1]));
        store.replace(ResourceKind::Guides, entry(vec![2]));

        assert!(store.remove(ResourceKind::Shops));
        assert!(store.get(ResourceKind::Shops).is_none());
        assert!(store.get(ResourceKind::Guides).is_some());
        assert!(!store.remove(ResourceKind::Shops));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = EntryStore::new();
        store.replace(ResourceKind::Templates, entry(vec![1]));
        store.replace(ResourceKind::Guides, entry(vec![2]));

        assert_eq!(store.clear(), 2);
        assert_eq!(store.clear(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_get_returns_shared_data() {
        let store = EntryStore::new();
        store.replace(ResourceKind::Templates, entry(vec![7]));

        let a = store.get(ResourceKind::Templates).unwrap();
        let b = store.get(ResourceKind::Templates).unwrap();
        assert!(Arc::ptr_eq(a.data(), b.data()));
        assert_eq!(store.entries().len(), 1);
    }
}
