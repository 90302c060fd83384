//! Per-kind fetcher registration.

use catalog_core::{Fetcher, ResourceKind};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// The fetchers a cache manager may call, one per resource kind.
///
/// The set of registered kinds is also the set of kinds the preloader warms.
pub struct FetcherRegistry<T> {
    fetchers: BTreeMap<ResourceKind, Arc<dyn Fetcher<T>>>,
}

impl<T> Default for FetcherRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for FetcherRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            fetchers: self.fetchers.clone(),
        }
    }
}

impl<T> fmt::Debug for FetcherRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetcherRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl<T> FetcherRegistry<T> {
    pub fn new() -> Self {
        Self {
            fetchers: BTreeMap::new(),
        }
    }

    /// Register `fetcher` for `kind`, replacing any previous one.
    pub fn register<F>(mut self, kind: ResourceKind, fetcher: F) -> Self
    where
        F: Fetcher<T> + 'static,
    {
        self.insert(kind, Arc::new(fetcher));
        self
    }

    pub fn insert(&mut self, kind: ResourceKind, fetcher: Arc<dyn Fetcher<T>>) {
        self.fetchers.insert(kind, fetcher);
    }

    pub fn get(&self, kind: ResourceKind) -> Option<Arc<dyn Fetcher<T>>> {
        self.fetchers.get(&kind).cloned()
    }

    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.fetchers.contains_key(&kind)
    }

    /// Registered kinds in [`ResourceKind`] order.
    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.fetchers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.fetchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fetchers.is_empty()
    }
}
