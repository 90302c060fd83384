//! Cache entries and the metadata-carrying result of a cache read.
//!
//! An entry is the last successfully fetched `(data, stored_at, params)`
//! triple for one resource kind. Reads hand back a [`CacheRead`] so callers
//! can see where the data came from and which parameters it answers.

use catalog_core::{FetchParams, Timestamp};
use std::sync::Arc;
use std::time::Duration;

/// The last successful fetch for one resource kind.
///
/// `data` is shared and immutable; replacing an entry always swaps the whole
/// triple, never individual fields.
#[derive(Debug)]
pub struct CacheEntry<T> {
    data: Arc<Vec<T>>,
    stored_at: Timestamp,
    fetch_params: FetchParams,
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            stored_at: self.stored_at,
            fetch_params: self.fetch_params.clone(),
        }
    }
}

impl<T> CacheEntry<T> {
    pub fn new(data: Vec<T>, stored_at: Timestamp, fetch_params: FetchParams) -> Self {
        Self::from_shared(Arc::new(data), stored_at, fetch_params)
    }

    pub fn from_shared(data: Arc<Vec<T>>, stored_at: Timestamp, fetch_params: FetchParams) -> Self {
        Self {
            data,
            stored_at,
            fetch_params,
        }
    }

    pub fn data(&self) -> &Arc<Vec<T>> {
        &self.data
    }

    pub fn stored_at(&self) -> Timestamp {
        self.stored_at
    }

    pub fn fetch_params(&self) -> &FetchParams {
        &self.fetch_params
    }

    /// Age of the entry as of `now`. Entries stamped in the future are age zero.
    pub fn age(&self, now: Timestamp) -> Duration {
        now.signed_duration_since(self.stored_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// True once the entry has lived for `ttl` or longer.
    pub fn is_expired(&self, ttl: Duration, now: Timestamp) -> bool {
        self.age(now) >= ttl
    }

    /// True if the entry is younger than `ttl` and was fetched with `params`.
    pub fn is_valid_for(&self, params: &FetchParams, ttl: Duration, now: Timestamp) -> bool {
        !self.is_expired(ttl, now) && &self.fetch_params == params
    }
}

/// Where the data of a [`CacheRead`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// Served from a valid cache entry, no network call.
    Cache,
    /// This caller led the fetch.
    Fetched,
    /// This caller waited on a fetch another caller led.
    Coalesced,
}

/// Result of a cache read, carrying provenance metadata.
#[derive(Debug)]
pub struct CacheRead<T> {
    value: Arc<Vec<T>>,
    cached_at: Timestamp,
    fetch_params: FetchParams,
    params_match: bool,
    source: ReadSource,
}

impl<T> CacheRead<T> {
    pub(crate) fn new(entry: CacheEntry<T>, requested: &FetchParams, source: ReadSource) -> Self {
        let params_match = &entry.fetch_params == requested;
        Self {
            value: entry.data,
            cached_at: entry.stored_at,
            fetch_params: entry.fetch_params,
            params_match,
            source,
        }
    }

    /// Consume the wrapper and return the shared records.
    pub fn into_value(self) -> Arc<Vec<T>> {
        self.value
    }

    pub fn value(&self) -> &[T] {
        &self.value
    }

    /// When the data was stored in the cache.
    pub fn cached_at(&self) -> Timestamp {
        self.cached_at
    }

    /// How old the data is as of `now`.
    pub fn age_at(&self, now: Timestamp) -> Duration {
        now.signed_duration_since(self.cached_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// The parameters the data was actually fetched with.
    pub fn fetch_params(&self) -> &FetchParams {
        &self.fetch_params
    }

    pub fn source(&self) -> ReadSource {
        self.source
    }

    pub fn was_cache_hit(&self) -> bool {
        self.source == ReadSource::Cache
    }

    pub fn was_coalesced(&self) -> bool {
        self.source == ReadSource::Coalesced
    }

    /// True when the data answers different parameters than were requested.
    ///
    /// Only happens to callers that coalesced onto a fetch started with other
    /// parameters: one fetch per kind at a time means the caller gets the
    /// current view rather than exactly what it asked for.
    pub fn params_mismatch(&self) -> bool {
        !self.params_match
    }
}

impl<T> AsRef<[T]> for CacheRead<T> {
    fn as_ref(&self) -> &[T] {
        &self.value
    }
}
