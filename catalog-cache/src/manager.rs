//! Cache manager with single-flight fetching.
//!
//! This module composes the entry store and the in-flight tracker with the
//! TTL and parameter-match policy. A read is answered from a valid entry when
//! possible, joins the running fetch for its kind when there is one, and
//! otherwise leads a new fetch.

use std::sync::Arc;
use std::time::Duration;

use catalog_core::{
    CacheConfig, CacheError, CatalogResult, Clock, FetchParams, Fetcher, ResourceKind, SystemClock,
};
use futures_util::FutureExt;

use crate::entry::{CacheEntry, CacheRead, ReadSource};
use crate::in_flight::{Flight, FlightGuard, FlightTicket, InFlightTracker, Lead, SharedFetch};
use crate::registry::FetcherRegistry;
use crate::stats::{CacheMetrics, CacheStats};
use crate::store::EntryStore;

/// TTL cache for catalog resources with per-kind request coalescing.
///
/// Holds one "current view" per resource kind. For each kind at most one
/// fetcher invocation is active at any instant; callers arriving while it
/// runs share its outcome, including its error.
///
/// Cloning is cheap and every clone operates on the same cache.
///
/// # Example
///
/// ```ignore
/// let fetchers = FetcherRegistry::new()
///     .register(ResourceKind::Shops, shops_fetcher)
///     .register(ResourceKind::Guides, guides_fetcher);
/// let cache = CacheManager::new(CacheConfig::default(), fetchers);
///
/// // Served from cache when a fresh entry for these params exists
/// let shops = cache.get(ResourceKind::Shops, &FetchParams::page(0), false).await?;
///
/// // Always fetches, unless a fetch for shops is already running
/// let shops = cache.get(ResourceKind::Shops, &FetchParams::page(0), true).await?;
/// ```
pub struct CacheManager<T, C = SystemClock>
where
    C: Clock,
{
    pub(crate) store: Arc<EntryStore<T>>,
    in_flight: Arc<InFlightTracker<T>>,
    fetchers: FetcherRegistry<T>,
    metrics: Arc<CacheMetrics>,
    config: CacheConfig,
    clock: Arc<C>,
}

impl<T> CacheManager<T, SystemClock>
where
    T: Send + Sync + 'static,
{
    /// Create a cache manager using the system clock.
    pub fn new(config: CacheConfig, fetchers: FetcherRegistry<T>) -> Self {
        Self::with_clock(config, fetchers, SystemClock)
    }
}

impl<T, C> CacheManager<T, C>
where
    T: Send + Sync + 'static,
    C: Clock,
{
    /// Create a cache manager with an explicit clock.
    ///
    /// Zero TTLs in `config` fall back to their defaults.
    pub fn with_clock(config: CacheConfig, fetchers: FetcherRegistry<T>, clock: C) -> Self {
        if let Err(error) = config.validate() {
            tracing::warn!(
                error = %error,
                "Invalid cache config, zero values fall back to defaults"
            );
        }
        Self {
            store: Arc::new(EntryStore::new()),
            in_flight: Arc::new(InFlightTracker::new()),
            fetchers,
            metrics: Arc::new(CacheMetrics::new()),
            config,
            clock: Arc::new(clock),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The TTL entries of `kind` live for.
    pub fn ttl_for(&self, kind: ResourceKind) -> Duration {
        self.config.ttl_for(kind)
    }

    /// Kinds with a registered fetcher.
    pub fn kinds(&self) -> Vec<ResourceKind> {
        self.fetchers.kinds()
    }

    pub fn stats(&self) -> CacheStats {
        self.metrics.snapshot()
    }

    /// The current entry for `kind`, fresh or not.
    pub fn entry(&self, kind: ResourceKind) -> Option<CacheEntry<T>> {
        self.store.get(kind)
    }

    pub fn is_in_flight(&self, kind: ResourceKind) -> bool {
        self.in_flight.is_in_flight(kind)
    }

    /// True if `kind` has no entry or its entry outlived the TTL.
    ///
    /// Only age is considered; the entry's parameters are not.
    pub fn is_stale(&self, kind: ResourceKind) -> bool {
        match self.store.get(kind) {
            Some(entry) => entry.is_expired(self.ttl_for(kind), self.clock.now()),
            None => true,
        }
    }

    /// True if every registered kind is stale.
    pub fn all_stale(&self) -> bool {
        self.fetchers.kinds().into_iter().all(|kind| self.is_stale(kind))
    }

    /// Get the records of `kind` for `params`.
    ///
    /// Returns the cached records when a valid entry exists and
    /// `force_refresh` is false. Otherwise joins the running fetch for
    /// `kind`, or starts one. On failure the existing entry is kept and the
    /// error is returned.
    pub async fn get(
        &self,
        kind: ResourceKind,
        params: &FetchParams,
        force_refresh: bool,
    ) -> CatalogResult<Arc<Vec<T>>> {
        self.read(kind, params, force_refresh)
            .await
            .map(CacheRead::into_value)
    }

    /// Same as [`CacheManager::get`], returning provenance metadata.
    ///
    /// A caller that coalesced onto a fetch started with other parameters
    /// receives that fetch's data; [`CacheRead::params_mismatch`] reports it.
    pub async fn read(
        &self,
        kind: ResourceKind,
        params: &FetchParams,
        force_refresh: bool,
    ) -> CatalogResult<CacheRead<T>> {
        let fetcher = self
            .fetchers
            .get(kind)
            .ok_or(CacheError::FetcherNotRegistered { kind })?;

        if !force_refresh {
            if let Some(entry) = self.valid_entry(kind, params) {
                self.metrics.record_hit();
                tracing::debug!(kind = %kind, "Cache hit");
                return Ok(CacheRead::new(entry, params, ReadSource::Cache));
            }
        }

        // Re-check under the tracker lock: a fetch may have completed since
        // the lookup above.
        let flight = self.in_flight.join_or_lead(kind, |ticket| {
            if !force_refresh {
                if let Some(entry) = self.valid_entry(kind, params) {
                    return Lead::Serve(entry);
                }
            }
            Lead::Start(self.spawn_fetch(ticket, fetcher, params.clone()))
        });

        let (fetch, source) = match flight {
            Flight::Served(entry) => {
                self.metrics.record_hit();
                tracing::debug!(kind = %kind, "Cache hit after concurrent refresh");
                return Ok(CacheRead::new(entry, params, ReadSource::Cache));
            }
            Flight::Led(fetch) => {
                self.metrics.record_miss();
                (fetch, ReadSource::Fetched)
            }
            Flight::Joined(fetch) => {
                self.metrics.record_coalesced();
                tracing::debug!(kind = %kind, "Joining in-flight fetch");
                (fetch, ReadSource::Coalesced)
            }
        };

        let read = CacheRead::new(fetch.await?, params, source);
        if read.params_mismatch() {
            tracing::debug!(
                kind = %kind,
                requested = ?params,
                served = ?read.fetch_params(),
                "Coalesced read answered with different params"
            );
        }
        Ok(read)
    }

    /// Remove the entry of `kind`, or of every kind when given `None`.
    ///
    /// Running fetches are not affected: one that completes afterwards
    /// repopulates its kind's entry.
    pub fn invalidate(&self, kind: impl Into<Option<ResourceKind>>) {
        self.metrics.record_invalidation();
        match kind.into() {
            Some(kind) => {
                let removed = self.store.remove(kind);
                tracing::debug!(kind = %kind, removed, "Invalidated cache entry");
            }
            None => {
                let removed = self.store.clear();
                tracing::debug!(removed, "Invalidated all cache entries");
            }
        }
    }

    /// Remove every entry. Same as `invalidate(None)`.
    pub fn invalidate_all(&self) {
        self.invalidate(None);
    }

    fn valid_entry(&self, kind: ResourceKind, params: &FetchParams) -> Option<CacheEntry<T>> {
        self.store
            .get(kind)
            .filter(|entry| entry.is_valid_for(params, self.ttl_for(kind), self.clock.now()))
    }

    /// Build the shared completion future of a fetch.
    ///
    /// The fetch task is spawned on the first poll, after the tracker lock has
    /// been released. It stores the entry on success and clears the in-flight
    /// marker before its outcome becomes visible, so every waiter that wakes
    /// up observes the updated store. Once spawned, dropping every waiter does
    /// not cancel it.
    fn spawn_fetch(
        &self,
        ticket: FlightTicket,
        fetcher: Arc<dyn Fetcher<T>>,
        params: FetchParams,
    ) -> SharedFetch<T> {
        let kind = ticket.kind();
        let guard = FlightGuard::new(Arc::clone(&self.in_flight), ticket);
        let store = Arc::clone(&self.store);
        let metrics = Arc::clone(&self.metrics);
        let clock = Arc::clone(&self.clock);

        let task = async move {
            let _guard = guard;
            tracing::debug!(kind = %kind, page = params.page, "Fetching resource");

            match fetcher.fetch(&params).await {
                Ok(records) => {
                    let entry = CacheEntry::new(records, clock.now(), params);
                    store.replace(kind, entry.clone());
                    tracing::debug!(
                        kind = %kind,
                        records = entry.data().len(),
                        "Stored fresh cache entry"
                    );
                    Ok(entry)
                }
                Err(e) => {
                    metrics.record_fetch_failure();
                    tracing::warn!(kind = %kind, error = %e, "Fetch failed, keeping existing entry");
                    Err(e)
                }
            }
        };

        async move {
            match tokio::spawn(task).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(kind = %kind, error = %e, "Fetch task aborted");
                    Err(CacheError::FetchAborted {
                        kind,
                        reason: e.to_string(),
                    }
                    .into())
                }
            }
        }
        .boxed()
        .shared()
    }
}

impl<T, C> Clone for CacheManager<T, C>
where
    C: Clock,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            in_flight: Arc::clone(&self.in_flight),
            fetchers: self.fetchers.clone(),
            metrics: Arc::clone(&self.metrics),
            config: self.config.clone(),
            clock: Arc::clone(&self.clock),
        }
    }
}
