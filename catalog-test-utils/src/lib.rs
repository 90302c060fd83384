//! Catalog Test Utilities
//!
//! Shared test infrastructure for the catalog workspace:
//! - Instrumented fetchers that count calls and concurrency
//! - A manually driven clock for TTL tests
//! - Proptest generators for kinds and fetch parameters
//! - Record fixtures and custom assertions

pub use catalog_core::{
    CacheError, CatalogError, CatalogRecord, CatalogResult, Clock, FetchError, FetchParams,
    Fetcher, Guide, ResourceKind, Shop, Template, Timestamp,
};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ============================================================================
// COUNTING FETCHER
// ============================================================================

struct FetcherState<T> {
    records: Mutex<Vec<T>>,
    failure: Mutex<Option<CatalogError>>,
    delay: Mutex<Duration>,
    panic: AtomicBool,
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    last_params: Mutex<Option<FetchParams>>,
}

/// Fetcher that returns canned records and records how it was called.
///
/// Clones share state, so a test can keep one handle while the cache owns
/// another. Each call sleeps for the configured delay (tokio time, so paused
/// clocks apply) before answering.
pub struct CountingFetcher<T> {
    state: Arc<FetcherState<T>>,
}

impl<T> Clone for CountingFetcher<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> std::fmt::Debug for CountingFetcher<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountingFetcher")
            .field("calls", &self.calls())
            .field("max_active", &self.max_active())
            .finish()
    }
}

impl<T> CountingFetcher<T> {
    pub fn new(records: Vec<T>) -> Self {
        Self {
            state: Arc::new(FetcherState {
                records: Mutex::new(records),
                failure: Mutex::new(None),
                delay: Mutex::new(Duration::ZERO),
                panic: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                last_params: Mutex::new(None),
            }),
        }
    }

    /// Make every call take `delay` before answering.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.set_delay(delay);
        self
    }

    pub fn set_delay(&self, delay: Duration) {
        *lock(&self.state.delay) = delay;
    }

    pub fn set_records(&self, records: Vec<T>) {
        *lock(&self.state.records) = records;
    }

    /// Fail every following call with `error` until cleared.
    pub fn fail_with(&self, error: impl Into<CatalogError>) {
        *lock(&self.state.failure) = Some(error.into());
    }

    pub fn clear_failure(&self) {
        *lock(&self.state.failure) = None;
    }

    /// Panic inside the fetch, after the delay.
    pub fn panic_on_fetch(&self, panic: bool) {
        self.state.panic.store(panic, Ordering::SeqCst);
    }

    /// Number of times the fetcher was invoked.
    pub fn calls(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    /// Invocations currently running.
    pub fn active(&self) -> usize {
        self.state.active.load(Ordering::SeqCst)
    }

    /// Highest number of invocations that ever ran at once.
    pub fn max_active(&self) -> usize {
        self.state.max_active.load(Ordering::SeqCst)
    }

    pub fn last_params(&self) -> Option<FetchParams> {
        lock(&self.state.last_params).clone()
    }
}

struct ActiveCall<'a>(&'a AtomicUsize);

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<T> Fetcher<T> for CountingFetcher<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn fetch(&self, params: &FetchParams) -> CatalogResult<Vec<T>> {
        let state = &self.state;
        state.calls.fetch_add(1, Ordering::SeqCst);
        let running = state.active.fetch_add(1, Ordering::SeqCst) + 1;
        state.max_active.fetch_max(running, Ordering::SeqCst);
        let _active = ActiveCall(&state.active);
        *lock(&state.last_params) = Some(params.clone());

        let delay = *lock(&state.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if state.panic.load(Ordering::SeqCst) {
            panic!("CountingFetcher configured to panic");
        }
        let failure = lock(&state.failure).clone();
        if let Some(error) = failure {
            return Err(error);
        }
        Ok(lock(&state.records).clone())
    }
}

// ============================================================================
// MANUAL CLOCK
// ============================================================================

/// Clock that only moves when told to.
///
/// Clones share the same time.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<Timestamp>>,
}

impl Default for ManualClock {
    /// Starts at 2024-01-01T00:00:00Z.
    fn default() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_else(Utc::now))
    }
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += chrono::Duration::milliseconds(by.as_millis() as i64);
    }

    pub fn set(&self, to: Timestamp) {
        *lock(&self.now) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *lock(&self.now)
    }
}

// ============================================================================
// TRACING
// ============================================================================

/// Install a fmt subscriber for tests, filtered by `RUST_LOG` (default: warn).
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for catalog types.

    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    /// Generate a ResourceKind variant.
    pub fn arb_resource_kind() -> impl Strategy<Value = ResourceKind> {
        prop_oneof![
            Just(ResourceKind::Templates),
            Just(ResourceKind::Shops),
            Just(ResourceKind::Guides),
        ]
    }

    /// Generate fetch parameters from a small domain, so that equal
    /// parameters come up often.
    pub fn arb_fetch_params() -> impl Strategy<Value = FetchParams> {
        (
            0u32..4,
            prop_oneof![Just(10u32), Just(20u32), Just(50u32)],
            prop::collection::btree_map("[a-c]", "[x-z]{1,2}", 0..3),
        )
            .prop_map(|(page, page_size, filters): (u32, u32, BTreeMap<String, String>)| {
                FetchParams {
                    page,
                    page_size,
                    filters,
                }
            })
    }

    /// Generate a fetch error for the given kind.
    pub fn arb_fetch_error(kind: ResourceKind) -> impl Strategy<Value = FetchError> {
        prop_oneof![
            "[a-z ]{1,20}".prop_map(move |reason| FetchError::Transport { kind, reason }),
            (400u16..600, "[a-z ]{1,20}")
                .prop_map(move |(status, message)| FetchError::Status { kind, status, message }),
            "[a-z ]{1,20}".prop_map(move |reason| FetchError::Decode { kind, reason }),
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built catalog records.

    use super::*;
    use uuid::Uuid;

    pub fn template(name: &str) -> Template {
        Template {
            template_id: Uuid::now_v7(),
            name: name.to_string(),
            category: "general".to_string(),
            updated_at: Utc::now(),
        }
    }

    pub fn shop(name: &str) -> Shop {
        Shop {
            shop_id: Uuid::now_v7(),
            name: name.to_string(),
            city: "Lisbon".to_string(),
            is_open: true,
        }
    }

    pub fn guide(title: &str) -> Guide {
        Guide {
            guide_id: Uuid::now_v7(),
            title: title.to_string(),
            slug: title.to_lowercase().replace(' ', "-"),
            published_at: None,
        }
    }

    /// `count` template records.
    pub fn templates(count: usize) -> Vec<CatalogRecord> {
        (0..count)
            .map(|i| template(&format!("Template {i}")).into())
            .collect()
    }

    /// `count` shop records.
    pub fn shops(count: usize) -> Vec<CatalogRecord> {
        (0..count)
            .map(|i| shop(&format!("Shop {i}")).into())
            .collect()
    }

    /// `count` guide records.
    pub fn guides(count: usize) -> Vec<CatalogRecord> {
        (0..count)
            .map(|i| guide(&format!("Guide {i}")).into())
            .collect()
    }

    /// Records of `kind`.
    pub fn records_for(kind: ResourceKind, count: usize) -> Vec<CatalogRecord> {
        match kind {
            ResourceKind::Templates => templates(count),
            ResourceKind::Shops => shops(count),
            ResourceKind::Guides => guides(count),
        }
    }

    pub fn transport_error(kind: ResourceKind) -> FetchError {
        FetchError::Transport {
            kind,
            reason: "connection refused".to_string(),
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for catalog error results.

    use super::*;

    /// Assert that a CatalogResult is a fetch error for `kind`.
    #[track_caller]
    pub fn assert_fetch_error<T: std::fmt::Debug>(result: &CatalogResult<T>, kind: ResourceKind) {
        match result {
            Err(CatalogError::Fetch(err)) => {
                assert_eq!(err.kind(), kind, "Wrong kind in fetch error");
            }
            other => panic!("Expected Fetch error for {kind}, got: {other:?}"),
        }
    }

    /// Assert that a CatalogResult reports an aborted fetch task for `kind`.
    #[track_caller]
    pub fn assert_fetch_aborted<T: std::fmt::Debug>(result: &CatalogResult<T>, kind: ResourceKind) {
        match result {
            Err(CatalogError::Cache(CacheError::FetchAborted { kind: k, .. })) => {
                assert_eq!(*k, kind, "Wrong kind in FetchAborted error");
            }
            other => panic!("Expected FetchAborted for {kind}, got: {other:?}"),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
