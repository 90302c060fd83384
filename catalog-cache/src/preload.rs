//! Preloading
//!
//! Warms every registered resource kind in parallel, either on demand
//! (`preload_all`, `spawn_preload`) or driven by the session lifecycle
//! (`preload_observer_task`).
//!
//! # Configuration
//!
//! The observer is configured via `PreloadConfig`:
//!
//! ```rust
//! use catalog_cache::PreloadConfig;
//! use std::time::Duration;
//!
//! let config = PreloadConfig {
//!     check_interval: Duration::from_secs(60), // Re-check staleness every minute
//!     invalidate_on_sign_out: true,            // Drop cached data on sign-out
//! };
//! ```

use catalog_core::constants::{
    DEFAULT_PRELOAD_CHECK_INTERVAL_MS, ENV_INVALIDATE_ON_SIGN_OUT, ENV_PRELOAD_INTERVAL_MS,
};
use catalog_core::{CacheConfig, CatalogError, Clock, FetchParams, ResourceKind};
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::manager::CacheManager;

// ============================================================================
// REPORT
// ============================================================================

/// How preloading one kind went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KindOutcome {
    /// The kind's records are cached; `records` is how many.
    Loaded { records: usize },
    /// The fetch failed; any previous entry is untouched.
    Failed { error: CatalogError },
}

/// Per-kind outcomes of one preload run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadReport {
    pub outcomes: BTreeMap<ResourceKind, KindOutcome>,
}

impl PreloadReport {
    pub fn loaded(&self) -> usize {
        self.outcomes
            .values()
            .filter(|outcome| matches!(outcome, KindOutcome::Loaded { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.loaded()
    }

    /// True if every kind loaded.
    pub fn is_complete(&self) -> bool {
        self.failed() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = (ResourceKind, &CatalogError)> + '_ {
        self.outcomes.iter().filter_map(|(kind, outcome)| match outcome {
            KindOutcome::Failed { error } => Some((*kind, error)),
            KindOutcome::Loaded { .. } => None,
        })
    }
}

impl<T, C> CacheManager<T, C>
where
    T: Send + Sync + 'static,
    C: Clock,
{
    /// Warm every registered kind concurrently.
    ///
    /// Each kind goes through `get(kind, params, false)`, so fresh entries
    /// are not refetched and running fetches are joined. Resolves once every
    /// kind has settled. A failing kind never affects the others and never
    /// fails the call.
    pub async fn preload_all(&self, params: &FetchParams) -> PreloadReport {
        let kinds = self.kinds();
        let settled = join_all(
            kinds
                .iter()
                .map(|&kind| async move { (kind, self.get(kind, params, false).await) }),
        )
        .await;

        let mut report = PreloadReport::default();
        for (kind, result) in settled {
            let outcome = match result {
                Ok(records) => KindOutcome::Loaded {
                    records: records.len(),
                },
                Err(error) => {
                    tracing::warn!(kind = %kind, error = %error, "Preload failed for kind");
                    KindOutcome::Failed { error }
                }
            };
            report.outcomes.insert(kind, outcome);
        }

        tracing::info!(
            loaded = report.loaded(),
            failed = report.failed(),
            "Preload completed"
        );
        report
    }

    /// Run [`CacheManager::preload_all`] on its own task.
    pub fn spawn_preload(&self, params: FetchParams) -> JoinHandle<PreloadReport> {
        let cache = self.clone();
        tokio::spawn(async move { cache.preload_all(&params).await })
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for the session preload observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadConfig {
    /// How often to check whether every kind went stale (default: 60 seconds)
    pub check_interval: Duration,

    /// Whether signing out clears every entry (default: true)
    pub invalidate_on_sign_out: bool,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_millis(DEFAULT_PRELOAD_CHECK_INTERVAL_MS),
            invalidate_on_sign_out: true,
        }
    }
}

impl PreloadConfig {
    /// Create PreloadConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `CATALOG_CACHE_PRELOAD_INTERVAL_MS`: Staleness check interval (default: 60000)
    /// - `CATALOG_CACHE_INVALIDATE_ON_SIGN_OUT`: Clear the cache on sign-out (default: true)
    pub fn from_env() -> Self {
        let check_interval = Duration::from_millis(
            std::env::var(ENV_PRELOAD_INTERVAL_MS)
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|ms| *ms > 0)
                .unwrap_or(DEFAULT_PRELOAD_CHECK_INTERVAL_MS),
        );

        let invalidate_on_sign_out = std::env::var(ENV_INVALIDATE_ON_SIGN_OUT)
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        Self {
            check_interval,
            invalidate_on_sign_out,
        }
    }

    /// The check interval actually used. A zero interval falls back to the
    /// default.
    pub fn effective_check_interval(&self) -> Duration {
        if self.check_interval.is_zero() {
            tracing::warn!("Zero preload check interval, using the default");
            Duration::from_millis(DEFAULT_PRELOAD_CHECK_INTERVAL_MS)
        } else {
            self.check_interval
        }
    }

    /// Take the check interval from a cache config.
    pub fn from_cache_config(config: &CacheConfig) -> Self {
        Self {
            check_interval: config.preload_check_interval(),
            ..Self::default()
        }
    }
}

// ============================================================================
// METRICS
// ============================================================================

/// Metrics for the preload observer.
#[derive(Debug, Default)]
pub struct PreloadMetrics {
    /// Preload runs started, for any reason
    pub runs: AtomicU64,

    /// Runs started because every kind had gone stale
    pub stale_runs: AtomicU64,

    /// Kinds that failed to load, summed over all runs
    pub failed_kinds: AtomicU64,

    /// Sign-outs observed
    pub sign_outs: AtomicU64,
}

impl PreloadMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get current snapshot of all metrics.
    pub fn snapshot(&self) -> PreloadMetricsSnapshot {
        PreloadMetricsSnapshot {
            runs: self.runs.load(Ordering::Relaxed),
            stale_runs: self.stale_runs.load(Ordering::Relaxed),
            failed_kinds: self.failed_kinds.load(Ordering::Relaxed),
            sign_outs: self.sign_outs.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of preload metrics at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreloadMetricsSnapshot {
    pub runs: u64,
    pub stale_runs: u64,
    pub failed_kinds: u64,
    pub sign_outs: u64,
}

// ============================================================================
// BACKGROUND TASK
// ============================================================================

/// Authentication state the observer follows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    SignedOut,
    Authenticated,
}

impl SessionState {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated)
    }
}

/// What the observer watches: the current session state plus a running
/// count of sign-outs.
///
/// A `watch` channel only keeps the latest value, so a sign-out followed by
/// a sign-in before the observer wakes would otherwise be lost. The counter
/// keeps it visible.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStatus {
    pub state: SessionState,
    pub sign_outs: u64,
}

impl SessionStatus {
    pub fn new(state: SessionState) -> Self {
        Self {
            state,
            sign_outs: 0,
        }
    }

    /// The status after moving to `state`.
    pub fn transition(self, state: SessionState) -> Self {
        let signed_out = self.state.is_authenticated() && !state.is_authenticated();
        Self {
            state,
            sign_outs: self.sign_outs + u64::from(signed_out),
        }
    }
}

/// Create the channel the observer reads session changes from.
pub fn session_channel(
    initial: SessionState,
) -> (watch::Sender<SessionStatus>, watch::Receiver<SessionStatus>) {
    watch::channel(SessionStatus::new(initial))
}

/// Publish a session state change to the observer.
pub fn publish_session(tx: &watch::Sender<SessionStatus>, state: SessionState) {
    tx.send_modify(|status| *status = status.transition(state));
}

/// Background task that keeps the cache warm for an authenticated session.
///
/// This task runs until the shutdown signal is received or the session
/// channel closes. It:
///
/// 1. Preloads every kind when the session becomes authenticated
/// 2. Preloads again on each check tick where every kind has gone stale
/// 3. Clears the cache on sign-out, unless configured otherwise
///
/// # Example
///
/// ```ignore
/// use tokio::sync::watch;
///
/// let (session_tx, session_rx) = session_channel(SessionState::SignedOut);
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
///
/// let handle = tokio::spawn(preload_observer_task(
///     cache.clone(),
///     FetchParams::default(),
///     PreloadConfig::default(),
///     session_rx,
///     shutdown_rx,
/// ));
///
/// publish_session(&session_tx, SessionState::Authenticated);
///
/// // Later, trigger shutdown
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub async fn preload_observer_task<T, C>(
    cache: CacheManager<T, C>,
    params: FetchParams,
    config: PreloadConfig,
    mut session_rx: watch::Receiver<SessionStatus>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<PreloadMetrics>
where
    T: Send + Sync + 'static,
    C: Clock,
{
    let metrics = Arc::new(PreloadMetrics::new());
    let period = config.effective_check_interval();

    let mut check_interval = interval_at(Instant::now() + period, period);
    check_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        check_interval_ms = period.as_millis() as u64,
        kinds = cache.kinds().len(),
        "Preload observer started"
    );

    // The running preload, if any. It lives on its own task so session
    // changes and shutdown are still observed while it runs.
    let mut running: Option<JoinHandle<PreloadReport>> = None;
    let status = *session_rx.borrow_and_update();
    let mut seen_sign_outs = status.sign_outs;
    let mut session = status.state;
    if session.is_authenticated() {
        start_preload(&cache, &params, &metrics, &mut running);
    }

    loop {
        tokio::select! {
            // Check for shutdown signal
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Preload observer shutting down");
                    break;
                }
            }

            // Session transitions
            changed = session_rx.changed() => {
                if changed.is_err() {
                    tracing::info!("Session channel closed, preload observer stopping");
                    break;
                }
                let previous = session;
                let status = *session_rx.borrow_and_update();
                let sign_outs = status.sign_outs.saturating_sub(seen_sign_outs);
                seen_sign_outs = status.sign_outs;
                session = status.state;

                if sign_outs > 0 {
                    metrics.sign_outs.fetch_add(sign_outs, Ordering::Relaxed);
                    abort_preload(&mut running);
                    if config.invalidate_on_sign_out {
                        tracing::info!("Session signed out, clearing catalog cache");
                        cache.invalidate_all();
                    }
                }
                if session.is_authenticated() && (sign_outs > 0 || !previous.is_authenticated()) {
                    tracing::info!("Session authenticated, preloading catalog");
                    start_preload(&cache, &params, &metrics, &mut running);
                }
            }

            // Running preload settled
            joined = wait_preload(&mut running), if running.is_some() => {
                running = None;
                match joined {
                    Ok(report) => {
                        metrics
                            .failed_kinds
                            .fetch_add(report.failed() as u64, Ordering::Relaxed);
                    }
                    Err(error) if error.is_cancelled() => {}
                    Err(error) => {
                        tracing::warn!(error = %error, "Preload task failed");
                    }
                }
            }

            // Staleness check
            _ = check_interval.tick() => {
                if session.is_authenticated() && running.is_none() && cache.all_stale() {
                    tracing::info!("Every catalog kind is stale, preloading again");
                    metrics.stale_runs.fetch_add(1, Ordering::Relaxed);
                    start_preload(&cache, &params, &metrics, &mut running);
                } else {
                    tracing::trace!("Preload check found nothing to do");
                }
            }
        }
    }

    abort_preload(&mut running);

    let snapshot = metrics.snapshot();
    tracing::info!(
        runs = snapshot.runs,
        stale_runs = snapshot.stale_runs,
        failed_kinds = snapshot.failed_kinds,
        sign_outs = snapshot.sign_outs,
        "Preload observer completed"
    );

    metrics
}

fn start_preload<T, C>(
    cache: &CacheManager<T, C>,
    params: &FetchParams,
    metrics: &PreloadMetrics,
    running: &mut Option<JoinHandle<PreloadReport>>,
) where
    T: Send + Sync + 'static,
    C: Clock,
{
    if running.is_some() {
        tracing::debug!("Preload already running");
        return;
    }
    metrics.runs.fetch_add(1, Ordering::Relaxed);
    *running = Some(cache.spawn_preload(params.clone()));
}

/// Stop waiting on the running preload. Fetches it started keep running on
/// their own tasks and still store their results.
fn abort_preload(running: &mut Option<JoinHandle<PreloadReport>>) {
    if let Some(handle) = running.take() {
        handle.abort();
    }
}

async fn wait_preload(
    running: &mut Option<JoinHandle<PreloadReport>>,
) -> Result<PreloadReport, JoinError> {
    match running.as_mut() {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_core::FetchError;

    #[test]
    fn test_default_config() {
        let config = PreloadConfig::default();
        assert_eq!(config.check_interval, Duration::from_secs(60));
        assert!(config.invalidate_on_sign_out);
    }

    #[test]
    fn test_config_from_cache_config() {
        let cache_config =
            CacheConfig::default().with_preload_check_interval(Duration::from_secs(5));
        let config = PreloadConfig::from_cache_config(&cache_config);
        assert_eq!(config.check_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_report_counts() {
        let mut report = PreloadReport::default();
        report
            .outcomes
            .insert(ResourceKind::Templates, KindOutcome::Loaded { records: 3 });
        report.outcomes.insert(
            ResourceKind::Shops,
            KindOutcome::Failed {
                error: FetchError::Transport {
                    kind: ResourceKind::Shops,
                    reason: "timeout".to_string(),
                }
                .into(),
            },
        );

        assert_eq!(report.loaded(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_complete());
        let failures: Vec<_> = report.failures().map(|(kind, _)| kind).collect();
        assert_eq!(failures, vec![ResourceKind::Shops]);
    }

    #[test]
    fn test_metrics_snapshot() {
        let metrics = PreloadMetrics::new();
        metrics.runs.fetch_add(2, Ordering::Relaxed);
        metrics.sign_outs.fetch_add(1, Ordering::Relaxed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.runs, 2);
        assert_eq!(snapshot.stale_runs, 0);
        assert_eq!(snapshot.sign_outs, 1);
    }

    #[test]
    fn test_session_state() {
        assert_eq!(SessionState::default(), SessionState::SignedOut);
        assert!(SessionState::Authenticated.is_authenticated());
    }

    #[test]
    fn test_session_status_counts_sign_outs() {
        let status = SessionStatus::new(SessionState::SignedOut)
            .transition(SessionState::Authenticated)
            .transition(SessionState::SignedOut)
            .transition(SessionState::SignedOut)
            .transition(SessionState::Authenticated);
        assert_eq!(status.state, SessionState::Authenticated);
        assert_eq!(status.sign_outs, 1);
    }

    #[test]
    fn test_zero_check_interval_falls_back_to_default() {
        let config = PreloadConfig {
            check_interval: Duration::ZERO,
            invalidate_on_sign_out: true,
        };
        assert_eq!(
            config.effective_check_interval(),
            Duration::from_millis(DEFAULT_PRELOAD_CHECK_INTERVAL_MS)
        );

        let cache_config = CacheConfig {
            preload_check_interval_ms: 0,
            ..CacheConfig::default()
        };
        let config = PreloadConfig::from_cache_config(&cache_config);
        assert_eq!(config.check_interval, Duration::from_secs(60));
    }
}
