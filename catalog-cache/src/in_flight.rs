//! In-flight tracking for request coalescing.
//!
//! Each resource kind has at most one running fetch. The first caller to
//! find a kind idle becomes the leader and registers the fetch's shared
//! completion future; every caller arriving while it runs awaits a clone of
//! that same future and receives the leader's outcome verbatim.

use catalog_core::{CatalogResult, ResourceKind};
use futures_util::future::{BoxFuture, Shared};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::entry::CacheEntry;

/// What a fetch resolves to: the freshly stored entry or the fetch error.
pub type FetchOutcome<T> = CatalogResult<CacheEntry<T>>;

/// A fetch completion future that any number of callers can await.
pub type SharedFetch<T> = Shared<BoxFuture<'static, FetchOutcome<T>>>;

/// Identifies one registered flight so only its owner can clear it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlightTicket {
    kind: ResourceKind,
    id: u64,
}

impl FlightTicket {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

/// The prospective leader's decision, made while the tracker is locked.
pub enum Lead<T> {
    /// Start a fetch and register its completion future.
    Start(SharedFetch<T>),
    /// A valid entry appeared since the caller last looked; serve it.
    Serve(CacheEntry<T>),
}

/// How a caller got attached to a resource kind's data.
pub enum Flight<T> {
    /// The caller started the fetch.
    Led(SharedFetch<T>),
    /// The caller joined a fetch that was already running.
    Joined(SharedFetch<T>),
    /// No fetch was needed.
    Served(CacheEntry<T>),
}

struct InFlight<T> {
    id: u64,
    fetch: SharedFetch<T>,
}

/// Per-kind registry of running fetches.
pub struct InFlightTracker<T> {
    flights: Mutex<HashMap<ResourceKind, InFlight<T>>>,
    next_id: AtomicU64,
}

impl<T> Default for InFlightTracker<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> InFlightTracker<T> {
    pub fn new() -> Self {
        Self {
            flights: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn flights(&self) -> MutexGuard<'_, HashMap<ResourceKind, InFlight<T>>> {
        match self.flights.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("In-flight tracker lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Join the running fetch for `kind`, or let `lead` decide what to do.
    ///
    /// `lead` runs with the tracker locked, so no second leader can appear
    /// for `kind` between the check and the registration. It must not block
    /// or touch this tracker.
    pub fn join_or_lead<F>(&self, kind: ResourceKind, lead: F) -> Flight<T>
    where
        F: FnOnce(FlightTicket) -> Lead<T>,
    {
        let mut flights = self.flights();
        if let Some(running) = flights.get(&kind) {
            return Flight::Joined(running.fetch.clone());
        }

        let ticket = FlightTicket {
            kind,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };
        match lead(ticket) {
            Lead::Start(fetch) => {
                flights.insert(
                    kind,
                    InFlight {
                        id: ticket.id,
                        fetch: fetch.clone(),
                    },
                );
                Flight::Led(fetch)
            }
            Lead::Serve(entry) => Flight::Served(entry),
        }
    }

    /// Clear the marker registered under `ticket`. Returns false if the
    /// kind is idle or a different flight owns it.
    pub fn finish(&self, ticket: FlightTicket) -> bool {
        let mut flights = self.flights();
        match flights.get(&ticket.kind) {
            Some(running) if running.id == ticket.id => {
                flights.remove(&ticket.kind);
                true
            }
            _ => false,
        }
    }

    pub fn is_in_flight(&self, kind: ResourceKind) -> bool {
        self.flights().contains_key(&kind)
    }

    /// Number of kinds with a fetch currently running.
    pub fn len(&self) -> usize {
        self.flights().len()
    }

    pub fn is_empty(&self) -> bool {
        self.flights().is_empty()
    }
}

/// Clears a flight's marker when dropped.
///
/// Moved into the fetch task so the marker goes away however the task ends:
/// success, error, panic, or the runtime dropping it.
pub struct FlightGuard<T> {
    tracker: Arc<InFlightTracker<T>>,
    ticket: FlightTicket,
}

impl<T> FlightGuard<T> {
    pub fn new(tracker: Arc<InFlightTracker<T>>, ticket: FlightTicket) -> Self {
        Self { tracker, ticket }
    }
}

impl<T> Drop for FlightGuard<T> {
    fn drop(&mut self) {
        self.tracker.finish(self.ticket);
    }
}
