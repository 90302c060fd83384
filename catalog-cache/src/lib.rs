//! Catalog Cache
//!
//! Client-side cache for catalog resources (templates, shops, guides).
//!
//! Each resource kind keeps one current entry, valid while it is younger
//! than the kind's TTL and was fetched with the requested parameters. At most
//! one fetch per kind runs at any time: concurrent readers of a kind share
//! the running fetch's outcome instead of issuing their own.
//!
//! # Example
//!
//! ```ignore
//! use catalog_cache::{CatalogCache, FetcherRegistry};
//! use catalog_core::{CacheConfig, FetchParams, ResourceKind};
//!
//! let fetchers = FetcherRegistry::new()
//!     .register(ResourceKind::Templates, templates_client)
//!     .register(ResourceKind::Shops, shops_client)
//!     .register(ResourceKind::Guides, guides_client);
//! let cache: CatalogCache = CatalogCache::new(CacheConfig::from_env(), fetchers);
//!
//! cache.preload_all(&FetchParams::default()).await;
//! let shops = cache.get(ResourceKind::Shops, &FetchParams::default(), false).await?;
//! ```

pub mod entry;
pub mod in_flight;
pub mod manager;
pub mod preload;
pub mod registry;
pub mod snapshot;
pub mod stats;
pub mod store;

pub use entry::{CacheEntry, CacheRead, ReadSource};
pub use manager::CacheManager;
pub use preload::{
    preload_observer_task, publish_session, session_channel, KindOutcome, PreloadConfig,
    PreloadMetrics, PreloadMetricsSnapshot, PreloadReport, SessionState, SessionStatus,
};
pub use registry::FetcherRegistry;
pub use snapshot::{PersistedEntry, Snapshot, SnapshotStore};
pub use stats::{CacheMetrics, CacheStats};

use catalog_core::{CatalogRecord, SystemClock};

/// Cache over the catalog's own record type, on the system clock.
pub type CatalogCache = CacheManager<CatalogRecord, SystemClock>;
