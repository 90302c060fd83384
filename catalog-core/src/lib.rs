//! Catalog Core - Shared Types
//!
//! Resource kinds, fetch parameters, domain records, errors, configuration,
//! and the fetcher contract. Every other crate in the workspace depends on
//! this one; it contains no caching logic.

use chrono::{DateTime, Utc};

pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod fetcher;
pub mod kind;
pub mod params;
pub mod records;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

pub use clock::{Clock, SystemClock};
pub use config::CacheConfig;
pub use error::{CacheError, CatalogError, CatalogResult, ConfigError, FetchError, SnapshotError};
pub use fetcher::{fetcher_fn, Fetcher, FnFetcher};
pub use kind::ResourceKind;
pub use params::FetchParams;
pub use records::{CatalogRecord, Guide, Shop, Template};
