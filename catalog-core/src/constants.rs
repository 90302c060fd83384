//! Constants for the catalog cache
//!
//! Default values and environment variable names used by configuration
//! loading. Centralizing them keeps the defaults easy to find and test.

// ============================================================================
// CACHE
// ============================================================================

/// Default time-to-live for cached entries in milliseconds (5 minutes)
pub const DEFAULT_TTL_MS: u64 = 300_000;

/// Default interval between staleness checks of the preload observer (1 minute)
pub const DEFAULT_PRELOAD_CHECK_INTERVAL_MS: u64 = 60_000;

// ============================================================================
// PAGINATION
// ============================================================================

/// Default page size for catalog listings
pub const DEFAULT_PAGE_SIZE: u32 = 20;

// ============================================================================
// SNAPSHOTS
// ============================================================================

/// Format version written into persisted snapshots
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

// ============================================================================
// ENVIRONMENT
// ============================================================================

/// Overrides the default TTL (milliseconds)
pub const ENV_TTL_MS: &str = "CATALOG_CACHE_TTL_MS";

/// Enables snapshot persistence at the given path
pub const ENV_SNAPSHOT_PATH: &str = "CATALOG_CACHE_SNAPSHOT_PATH";

/// Overrides the preload observer check interval (milliseconds)
pub const ENV_PRELOAD_INTERVAL_MS: &str = "CATALOG_CACHE_PRELOAD_INTERVAL_MS";

/// Whether the preload observer clears the cache on sign-out (default: true)
pub const ENV_INVALIDATE_ON_SIGN_OUT: &str = "CATALOG_CACHE_INVALIDATE_ON_SIGN_OUT";
