//! Configuration types

use crate::constants::{
    DEFAULT_PRELOAD_CHECK_INTERVAL_MS, DEFAULT_TTL_MS, ENV_PRELOAD_INTERVAL_MS,
    ENV_SNAPSHOT_PATH, ENV_TTL_MS,
};
use crate::{ConfigError, ResourceKind};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Cache configuration.
///
/// Every field has a default, so an empty TOML document is a valid config.
/// Durations are kept in milliseconds to match the wire format of the
/// config file and environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// TTL shared by every resource kind without an override.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,

    /// Per-kind TTL overrides.
    #[serde(default)]
    pub kind_ttl_ms: BTreeMap<ResourceKind, u64>,

    /// Where to persist the entry store snapshot, if anywhere.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,

    /// How often the preload observer checks for all-stale caches.
    #[serde(default = "default_preload_check_interval_ms")]
    pub preload_check_interval_ms: u64,
}

fn default_ttl_ms() -> u64 {
    DEFAULT_TTL_MS
}

fn default_preload_check_interval_ms() -> u64 {
    DEFAULT_PRELOAD_CHECK_INTERVAL_MS
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: DEFAULT_TTL_MS,
            kind_ttl_ms: BTreeMap::new(),
            snapshot_path: None,
            preload_check_interval_ms: DEFAULT_PRELOAD_CHECK_INTERVAL_MS,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a CacheConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `CATALOG_CACHE_TTL_MS`: Entry TTL (default: 300000)
    /// - `CATALOG_CACHE_SNAPSHOT_PATH`: Snapshot file path (default: unset)
    /// - `CATALOG_CACHE_PRELOAD_INTERVAL_MS`: Preload observer interval (default: 60000)
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Same as [`CacheConfig::from_env`] with an explicit variable lookup.
    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let ttl_ms = lookup(ENV_TTL_MS)
            .and_then(|s| s.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_TTL_MS);

        let snapshot_path = lookup(ENV_SNAPSHOT_PATH)
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let preload_check_interval_ms = lookup(ENV_PRELOAD_INTERVAL_MS)
            .and_then(|s| s.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(DEFAULT_PRELOAD_CHECK_INTERVAL_MS);

        Self {
            ttl_ms,
            kind_ttl_ms: BTreeMap::new(),
            snapshot_path,
            preload_check_interval_ms,
        }
    }

    /// Load and validate a TOML config file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate a TOML config document.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: CacheConfig = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ttl_ms".to_string(),
                value: "0".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if let Some((kind, _)) = self.kind_ttl_ms.iter().find(|(_, ttl)| **ttl == 0) {
            return Err(ConfigError::InvalidValue {
                field: format!("kind_ttl_ms.{}", kind),
                value: "0".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if self.preload_check_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "preload_check_interval_ms".to_string(),
                value: "0".to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if let Some(path) = &self.snapshot_path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "snapshot_path".to_string(),
                    value: String::new(),
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }

    /// The default TTL shared by all kinds.
    ///
    /// A zero `ttl_ms` is treated as unset and yields the default.
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(non_zero_or(self.ttl_ms, DEFAULT_TTL_MS))
    }

    /// The TTL that applies to `kind`, honoring per-kind overrides.
    ///
    /// A zero override is ignored.
    pub fn ttl_for(&self, kind: ResourceKind) -> Duration {
        self.kind_ttl_ms
            .get(&kind)
            .filter(|ms| **ms > 0)
            .map(|ms| Duration::from_millis(*ms))
            .unwrap_or_else(|| self.ttl())
    }

    /// Interval of the preload observer's staleness check. Never zero.
    pub fn preload_check_interval(&self) -> Duration {
        Duration::from_millis(non_zero_or(
            self.preload_check_interval_ms,
            DEFAULT_PRELOAD_CHECK_INTERVAL_MS,
        ))
    }

    /// Set the shared TTL. Sub-millisecond durations round up to 1 ms.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = millis_ceil(ttl);
        self
    }

    pub fn with_kind_ttl(mut self, kind: ResourceKind, ttl: Duration) -> Self {
        self.kind_ttl_ms.insert(kind, millis_ceil(ttl));
        self
    }

    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn with_preload_check_interval(mut self, interval: Duration) -> Self {
        self.preload_check_interval_ms = millis_ceil(interval);
        self
    }
}

fn non_zero_or(ms: u64, default: u64) -> u64 {
    if ms == 0 {
        default
    } else {
        ms
    }
}

/// Whole milliseconds in `duration`, rounded up so only `Duration::ZERO` maps to 0.
fn millis_ceil(duration: Duration) -> u64 {
    let millis = duration.as_nanos().div_ceil(1_000_000);
    u64::try_from(millis).unwrap_or(u64::MAX)
}
