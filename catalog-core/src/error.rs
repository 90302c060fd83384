//! Error types for catalog cache operations

use crate::ResourceKind;
use thiserror::Error;

/// Errors produced by resource fetchers.
///
/// Fetch errors are handed verbatim to the caller that led the fetch and to
/// every caller that coalesced onto it, so they must be cheap to clone.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Transport failure fetching {kind}: {reason}")]
    Transport { kind: ResourceKind, reason: String },

    #[error("Catalog service returned status {status} for {kind}: {message}")]
    Status {
        kind: ResourceKind,
        status: u16,
        message: String,
    },

    #[error("Failed to decode {kind} response: {reason}")]
    Decode { kind: ResourceKind, reason: String },

    #[error("Fetch of {kind} rejected: {reason}")]
    Rejected { kind: ResourceKind, reason: String },
}

impl FetchError {
    /// The resource kind the failed fetch was for.
    pub fn kind(&self) -> ResourceKind {
        match self {
            FetchError::Transport { kind, .. }
            | FetchError::Status { kind, .. }
            | FetchError::Decode { kind, .. }
            | FetchError::Rejected { kind, .. } => *kind,
        }
    }
}

/// Cache layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("No fetcher registered for {kind}")]
    FetcherNotRegistered { kind: ResourceKind },

    #[error("Fetch task for {kind} aborted: {reason}")]
    FetchAborted { kind: ResourceKind, reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },
}

/// Snapshot persistence errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Snapshot IO error: {reason}")]
    Io { reason: String },

    #[error("Snapshot serialization error: {reason}")]
    Serde { reason: String },
}

impl From<std::io::Error> for SnapshotError {
    fn from(err: std::io::Error) -> Self {
        SnapshotError::Io {
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SnapshotError {
    fn from(err: serde_json::Error) -> Self {
        SnapshotError::Serde {
            reason: err.to_string(),
        }
    }
}

/// Master error type for all catalog cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Result type alias for catalog cache operations.
pub type CatalogResult<T> = Result<T, CatalogError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display_status() {
        let err = FetchError::Status {
            kind: ResourceKind::Shops,
            status: 503,
            message: "maintenance".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("503"));
        assert!(msg.contains("shops"));
        assert!(msg.contains("maintenance"));
    }

    #[test]
    fn test_fetch_error_kind() {
        let err = FetchError::Decode {
            kind: ResourceKind::Guides,
            reason: "unexpected token".to_string(),
        };
        assert_eq!(err.kind(), ResourceKind::Guides);
    }

    #[test]
    fn test_cache_error_display_not_registered() {
        let err = CacheError::FetcherNotRegistered {
            kind: ResourceKind::Templates,
        };
        assert_eq!(format!("{}", err), "No fetcher registered for templates");
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "ttl_ms".to_string(),
            value: "0".to_string(),
            reason: "must be > 0".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("ttl_ms"));
        assert!(msg.contains("must be > 0"));
    }

    #[test]
    fn test_snapshot_error_from_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = SnapshotError::from(io);
        assert!(matches!(err, SnapshotError::Io { .. }));
    }

    #[test]
    fn test_catalog_error_from_variants() {
        let fetch = CatalogError::from(FetchError::Transport {
            kind: ResourceKind::Shops,
            reason: "reset".to_string(),
        });
        assert!(matches!(fetch, CatalogError::Fetch(_)));

        let cache = CatalogError::from(CacheError::FetchAborted {
            kind: ResourceKind::Guides,
            reason: "panicked".to_string(),
        });
        assert!(matches!(cache, CatalogError::Cache(_)));

        let config = CatalogError::from(ConfigError::MissingRequired {
            field: "ttl_ms".to_string(),
        });
        assert!(matches!(config, CatalogError::Config(_)));

        let snapshot = CatalogError::from(SnapshotError::Serde {
            reason: "eof".to_string(),
        });
        assert!(matches!(snapshot, CatalogError::Snapshot(_)));
    }

    #[test]
    fn test_catalog_error_clone_is_equal() {
        let err = CatalogError::from(FetchError::Rejected {
            kind: ResourceKind::Templates,
            reason: "quota".to_string(),
        });
        assert_eq!(err.clone(), err);
    }
}
