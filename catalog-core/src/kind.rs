//! Resource kinds served by the catalog service

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A named category of cacheable remote data.
///
/// Each kind owns exactly one cache entry slot and one in-flight marker.
/// Kinds are independent: fetching or invalidating one never blocks another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResourceKind {
    Templates,
    Shops,
    Guides,
}

impl ResourceKind {
    /// Every known resource kind, in preload order.
    pub const ALL: [ResourceKind; 3] = [
        ResourceKind::Templates,
        ResourceKind::Shops,
        ResourceKind::Guides,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Templates => "templates",
            ResourceKind::Shops => "shops",
            ResourceKind::Guides => "guides",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "templates" | "template" => Ok(ResourceKind::Templates),
            "shops" | "shop" => Ok(ResourceKind::Shops),
            "guides" | "guide" => Ok(ResourceKind::Guides),
            other => Err(format!("Unknown resource kind: {}", other)),
        }
    }
}

impl TryFrom<String> for ResourceKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResourceKind> for String {
    fn from(kind: ResourceKind) -> Self {
        kind.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_roundtrips_through_from_str() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.to_string().parse::<ResourceKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_from_str_accepts_singular_and_case() {
        assert_eq!("Shop".parse::<ResourceKind>(), Ok(ResourceKind::Shops));
        assert_eq!(" GUIDES ".parse::<ResourceKind>(), Ok(ResourceKind::Guides));
        assert!("coupons".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&ResourceKind::Templates).unwrap();
        assert_eq!(json, "\"templates\"");
        let kind: ResourceKind = serde_json::from_str("\"shops\"").unwrap();
        assert_eq!(kind, ResourceKind::Shops);
    }
}
