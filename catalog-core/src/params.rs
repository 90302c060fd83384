//! Fetch parameters for catalog requests

use crate::constants::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The paging and filter options a caller wants a resource listed with.
///
/// A cached entry only answers a request whose parameters are structurally
/// equal to the ones the entry was fetched with. Filters are kept in a
/// `BTreeMap` so equality does not depend on insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchParams {
    pub page: u32,
    pub page_size: u32,
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

impl Default for FetchParams {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
            filters: BTreeMap::new(),
        }
    }
}

impl FetchParams {
    /// Parameters for the given page with the default page size.
    pub fn page(page: u32) -> Self {
        Self {
            page,
            ..Self::default()
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    pub fn filter(&self, key: &str) -> Option<&str> {
        self.filters.get(key).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_order_does_not_affect_equality() {
        let a = FetchParams::page(1)
            .with_filter("city", "lyon")
            .with_filter("category", "bakery");
        let b = FetchParams::page(1)
            .with_filter("category", "bakery")
            .with_filter("city", "lyon");
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_page_is_not_equal() {
        assert_ne!(FetchParams::page(0), FetchParams::page(1));
        assert_ne!(
            FetchParams::page(0),
            FetchParams::page(0).with_page_size(DEFAULT_PAGE_SIZE + 1)
        );
    }

    #[test]
    fn test_filter_lookup() {
        let params = FetchParams::default().with_filter("city", "lyon");
        assert_eq!(params.filter("city"), Some("lyon"));
        assert_eq!(params.filter("missing"), None);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_filter_insertion_order_is_irrelevant(
                filters in prop::collection::vec(("[a-d]", "[a-z]{1,4}"), 0..6),
            ) {
                let forward = filters
                    .iter()
                    .fold(FetchParams::default(), |p, (k, v)| p.with_filter(k.as_str(), v.as_str()));

                // Later inserts win, so reversing must keep the last value per key.
                let mut last = BTreeMap::new();
                for (k, v) in &filters {
                    last.insert(k.clone(), v.clone());
                }
                let reversed = last
                    .iter()
                    .rev()
                    .fold(FetchParams::default(), |p, (k, v)| p.with_filter(k.as_str(), v.as_str()));

                prop_assert_eq!(forward, reversed);
            }
        }
    }
}
