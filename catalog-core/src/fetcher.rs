//! Fetcher contract for catalog resources.
//!
//! A fetcher is supplied by the caller for each resource kind. The cache
//! never constructs one; it only invokes it when a fresh entry is needed.

use crate::{CatalogResult, FetchParams};
use async_trait::async_trait;
use std::future::Future;

/// Retrieves the records of one resource kind from the catalog service.
///
/// # Implementation Requirements
///
/// - Must not retain state between calls that changes what a call returns
/// - Must be safe to invoke repeatedly (the cache refetches on expiry)
/// - Timeouts are the fetcher's own concern; the cache never cancels a fetch
#[async_trait]
pub trait Fetcher<T>: Send + Sync {
    /// Fetch the records matching `params`.
    async fn fetch(&self, params: &FetchParams) -> CatalogResult<Vec<T>>;
}

/// Adapter turning an async closure into a [`Fetcher`].
///
/// Created with [`fetcher_fn`].
pub struct FnFetcher<F> {
    f: F,
}

/// Wrap an async closure taking owned [`FetchParams`] as a [`Fetcher`].
///
/// ```ignore
/// let fetcher = fetcher_fn(|params: FetchParams| async move {
///     client.list_shops(params.page, params.page_size).await
/// });
/// ```
pub fn fetcher_fn<F>(f: F) -> FnFetcher<F> {
    FnFetcher { f }
}

#[async_trait]
impl<T, F, Fut> Fetcher<T> for FnFetcher<F>
where
    T: Send + 'static,
    F: Fn(FetchParams) -> Fut + Send + Sync,
    Fut: Future<Output = CatalogResult<Vec<T>>> + Send,
{
    async fn fetch(&self, params: &FetchParams) -> CatalogResult<Vec<T>> {
        (self.f)(params.clone()).await
    }
}
