//! Paging source abstraction for pagekit.
//!
//! A paging source hands out pages of a key-cursor collection. The engine
//! never touches the list from inside a source: `load` is a pure async
//! function of its parameters.
//!
//! # Example
//!
//! ```ignore
//! let source = MockPagingSource::new();
//! source.push_page(vec!["a", "b"], Some(2));
//! let result = source.load(LoadParams::new(LoadType::Refresh, 0, 2)).await;
//! ```

mod mock;

pub use mock::MockPagingSource;

use async_trait::async_trait;
use pagekit_types::{LoadParams, LoadResult};
use std::sync::Arc;

/// Provider of pages keyed by `K` holding items of type `T`.
///
/// Implementations report failures as [`LoadResult::Failure`]. A panic
/// inside `load` is caught by the fetcher and surfaces as a failure too.
#[async_trait]
pub trait PagingSource<K, T>: Send + Sync {
    /// Load one page.
    async fn load(&self, params: LoadParams<K>) -> LoadResult<K, T>;
}

#[async_trait]
impl<K, T, S> PagingSource<K, T> for Arc<S>
where
    K: Send + 'static,
    T: Send + 'static,
    S: PagingSource<K, T> + ?Sized,
{
    async fn load(&self, params: LoadParams<K>) -> LoadResult<K, T> {
        (**self).load(params).await
    }
}
