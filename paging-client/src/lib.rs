//! # paging-client
//!
//! Async paging engine for pagekit, built on tokio.
//!
//! This is the crate applications use to page through a source and keep a
//! rendered list in sync with it.
//!
//! ## Components
//!
//! - **PagingSource**: the consumed contract, plus [`MockPagingSource`]
//! - **ListDiffer**: owns the list, applies updates in order, diffs off
//!   the actor on the blocking pool
//! - **Fetcher sessions**: one REFRESH/APPEND/RETRY state machine per
//!   session, driven by [`pagekit_core::FetchState`]
//! - **Pager**: starts sessions; one alive at a time
//! - **PagingCollector**: fuses page loads and local updates into one
//!   versioned stream of [`PagingUpdate`]s
//!
//! ## Example
//!
//! ```ignore
//! use pagekit_client::{EqCallback, ListDiffer, MockPagingSource, Pager, PagingConfig, RenderSignal};
//!
//! let source = MockPagingSource::new();
//! source.push_page(vec!["a", "b"], Some(2));
//!
//! let pager = Pager::new(source, 0, PagingConfig::default().with_page_size(2));
//! let (collector, mut updates) = pager.flow(ListDiffer::new(EqCallback), RenderSignal::new());
//!
//! while let Some(update) = updates.recv().await {
//!     println!("{:?}", update);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collector;
pub mod config;
pub mod differ;
pub mod error;
pub mod fetcher;
pub mod pager;
pub mod render;
pub mod source;

pub use collector::{PagingCollector, PagingUpdate, UpdateStream};
pub use config::{AppendPrefetch, ConfigError, PagingConfig};
pub use differ::{ApplyOutcome, IgnoreReason, ListDiffer, ListSnapshot, PendingApply};
pub use error::{DifferError, PagingError};
pub use fetcher::{FetcherHandle, SessionEvents};
pub use pager::Pager;
pub use render::{RenderHints, RenderSignal};
pub use source::{MockPagingSource, PagingSource};

pub use pagekit_core::{EqCallback, FetchPolicy, ItemCallback, KeyedCallback};
