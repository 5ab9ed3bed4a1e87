//! # paging-types
//!
//! Data model for the pagekit paging list engine.
//!
//! This crate provides the foundational types used across all pagekit crates:
//! - [`UpdateOp`] - Atomic list mutation commands
//! - [`LoadType`], [`LoadState`], [`LoadStates`] - Load lifecycle per load type
//! - [`LoadParams`], [`LoadResult`] - The paging source contract
//! - [`PagingEvent`] - Events flowing from fetcher sessions to the renderer
//! - [`ListChange`] - Renderer-facing record of an applied mutation
//! - [`Version`], [`SessionId`], [`Versioned`], [`Tagged`] - Ordering types
//! - [`LoadError`] - Load failure values

#![warn(missing_docs)]
#![warn(clippy::all)]

mod change;
mod envelope;
mod error;
mod events;
mod ids;
mod load;
mod ops;

pub use change::{ChangePayload, ListChange};
pub use envelope::{Tagged, Versioned};
pub use error::LoadError;
pub use events::PagingEvent;
pub use ids::{SessionId, Version};
pub use load::{LoadParams, LoadResult, LoadState, LoadStates, LoadType};
pub use ops::UpdateOp;
