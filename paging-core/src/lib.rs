//! # paging-core
//!
//! Pure logic for pagekit (no I/O, instant tests).
//!
//! This crate implements the state machines and algorithms of the paging
//! engine without any async runtime, threads, or I/O:
//! - [`FetchState`] - the per-session REFRESH/APPEND/RETRY state machine
//! - [`KeyCursor`] - session-local page key bookkeeping
//! - [`OpBuffer`] - FIFO of updates waiting behind an in-flight diff
//! - [`ListState`] - the authoritative list, its version, positional updates
//! - [`diff`] - Myers diff with move detection over item callbacks
//!
//! ## Design Philosophy
//!
//! Like a reducer, every type here takes input and produces output without
//! side effects. The async driver in `paging-client` interprets the actions
//! produced by [`FetchState`], runs diffs on a worker thread, and owns the
//! serialization points.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod buffer;
pub mod cursor;
pub mod diff;
pub mod list;
pub mod state;

pub use buffer::{BufferError, OpBuffer};
pub use cursor::KeyCursor;
pub use diff::{diff, replay, DiffCancelled, EqCallback, ItemCallback, KeyedCallback};
pub use list::{Ignored, ListState};
pub use state::{Action, Event, FetchPolicy, FetchState};
