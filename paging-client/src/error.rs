//! Error types for the paging engine.

use thiserror::Error;

/// Errors reported by [`ListDiffer`](crate::ListDiffer) to whoever awaits
/// an update.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DifferError {
    /// The differ task is gone.
    #[error("list differ closed")]
    Closed,

    /// A newer `SubmitList` replaced the list before this update applied.
    #[error("update cancelled by a newer list")]
    Cancelled,

    /// An item callback panicked while diffing.
    #[error("item callback panicked: {0}")]
    Callback(String),

    /// Too many updates are waiting behind the current diff.
    #[error("too many pending updates (capacity: {0})")]
    Backlog(usize),
}

/// Errors reported by [`PagingCollector`](crate::PagingCollector).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PagingError {
    /// The collector task is gone.
    #[error("paging collector closed")]
    Closed,

    /// The list update failed.
    #[error("list update failed: {0}")]
    Differ(#[from] DifferError),
}

/// Extract the message of a panic caught by a join handle.
pub(crate) fn panic_message(err: tokio::task::JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => {
            if let Some(msg) = payload.downcast_ref::<&str>() {
                (*msg).to_string()
            } else if let Some(msg) = payload.downcast_ref::<String>() {
                msg.clone()
            } else {
                "non-string panic payload".to_string()
            }
        }
        Err(err) => err.to_string(),
    }
}
