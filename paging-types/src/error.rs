//! Load failure values for pagekit.

use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

/// Why a load ended in `LoadState::Failure`.
///
/// Cheap to clone: load states are copied into every event.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// The paging source reported an error.
    #[error("source error: {0}")]
    Source(Arc<dyn StdError + Send + Sync>),

    /// The source returned an empty page together with a next key while
    /// empty-page skipping is disabled.
    #[error("invalid paging result: empty page with a next key")]
    InvalidPagingResult,

    /// The source kept returning empty pages with a next key.
    #[error("gave up after skipping {limit} empty pages")]
    TooManyEmptyPages {
        /// The configured skip limit.
        limit: u32,
    },

    /// The paging source panicked while loading.
    #[error("paging source panicked: {0}")]
    SourcePanicked(String),
}

#[derive(Debug, Error)]
#[error("{0}")]
struct Message(String);

impl LoadError {
    /// Wrap an arbitrary source error.
    pub fn from_source<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Source(Arc::new(err))
    }

    /// A source error carrying only a message.
    pub fn message(msg: impl Into<String>) -> Self {
        Self::Source(Arc::new(Message(msg.into())))
    }
}

impl PartialEq for LoadError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Source(a), Self::Source(b)) => {
                Arc::ptr_eq(a, b) || a.to_string() == b.to_string()
            }
            (Self::InvalidPagingResult, Self::InvalidPagingResult) => true,
            (Self::TooManyEmptyPages { limit: a }, Self::TooManyEmptyPages { limit: b }) => a == b,
            (Self::SourcePanicked(a), Self::SourcePanicked(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for LoadError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = LoadError::message("network unreachable");
        assert_eq!(err.to_string(), "source error: network unreachable");

        let err = LoadError::TooManyEmptyPages { limit: 3 };
        assert_eq!(err.to_string(), "gave up after skipping 3 empty pages");
    }

    #[test]
    fn error_wraps_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = LoadError::from_source(io);
        assert!(matches!(err, LoadError::Source(_)));
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn errors_compare_by_message() {
        assert_eq!(LoadError::message("boom"), LoadError::message("boom"));
        assert_ne!(LoadError::message("boom"), LoadError::message("bang"));
        assert_ne!(LoadError::message("boom"), LoadError::InvalidPagingResult);
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LoadError>();
    }
}
