//! Load lifecycle types and the paging source contract.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::LoadError;

/// Which end of the list a load fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadType {
    /// Replace the whole list, starting from the initial key.
    Refresh,
    /// Grow the list at its end, starting from the last next key.
    Append,
}

impl fmt::Display for LoadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadType::Refresh => write!(f, "refresh"),
            LoadType::Append => write!(f, "append"),
        }
    }
}

/// Lifecycle of one load type.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Nothing requested yet.
    #[default]
    Incomplete,
    /// A load is in flight.
    Loading,
    /// The last load succeeded.
    Success {
        /// True when the source reported no further key.
        is_fully: bool,
    },
    /// The last load failed.
    Failure(LoadError),
}

impl LoadState {
    /// Check if a load is in flight.
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    /// Check if the last load succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Check if the last load failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    /// Check if everything has been loaded.
    pub fn is_fully(&self) -> bool {
        matches!(self, Self::Success { is_fully: true })
    }

    /// A load finished, successfully or not.
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Success { .. } | Self::Failure(_))
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&LoadError> {
        match self {
            Self::Failure(err) => Some(err),
            _ => None,
        }
    }
}

/// The combined refresh/append state pair.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadStates {
    /// State of the refresh load.
    pub refresh: LoadState,
    /// State of the append load.
    pub append: LoadState,
}

impl LoadStates {
    /// Both load types incomplete.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from an explicit pair.
    pub fn of(refresh: LoadState, append: LoadState) -> Self {
        Self { refresh, append }
    }

    /// The state of the given load type.
    pub fn get(&self, load_type: LoadType) -> &LoadState {
        match load_type {
            LoadType::Refresh => &self.refresh,
            LoadType::Append => &self.append,
        }
    }

    /// Replace the state of one load type.
    pub fn set(&mut self, load_type: LoadType, state: LoadState) {
        match load_type {
            LoadType::Refresh => self.refresh = state,
            LoadType::Append => self.append = state,
        }
    }

    /// Builder form of [`LoadStates::set`].
    pub fn with(mut self, load_type: LoadType, state: LoadState) -> Self {
        self.set(load_type, state);
        self
    }

    /// Either load type is in flight.
    pub fn is_loading(&self) -> bool {
        self.refresh.is_loading() || self.append.is_loading()
    }

    /// Either load type failed.
    pub fn is_failure(&self) -> bool {
        self.refresh.is_failure() || self.append.is_failure()
    }

    /// The source has no more pages.
    pub fn is_fully(&self) -> bool {
        self.refresh.is_fully() || self.append.is_fully()
    }

    /// Whether the list is in a position to grow at its end.
    ///
    /// Refresh must have succeeded without reaching the end, and append must
    /// be neither loading nor finished.
    pub fn is_allow_append(&self) -> bool {
        matches!(self.refresh, LoadState::Success { is_fully: false })
            && !self.append.is_loading()
            && !self.append.is_fully()
    }

    /// The load type currently failing, refresh first.
    pub fn failure_load_type(&self) -> Option<LoadType> {
        if self.refresh.is_failure() {
            Some(LoadType::Refresh)
        } else if self.append.is_failure() {
            Some(LoadType::Append)
        } else {
            None
        }
    }

    /// The error of the failing load type.
    pub fn error(&self) -> Option<&LoadError> {
        self.failure_load_type()
            .and_then(|load_type| self.get(load_type).error())
    }
}

/// Parameters for one page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadParams<K> {
    /// Which load this page belongs to.
    pub load_type: LoadType,
    /// The cursor key of the requested page.
    pub key: K,
    /// Requested number of items.
    pub page_size: usize,
}

impl<K> LoadParams<K> {
    /// Create page request parameters.
    pub fn new(load_type: LoadType, key: K, page_size: usize) -> Self {
        Self {
            load_type,
            key,
            page_size,
        }
    }
}

/// Result of one page request.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadResult<K, T> {
    /// A page of data and the key of the following page, if any.
    Success {
        /// Items of this page.
        data: Vec<T>,
        /// Key of the next page; `None` means the end was reached.
        next_key: Option<K>,
    },
    /// The page could not be loaded.
    Failure(LoadError),
}

impl<K, T> LoadResult<K, T> {
    /// A successful page.
    pub fn success(data: Vec<T>, next_key: Option<K>) -> Self {
        Self::Success { data, next_key }
    }

    /// A failed page.
    pub fn failure(error: LoadError) -> Self {
        Self::Failure(error)
    }
}
