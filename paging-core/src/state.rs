//! Fetch state machine for pagekit.
//!
//! This module provides a pure, side-effect-free state machine for one
//! fetcher session. The state machine takes events as input and produces
//! a new state plus a list of actions to execute.
//!
//! The actual I/O (calling the paging source, emitting events) is performed
//! by paging-client, not by this module. This enables instant unit testing
//! without a runtime or a source mock.

use pagekit_types::{LoadError, LoadParams, LoadState, LoadStates, LoadType};

use crate::cursor::KeyCursor;

/// Knobs that change how the machine reacts to requests and results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPolicy {
    /// Items requested per append page.
    pub page_size: usize,
    /// Items requested by refresh; `None` means `page_size`.
    pub initial_page_size: Option<usize>,
    /// Skip an empty page that still names a next key.
    pub skip_empty_page_with_next_key: bool,
    /// Let `append()` re-enter a failed append.
    pub auto_retry_append_failure: bool,
    /// Consecutive empty pages a single load may skip.
    pub max_empty_page_skips: u32,
}

impl FetchPolicy {
    /// Page size used by the given load type.
    pub fn page_size_for(&self, load_type: LoadType) -> usize {
        match load_type {
            LoadType::Refresh => self.initial_page_size.unwrap_or(self.page_size),
            LoadType::Append => self.page_size,
        }
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            page_size: 20,
            initial_page_size: None,
            skip_empty_page_with_next_key: true,
            auto_retry_append_failure: true,
            max_empty_page_skips: 64,
        }
    }
}

/// Fetch state machine - NO I/O, just state transitions.
///
/// At most one load is in flight. Requests that arrive while a load is
/// running, or that the current [`LoadStates`] do not allow, produce no
/// actions.
#[derive(Debug, Clone)]
pub struct FetchState<K> {
    policy: FetchPolicy,
    cursor: KeyCursor<K>,
    states: LoadStates,
    in_flight: Option<LoadType>,
}

impl<K: Clone> FetchState<K> {
    /// Create a machine for a session starting at `initial_key`.
    pub fn new(initial_key: K, policy: FetchPolicy) -> Self {
        Self {
            policy,
            cursor: KeyCursor::new(initial_key),
            states: LoadStates::new(),
            in_flight: None,
        }
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// This is a pure function - no side effects. The caller (paging-client)
    /// is responsible for executing the returned actions.
    pub fn on_event(mut self, event: Event<K>) -> (Self, Vec<Action<K>>) {
        let actions = match event {
            Event::RefreshRequested => self.request(LoadType::Refresh),

            Event::AppendRequested => {
                // A failed append comes back only through auto-retry or retry
                let allowed = self.states.is_allow_append()
                    && (!self.states.append.is_failure()
                        || self.policy.auto_retry_append_failure);
                if allowed {
                    self.request(LoadType::Append)
                } else {
                    vec![]
                }
            }

            Event::RetryRequested => match self.states.failure_load_type() {
                Some(load_type) => self.request(load_type),
                None => vec![],
            },

            Event::LoadSucceeded {
                load_type,
                is_empty,
                next_key,
            } if self.in_flight == Some(load_type) => {
                self.on_success(load_type, is_empty, next_key)
            }

            Event::LoadFailed { load_type, error } if self.in_flight == Some(load_type) => {
                self.fail(load_type, error)
            }

            // Results for a load that is not in flight
            Event::LoadSucceeded { .. } | Event::LoadFailed { .. } => vec![],
        };
        (self, actions)
    }

    /// Current load states.
    pub fn states(&self) -> &LoadStates {
        &self.states
    }

    /// The load currently in flight, if any.
    pub fn in_flight(&self) -> Option<LoadType> {
        self.in_flight
    }

    /// The session's key cursor.
    pub fn cursor(&self) -> &KeyCursor<K> {
        &self.cursor
    }

    /// The policy this machine runs with.
    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    fn request(&mut self, load_type: LoadType) -> Vec<Action<K>> {
        if self.in_flight.is_some() {
            return vec![];
        }
        if load_type == LoadType::Refresh {
            self.cursor.reset();
            self.states.append = LoadState::Incomplete;
        }
        let key = match self.cursor.next_key() {
            Some(key) => key.clone(),
            None => return vec![],
        };
        self.cursor.clear_skips();
        self.states.set(load_type, LoadState::Loading);
        self.in_flight = Some(load_type);
        vec![
            Action::EmitLoadState(load_type, self.states.clone()),
            Action::Load(LoadParams::new(
                load_type,
                key,
                self.policy.page_size_for(load_type),
            )),
        ]
    }

    fn on_success(
        &mut self,
        load_type: LoadType,
        is_empty: bool,
        next_key: Option<K>,
    ) -> Vec<Action<K>> {
        if is_empty {
            if let Some(key) = next_key {
                if !self.policy.skip_empty_page_with_next_key {
                    return self.fail(load_type, LoadError::InvalidPagingResult);
                }
                let limit = self.policy.max_empty_page_skips;
                if self.cursor.record_skip() > limit {
                    return self.fail(load_type, LoadError::TooManyEmptyPages { limit });
                }
                let page_size = self.policy.page_size_for(load_type);
                self.cursor.advance(Some(key.clone()));
                return vec![Action::ReloadAfterYield(LoadParams::new(
                    load_type, key, page_size,
                ))];
            }
        }

        let is_fully = next_key.is_none();
        self.cursor.advance(next_key);
        self.cursor.clear_skips();
        self.states.set(load_type, LoadState::Success { is_fully });
        self.in_flight = None;
        vec![Action::EmitData(load_type, self.states.clone())]
    }

    fn fail(&mut self, load_type: LoadType, error: LoadError) -> Vec<Action<K>> {
        self.cursor.clear_skips();
        self.states.set(load_type, LoadState::Failure(error));
        self.in_flight = None;
        vec![Action::EmitLoadState(load_type, self.states.clone())]
    }
}

/// Events that can occur during a fetcher session.
#[derive(Debug, Clone, PartialEq)]
pub enum Event<K> {
    /// Session start: load the first page.
    RefreshRequested,
    /// The consumer wants the next page.
    AppendRequested,
    /// The consumer wants the failing load re-issued.
    RetryRequested,
    /// The paging source returned a page.
    LoadSucceeded {
        /// Load the page belongs to.
        load_type: LoadType,
        /// Whether the page had no items.
        is_empty: bool,
        /// Key of the following page.
        next_key: Option<K>,
    },
    /// The paging source failed.
    LoadFailed {
        /// Load that failed.
        load_type: LoadType,
        /// Why it failed.
        error: LoadError,
    },
}

/// Actions to be executed by the fetcher.
///
/// These are instructions, not side effects. The fetcher interprets
/// these and performs the actual I/O.
#[derive(Debug, Clone, PartialEq)]
pub enum Action<K> {
    /// Call the paging source.
    Load(LoadParams<K>),
    /// Yield to the scheduler, then call the paging source again.
    /// Produced when an empty page was skipped; nothing is emitted.
    ReloadAfterYield(LoadParams<K>),
    /// Publish a load state change.
    EmitLoadState(LoadType, LoadStates),
    /// Publish the data of the page that just completed.
    EmitData(LoadType, LoadStates),
}
