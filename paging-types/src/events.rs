//! Paging events.
//!
//! Fetcher sessions emit [`PagingEvent::LoadStateUpdate`] and
//! [`PagingEvent::LoadDataSuccess`]; the fusion layer wraps local edits as
//! [`PagingEvent::ListStateUpdate`] and republishes all three, versioned.

use std::sync::Arc;

use crate::{LoadStates, LoadType, UpdateOp};

/// An event of the paging pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PagingEvent<T> {
    /// A load type changed state without delivering data.
    LoadStateUpdate {
        /// The load type that changed.
        load_type: LoadType,
        /// The full state pair after the change.
        states: LoadStates,
    },
    /// A page arrived.
    LoadDataSuccess {
        /// Items of the page.
        data: Arc<Vec<T>>,
        /// Refresh replaces the list, append extends it.
        load_type: LoadType,
        /// The full state pair after the page was accepted.
        states: LoadStates,
    },
    /// A list mutation that did not come from a page load.
    ListStateUpdate {
        /// The applied mutation.
        op: UpdateOp<T>,
        /// Load states at the time of the mutation (unchanged by it).
        states: LoadStates,
    },
}

impl<T> PagingEvent<T> {
    /// The load states carried by this event.
    pub fn states(&self) -> &LoadStates {
        match self {
            Self::LoadStateUpdate { states, .. }
            | Self::LoadDataSuccess { states, .. }
            | Self::ListStateUpdate { states, .. } => states,
        }
    }

    /// The load type this event belongs to, if it came from a load.
    pub fn load_type(&self) -> Option<LoadType> {
        match self {
            Self::LoadStateUpdate { load_type, .. } | Self::LoadDataSuccess { load_type, .. } => {
                Some(*load_type)
            }
            Self::ListStateUpdate { .. } => None,
        }
    }

    /// Whether delivering this event mutates the list.
    pub fn is_list_mutation(&self) -> bool {
        !matches!(self, Self::LoadStateUpdate { .. })
    }
}

impl<T: Clone> PagingEvent<T> {
    /// The list mutation this event stands for, given the current list length.
    ///
    /// Refresh data replaces the list, append data is added at the end.
    pub fn to_update_op(&self, current_len: usize) -> Option<UpdateOp<T>> {
        match self {
            Self::LoadStateUpdate { .. } => None,
            Self::LoadDataSuccess {
                data,
                load_type: LoadType::Refresh,
                ..
            } => Some(UpdateOp::SubmitList(Arc::clone(data))),
            Self::LoadDataSuccess {
                data,
                load_type: LoadType::Append,
                ..
            } => Some(UpdateOp::AddItems(current_len, data.as_ref().clone())),
            Self::ListStateUpdate { op, .. } => Some(op.clone()),
        }
    }
}
