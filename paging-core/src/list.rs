//! The authoritative list and positional update application.
//!
//! [`ListState`] owns the current items behind an [`Arc`] so readers can
//! hold a snapshot while the list moves on. Mutations copy on write.

use std::sync::Arc;

use pagekit_types::{ListChange, UpdateOp, Version};
use thiserror::Error;

/// Why an update left the list untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Ignored {
    /// A position (or range) outside the current list.
    #[error("position out of range")]
    OutOfRange,
    /// The op would not change anything (zero-length range, move in place,
    /// empty list replaced by an empty list).
    #[error("op changes nothing")]
    NoChange,
    /// The submitted list is the current list.
    #[error("list already current")]
    SameList,
}

/// The current list and its version.
#[derive(Debug, Clone)]
pub struct ListState<T> {
    items: Arc<Vec<T>>,
    version: Version,
}

impl<T> Default for ListState<T> {
    fn default() -> Self {
        Self {
            items: Arc::new(Vec::new()),
            version: Version::zero(),
        }
    }
}

impl<T: Clone> ListState<T> {
    /// An empty list at version zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// A list starting with the given items, at version zero.
    pub fn with_items(items: Vec<T>) -> Self {
        Self {
            items: Arc::new(items),
            version: Version::zero(),
        }
    }

    /// Shared handle to the current items.
    pub fn items(&self) -> &Arc<Vec<T>> {
        &self.items
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Version of the current list.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Whether `op` is a `SubmitList` that needs a real diff.
    ///
    /// Identical lists and lists where either side is empty take the cheap
    /// path in [`ListState::apply`].
    pub fn needs_diff(&self, op: &UpdateOp<T>) -> bool {
        match op {
            UpdateOp::SubmitList(new) => {
                !Arc::ptr_eq(new, &self.items) && !new.is_empty() && !self.items.is_empty()
            }
            _ => false,
        }
    }

    /// Apply one update, returning the changes a renderer must replay.
    ///
    /// A `SubmitList` that [needs a diff](ListState::needs_diff) is applied
    /// as a full replacement here; callers that want a minimal change set
    /// diff the lists themselves and use [`ListState::commit`].
    pub fn apply(&mut self, op: UpdateOp<T>) -> Result<Vec<ListChange>, Ignored> {
        let len = self.items.len();
        let changes = match op {
            UpdateOp::SubmitList(new) => {
                if Arc::ptr_eq(&new, &self.items) {
                    return Err(Ignored::SameList);
                }
                let changes = match (len, new.len()) {
                    (0, 0) => return Err(Ignored::NoChange),
                    (0, count) => vec![ListChange::Inserted { position: 0, count }],
                    (count, 0) => vec![ListChange::Removed { position: 0, count }],
                    (old, count) => vec![
                        ListChange::Removed {
                            position: 0,
                            count: old,
                        },
                        ListChange::Inserted { position: 0, count },
                    ],
                };
                self.items = new;
                changes
            }

            UpdateOp::SetItem(position, item) => {
                if position >= len {
                    return Err(Ignored::OutOfRange);
                }
                Arc::make_mut(&mut self.items)[position] = item;
                vec![changed(position, 1)]
            }

            UpdateOp::SetItems(position, items) => {
                let count = items.len();
                check_range(position, count, len)?;
                Arc::make_mut(&mut self.items).splice(position..position + count, items);
                vec![changed(position, count)]
            }

            UpdateOp::AddItem(position, item) => {
                if position > len {
                    return Err(Ignored::OutOfRange);
                }
                Arc::make_mut(&mut self.items).insert(position, item);
                vec![ListChange::Inserted { position, count: 1 }]
            }

            UpdateOp::AddItems(position, items) => {
                if position > len {
                    return Err(Ignored::OutOfRange);
                }
                let count = items.len();
                if count == 0 {
                    return Err(Ignored::NoChange);
                }
                Arc::make_mut(&mut self.items).splice(position..position, items);
                vec![ListChange::Inserted { position, count }]
            }

            UpdateOp::RemoveItems(position, count) => {
                check_range(position, count, len)?;
                Arc::make_mut(&mut self.items).drain(position..position + count);
                vec![ListChange::Removed { position, count }]
            }

            UpdateOp::MoveItem(from, to) => {
                if from >= len || to >= len {
                    return Err(Ignored::OutOfRange);
                }
                if from == to {
                    return Err(Ignored::NoChange);
                }
                let items = Arc::make_mut(&mut self.items);
                let item = items.remove(from);
                items.insert(to, item);
                vec![ListChange::Moved { from, to }]
            }
        };
        self.version = self.version.next();
        Ok(changes)
    }

    /// Install a diffed list together with the changes that produce it.
    pub fn commit(&mut self, items: Arc<Vec<T>>, changes: Vec<ListChange>) -> Vec<ListChange> {
        self.items = items;
        self.version = self.version.next();
        changes
    }
}

fn changed(position: usize, count: usize) -> ListChange {
    ListChange::Changed {
        position,
        count,
        payload: None,
    }
}

/// `position..position + count` must lie inside the list and be non-empty.
fn check_range(position: usize, count: usize, len: usize) -> Result<(), Ignored> {
    match position.checked_add(count) {
        Some(end) if end <= len => {
            if count == 0 {
                Err(Ignored::NoChange)
            } else {
                Ok(())
            }
        }
        _ => Err(Ignored::OutOfRange),
    }
}
