//! List mutation commands.

use std::sync::Arc;

/// One atomic list mutation.
///
/// Positional variants that address a position outside the current list
/// are ignored rather than treated as errors.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp<T> {
    /// Replace the whole list, diffing against the current one.
    SubmitList(Arc<Vec<T>>),
    /// Replace the item at a position.
    SetItem(usize, T),
    /// Replace a run of items starting at a position.
    SetItems(usize, Vec<T>),
    /// Insert one item before a position (`len` appends).
    AddItem(usize, T),
    /// Insert items before a position (`len` appends).
    AddItems(usize, Vec<T>),
    /// Remove `count` items starting at a position.
    RemoveItems(usize, usize),
    /// Move the item at `from` so that it ends up at `to`.
    MoveItem(usize, usize),
}

impl<T> UpdateOp<T> {
    /// Convenience constructor for [`UpdateOp::SubmitList`].
    pub fn submit(items: Vec<T>) -> Self {
        Self::SubmitList(Arc::new(items))
    }

    /// Whether this op replaces the whole list.
    pub fn is_submit_list(&self) -> bool {
        matches!(self, Self::SubmitList(_))
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SubmitList(_) => "submit_list",
            Self::SetItem(..) => "set_item",
            Self::SetItems(..) => "set_items",
            Self::AddItem(..) => "add_item",
            Self::AddItems(..) => "add_items",
            Self::RemoveItems(..) => "remove_items",
            Self::MoveItem(..) => "move_item",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_wraps_in_arc() {
        let op = UpdateOp::submit(vec![1, 2, 3]);
        match op {
            UpdateOp::SubmitList(items) => assert_eq!(*items, vec![1, 2, 3]),
            other => panic!("Expected SubmitList, got {:?}", other),
        }
    }

    #[test]
    fn kind_names() {
        assert_eq!(UpdateOp::submit(vec![1]).kind(), "submit_list");
        assert_eq!(UpdateOp::<u8>::RemoveItems(0, 1).kind(), "remove_items");
        assert_eq!(UpdateOp::<u8>::MoveItem(0, 1).kind(), "move_item");
        assert!(UpdateOp::submit(Vec::<u8>::new()).is_submit_list());
        assert!(!UpdateOp::AddItem(0, 1u8).is_submit_list());
    }
}
