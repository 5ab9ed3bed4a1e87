//! Renderer-facing records of applied mutations.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Opaque partial-update payload produced by an item callback.
pub type ChangePayload = Arc<dyn Any + Send + Sync>;

/// One step of the mutation a renderer must replay.
///
/// The changes produced for an applied update, replayed in order against the
/// previous list, yield the new list. Positions refer to the list as it is
/// right before the step.
#[derive(Clone)]
pub enum ListChange {
    /// `count` items were inserted at `position`.
    Inserted {
        /// First inserted position.
        position: usize,
        /// Number of inserted items.
        count: usize,
    },
    /// `count` items were removed at `position`.
    Removed {
        /// First removed position.
        position: usize,
        /// Number of removed items.
        count: usize,
    },
    /// The item at `from` now sits at `to`.
    Moved {
        /// Position before the move.
        from: usize,
        /// Position after the move.
        to: usize,
    },
    /// `count` items starting at `position` have new content.
    Changed {
        /// First changed position.
        position: usize,
        /// Number of changed items.
        count: usize,
        /// Optional partial-update payload.
        payload: Option<ChangePayload>,
    },
}

impl ListChange {
    /// Net effect of this step on the list length.
    pub fn len_delta(&self) -> isize {
        match self {
            Self::Inserted { count, .. } => *count as isize,
            Self::Removed { count, .. } => -(*count as isize),
            Self::Moved { .. } | Self::Changed { .. } => 0,
        }
    }
}

impl fmt::Debug for ListChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inserted { position, count } => {
                write!(f, "Inserted({}, {})", position, count)
            }
            Self::Removed { position, count } => write!(f, "Removed({}, {})", position, count),
            Self::Moved { from, to } => write!(f, "Moved({} -> {})", from, to),
            Self::Changed {
                position,
                count,
                payload,
            } => {
                let marker = if payload.is_some() { " +payload" } else { "" };
                write!(f, "Changed({}, {}{})", position, count, marker)
            }
        }
    }
}

/// Payloads are compared by presence only.
impl PartialEq for ListChange {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Self::Inserted { position: a, count: b },
                Self::Inserted { position: c, count: d },
            ) => a == c && b == d,
            (
                Self::Removed { position: a, count: b },
                Self::Removed { position: c, count: d },
            ) => a == c && b == d,
            (Self::Moved { from: a, to: b }, Self::Moved { from: c, to: d }) => a == c && b == d,
            (
                Self::Changed {
                    position: a,
                    count: b,
                    payload: p,
                },
                Self::Changed {
                    position: c,
                    count: d,
                    payload: q,
                },
            ) => a == c && b == d && p.is_some() == q.is_some(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_delta_per_kind() {
        assert_eq!(ListChange::Inserted { position: 0, count: 3 }.len_delta(), 3);
        assert_eq!(ListChange::Removed { position: 2, count: 2 }.len_delta(), -2);
        assert_eq!(ListChange::Moved { from: 0, to: 4 }.len_delta(), 0);
    }

    #[test]
    fn debug_marks_payload() {
        let change = ListChange::Changed {
            position: 1,
            count: 1,
            payload: Some(Arc::new("title")),
        };
        assert_eq!(format!("{:?}", change), "Changed(1, 1 +payload)");
    }

    #[test]
    fn equality_ignores_payload_contents() {
        let a = ListChange::Changed {
            position: 0,
            count: 1,
            payload: Some(Arc::new(1u8)),
        };
        let b = ListChange::Changed {
            position: 0,
            count: 1,
            payload: Some(Arc::new("other")),
        };
        let c = ListChange::Changed {
            position: 0,
            count: 1,
            payload: None,
        };
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
