//! Ordering and identity types for pagekit.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A monotonically increasing list version.
///
/// Each list instance owns one counter. It is bumped exactly once per
/// successfully applied update and never decreases, including across
/// session refreshes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Create a new Version with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Get the numeric value of this Version.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The version of a list that has never been mutated.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Increment the version by one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self.0)
    }
}

/// Identifies one fetcher session of a pager.
///
/// Sessions are numbered from 1 and a new one is started on every refresh.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    /// Create a SessionId with the given value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The first session of a pager.
    pub fn first() -> Self {
        Self(1)
    }

    /// Get the numeric value of this SessionId.
    pub fn value(&self) -> u64 {
        self.0
    }

    /// The id of the session that replaces this one.
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.0)
    }
}
