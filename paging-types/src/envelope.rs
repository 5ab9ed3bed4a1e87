//! Envelopes that attach ordering metadata to events.

use crate::{SessionId, Version};

/// An item stamped with the list version at the time it was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<E> {
    /// List version after the item was applied.
    pub version: Version,
    /// The wrapped item.
    pub item: E,
}

impl<E> Versioned<E> {
    /// Stamp an item with a version.
    pub fn new(version: Version, item: E) -> Self {
        Self { version, item }
    }

    /// Transform the wrapped item, keeping the version.
    pub fn map<F, U>(self, f: F) -> Versioned<U>
    where
        F: FnOnce(E) -> U,
    {
        Versioned {
            version: self.version,
            item: f(self.item),
        }
    }

    /// Whether this item is strictly newer than `last`.
    pub fn is_newer_than(&self, last: Version) -> bool {
        self.version > last
    }
}

/// An item tagged with the fetcher session that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Tagged<E> {
    /// The producing session.
    pub session: SessionId,
    /// The wrapped item.
    pub item: E,
}

impl<E> Tagged<E> {
    /// Tag an item with its session.
    pub fn new(session: SessionId, item: E) -> Self {
        Self { session, item }
    }

    /// Whether this item belongs to the given session.
    pub fn is_from(&self, session: SessionId) -> bool {
        self.session == session
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn versioned_map_keeps_version() {
        let v = Versioned::new(Version::new(3), 21).map(|x| x * 2);
        assert_eq!(v.version, Version::new(3));
        assert_eq!(v.item, 42);
    }

    #[test]
    fn newer_is_strict() {
        let v = Versioned::new(Version::new(3), ());
        assert!(v.is_newer_than(Version::new(2)));
        assert!(!v.is_newer_than(Version::new(3)));
        assert!(!v.is_newer_than(Version::new(4)));
    }

    #[test]
    fn tagged_matches_session() {
        let tagged = Tagged::new(SessionId::first(), "event");
        assert!(tagged.is_from(SessionId::first()));
        assert!(!tagged.is_from(SessionId::first().next()));
    }
}
