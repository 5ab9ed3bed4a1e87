//! Page key tracking for pagekit.
//!
//! A fetcher session walks a key-cursor source: every page names the key of
//! the page after it, and `None` marks the end. The cursor is session-local:
//! a refresh resets it to the session's initial key.

/// Tracks the key of the next page of one session.
///
/// The tracker maintains:
/// - The initial key (where every refresh starts)
/// - The key the next request will use (`None` once the end is reached)
/// - How many empty pages were skipped in the current load
#[derive(Debug, Clone)]
pub struct KeyCursor<K> {
    /// Key of the first page.
    initial: K,
    /// Key of the next page to request.
    next: Option<K>,
    /// Consecutive empty pages skipped by the current load.
    skipped: u32,
}

impl<K: Clone> KeyCursor<K> {
    /// Create a cursor positioned at the initial key.
    pub fn new(initial: K) -> Self {
        Self {
            next: Some(initial.clone()),
            initial,
            skipped: 0,
        }
    }

    /// Rewind to the initial key. Called on every refresh.
    pub fn reset(&mut self) {
        self.next = Some(self.initial.clone());
        self.skipped = 0;
    }

    /// The key the next page request will use.
    pub fn next_key(&self) -> Option<&K> {
        self.next.as_ref()
    }

    /// The key every refresh starts from.
    pub fn initial_key(&self) -> &K {
        &self.initial
    }

    /// Record the next key reported by a loaded page.
    pub fn advance(&mut self, next: Option<K>) {
        self.next = next;
    }

    /// Check if the source reported its last page.
    pub fn is_exhausted(&self) -> bool {
        self.next.is_none()
    }

    /// Count one skipped empty page and return the running total.
    pub fn record_skip(&mut self) -> u32 {
        self.skipped = self.skipped.saturating_add(1);
        self.skipped
    }

    /// Forget skipped pages once a load settles.
    pub fn clear_skips(&mut self) {
        self.skipped = 0;
    }

    /// Empty pages skipped by the current load.
    pub fn skipped(&self) -> u32 {
        self.skipped
    }
}
