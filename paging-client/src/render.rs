//! Render hints reported by the renderer.

use std::sync::Arc;
use tokio::sync::watch;

/// What the renderer is doing right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderHints {
    /// A layout pass is in progress.
    pub laying_out: bool,
    /// The layout cannot take inserts into an empty list together with a
    /// load state change.
    pub insert_unsafe: bool,
}

impl RenderHints {
    /// Whether events may be delivered without deferral.
    pub fn is_render_safe(&self) -> bool {
        !self.laying_out
    }
}

/// Shared handle the renderer uses to report [`RenderHints`].
///
/// Cloning is cheap; every clone reports into the same hints.
#[derive(Debug, Clone)]
pub struct RenderSignal {
    tx: Arc<watch::Sender<RenderHints>>,
}

impl RenderSignal {
    /// Create a signal with both hints off.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(RenderHints::default());
        Self { tx: Arc::new(tx) }
    }

    /// Report whether a layout pass is running.
    pub fn set_laying_out(&self, laying_out: bool) {
        self.tx.send_if_modified(|hints| {
            let changed = hints.laying_out != laying_out;
            hints.laying_out = laying_out;
            changed
        });
    }

    /// Report whether the layout is in insert-unsafe mode.
    pub fn set_insert_unsafe(&self, insert_unsafe: bool) {
        self.tx.send_if_modified(|hints| {
            let changed = hints.insert_unsafe != insert_unsafe;
            hints.insert_unsafe = insert_unsafe;
            changed
        });
    }

    /// Current hints.
    pub fn hints(&self) -> RenderHints {
        *self.tx.borrow()
    }

    /// Watch the hints.
    pub fn subscribe(&self) -> watch::Receiver<RenderHints> {
        self.tx.subscribe()
    }
}

impl Default for RenderSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_render_safe() {
        let signal = RenderSignal::new();
        assert_eq!(signal.hints(), RenderHints::default());
        assert!(signal.hints().is_render_safe());
    }

    #[test]
    fn clones_share_hints() {
        let signal = RenderSignal::new();
        let renderer = signal.clone();

        renderer.set_laying_out(true);
        renderer.set_insert_unsafe(true);

        let hints = signal.hints();
        assert!(hints.laying_out);
        assert!(hints.insert_unsafe);
        assert!(!hints.is_render_safe());
    }

    #[tokio::test]
    async fn subscriber_sees_layout_end() {
        let signal = RenderSignal::new();
        signal.set_laying_out(true);
        let mut rx = signal.subscribe();

        let renderer = signal.clone();
        tokio::spawn(async move { renderer.set_laying_out(false) });

        let hints = rx.wait_for(|h| !h.laying_out).await.unwrap();
        assert!(hints.is_render_safe());
    }
}
