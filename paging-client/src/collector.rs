//! Event fusion.
//!
//! [`PagingCollector`] is the one place external code drives. It owns the
//! [`Pager`] and fuses two sources of list mutations into one ordered
//! stream of [`PagingUpdate`]s:
//!
//! - page loads of the current session, applied to the [`ListDiffer`]
//!   before their event is republished
//! - local updates, republished as `ListStateUpdate`
//!
//! Every update waits in a FIFO until everything submitted before it has
//! been delivered, so an event never overtakes an earlier one.
//!
//! # Example
//!
//! ```ignore
//! let differ = ListDiffer::new(EqCallback);
//! let pager = Pager::new(source, 0, PagingConfig::default());
//! let (collector, mut updates) = pager.flow(differ, RenderSignal::new());
//!
//! while let Some(update) = updates.recv().await {
//!     // replay update.changes() on the visual list
//! }
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pagekit_types::{
    ListChange, LoadStates, LoadType, PagingEvent, SessionId, Tagged, UpdateOp, Version, Versioned,
};
use tokio::sync::{mpsc, oneshot, watch};

use crate::differ::{ApplyOutcome, ListDiffer, ListSnapshot, PendingApply};
use crate::error::{DifferError, PagingError};
use crate::fetcher::SessionEvents;
use crate::pager::Pager;
use crate::render::{RenderHints, RenderSignal};

/// One item of the fused stream.
#[derive(Debug, Clone, PartialEq)]
pub enum PagingUpdate<T> {
    /// A republished event and the changes to replay for it.
    ///
    /// `changes` is empty for `LoadStateUpdate`.
    Event(Versioned<PagingEvent<T>>, Vec<ListChange>),
    /// Scroll the view back to the first item.
    ScrollToFirst,
}

impl<T> PagingUpdate<T> {
    /// The republished event, if this is one.
    pub fn event(&self) -> Option<&Versioned<PagingEvent<T>>> {
        match self {
            Self::Event(event, _) => Some(event),
            Self::ScrollToFirst => None,
        }
    }

    /// Changes to replay on the visual list.
    pub fn changes(&self) -> &[ListChange] {
        match self {
            Self::Event(_, changes) => changes,
            Self::ScrollToFirst => &[],
        }
    }

    /// Check if this is a scroll request.
    pub fn is_scroll_to_first(&self) -> bool {
        matches!(self, Self::ScrollToFirst)
    }
}

/// The fused stream. It has exactly one reader.
pub type UpdateStream<T> = mpsc::UnboundedReceiver<PagingUpdate<T>>;

type LocalReply = oneshot::Sender<Result<ApplyOutcome, PagingError>>;

enum Input<T> {
    Refresh,
    Retry,
    Append,
    ItemVisible(usize),
    Local {
        op: UpdateOp<T>,
        reply: Option<LocalReply>,
    },
    Close,
}

/// Handle to the collector actor.
pub struct PagingCollector<T> {
    inbox: mpsc::UnboundedSender<Input<T>>,
    refresh_requests: Arc<AtomicUsize>,
    differ: ListDiffer<T>,
    load_states: watch::Receiver<LoadStates>,
}

impl<T> Clone for PagingCollector<T> {
    fn clone(&self) -> Self {
        Self {
            inbox: self.inbox.clone(),
            refresh_requests: Arc::clone(&self.refresh_requests),
            differ: self.differ.clone(),
            load_states: self.load_states.clone(),
        }
    }
}

impl<T> PagingCollector<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Spawn the collector and start the first session.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<K>(
        mut pager: Pager<K, T>,
        differ: ListDiffer<T>,
        render: RenderSignal,
    ) -> (Self, UpdateStream<T>)
    where
        K: Clone + Send + 'static,
    {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (states_tx, states_rx) = watch::channel(LoadStates::new());
        let refresh_requests = Arc::new(AtomicUsize::new(0));

        let (session, events) = pager.start_session();
        let list_len = differ.snapshot().items.len();
        let actor = Collector {
            pager,
            differ: differ.clone(),
            render: render.subscribe(),
            inbox: inbox_rx,
            refresh_requests: Arc::clone(&refresh_requests),
            out: out_tx,
            load_states: states_tx,
            session,
            events: Some(events),
            pending: VecDeque::new(),
            states: LoadStates::new(),
            last_version: differ.version(),
            list_len,
            deferred: None,
            scroll: Scroll::Idle,
        };
        tokio::spawn(actor.run());

        let handle = Self {
            inbox: inbox_tx,
            refresh_requests,
            differ,
            load_states: states_rx,
        };
        (handle, out_rx)
    }

    /// Replace the session with a new one that starts with a REFRESH.
    ///
    /// Refreshes requested before the collector gets to them are coalesced
    /// into one new session.
    pub fn refresh(&self) -> Result<(), PagingError> {
        self.refresh_requests.fetch_add(1, Ordering::SeqCst);
        self.send(Input::Refresh)
    }

    /// Re-issue the failing load of the current session.
    pub fn retry(&self) -> Result<(), PagingError> {
        self.send(Input::Retry)
    }

    /// Ask for the next page.
    pub fn append(&self) -> Result<(), PagingError> {
        self.send(Input::Append)
    }

    /// Report that the item at `index` became visible.
    ///
    /// Triggers an append when the item is within the configured prefetch
    /// distance of the end of the delivered list.
    pub fn on_item_visible(&self, index: usize) -> Result<(), PagingError> {
        self.send(Input::ItemVisible(index))
    }

    /// Apply a local update and wait for its outcome.
    ///
    /// The outcome is returned once the update's event (if any) has been
    /// delivered to the stream.
    pub async fn apply(&self, op: UpdateOp<T>) -> Result<ApplyOutcome, PagingError> {
        let (reply, rx) = oneshot::channel();
        self.send(Input::Local {
            op,
            reply: Some(reply),
        })?;
        rx.await.map_err(|_| PagingError::Closed)?
    }

    /// Apply a local update without waiting for it.
    pub fn submit(&self, op: UpdateOp<T>) -> Result<(), PagingError> {
        self.send(Input::Local { op, reply: None })
    }

    /// The most recent list, possibly ahead of the delivered stream.
    pub fn snapshot(&self) -> ListSnapshot<T> {
        self.differ.snapshot()
    }

    /// Load states as last delivered.
    pub fn load_states(&self) -> LoadStates {
        self.load_states.borrow().clone()
    }

    /// Stop the collector and its session.
    pub fn close(&self) -> Result<(), PagingError> {
        self.send(Input::Close)
    }

    /// Check if the collector has stopped.
    pub fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }

    fn send(&self, input: Input<T>) -> Result<(), PagingError> {
        self.inbox.send(input).map_err(|_| PagingError::Closed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scroll {
    Idle,
    /// A REFRESH is loading.
    Armed,
    /// Its data was delivered; scroll at the next render-safe point.
    Ready,
}

enum Origin<T> {
    Load {
        session: SessionId,
        data: Arc<Vec<T>>,
        load_type: LoadType,
        states: LoadStates,
    },
    Local {
        op: UpdateOp<T>,
        reply: Option<LocalReply>,
    },
}

/// An output waiting for its turn.
enum Output<T> {
    /// A load state change, delivered as soon as it reaches the front.
    State(LoadType, LoadStates),
    /// A list update waiting for the differ.
    Applying {
        apply: PendingApply,
        origin: Origin<T>,
    },
}

struct Collector<K, T> {
    pager: Pager<K, T>,
    differ: ListDiffer<T>,
    render: watch::Receiver<RenderHints>,
    inbox: mpsc::UnboundedReceiver<Input<T>>,
    refresh_requests: Arc<AtomicUsize>,
    out: mpsc::UnboundedSender<PagingUpdate<T>>,
    load_states: watch::Sender<LoadStates>,
    session: SessionId,
    events: Option<SessionEvents<T>>,
    pending: VecDeque<Output<T>>,
    /// Load states as last delivered.
    states: LoadStates,
    /// Version of the last delivered list mutation.
    last_version: Version,
    /// Length of the list as delivered.
    list_len: usize,
    /// A load state held until the next render-safe point.
    deferred: Option<(LoadType, LoadStates)>,
    scroll: Scroll,
}

impl<K, T> Collector<K, T>
where
    K: Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    async fn run(mut self) {
        tracing::debug!("Collector started with session {}", self.session);

        loop {
            tokio::select! {
                input = self.inbox.recv() => match input {
                    Some(Input::Close) | None => break,
                    Some(input) => self.on_input(input),
                },
                tagged = next_event(&mut self.events) => match tagged {
                    Some(tagged) => self.on_session_event(tagged),
                    None => {
                        tracing::debug!("Session {} ended", self.session);
                        self.events = None;
                    }
                },
                outcome = front_apply(&mut self.pending) => self.on_front_applied(outcome),
                _ = render_safe(&mut self.render), if self.wants_render_safe() => {
                    tokio::task::yield_now().await;
                    self.flush_deferred();
                }
            }

            if self.out.is_closed() {
                tracing::debug!("Update stream dropped");
                break;
            }
        }

        self.pager.close();
        tracing::debug!("Collector stopped at version {}", self.last_version);
    }

    fn on_input(&mut self, input: Input<T>) {
        match input {
            Input::Refresh => {
                if self.refresh_requests.swap(0, Ordering::SeqCst) > 0 {
                    self.start_session();
                }
            }
            Input::Retry => self.pager.retry(),
            Input::Append => self.pager.append(),
            Input::ItemVisible(index) => {
                if self.pager.config().should_append(index, self.list_len) {
                    tracing::trace!("Item {} of {} visible, appending", index, self.list_len);
                    self.pager.append();
                }
            }
            Input::Local { op, reply } => match self.differ.enqueue(op.clone()) {
                Ok(apply) => self.pending.push_back(Output::Applying {
                    apply,
                    origin: Origin::Local { op, reply },
                }),
                Err(e) => {
                    if let Some(reply) = reply {
                        let _ = reply.send(Err(e.into()));
                    }
                }
            },
            Input::Close => {}
        }
    }

    fn start_session(&mut self) {
        let (session, events) = self.pager.start_session();
        tracing::debug!("Refresh: session {} replaces {}", session, self.session);
        self.session = session;
        self.events = Some(events);
        self.deferred = None;
        self.scroll = Scroll::Idle;
    }

    fn on_session_event(&mut self, tagged: Tagged<PagingEvent<T>>) {
        if !tagged.is_from(self.session) {
            tracing::warn!(
                "Dropping event from stale session {} (current {})",
                tagged.session,
                self.session
            );
            return;
        }

        match tagged.item {
            PagingEvent::LoadStateUpdate { load_type, states } => {
                self.pending.push_back(Output::State(load_type, states));
                self.deliver_ready();
            }
            PagingEvent::LoadDataSuccess {
                data,
                load_type,
                states,
            } => {
                let enqueued = match load_type {
                    LoadType::Refresh => self.differ.enqueue(UpdateOp::SubmitList(Arc::clone(&data))),
                    LoadType::Append => self.differ.enqueue_extend(data.as_ref().clone()),
                };
                match enqueued {
                    Ok(apply) => self.pending.push_back(Output::Applying {
                        apply,
                        origin: Origin::Load {
                            session: tagged.session,
                            data,
                            load_type,
                            states,
                        },
                    }),
                    Err(e) => {
                        tracing::warn!("Page not applied: {}", e);
                        self.pending.push_back(Output::State(load_type, states));
                        self.deliver_ready();
                    }
                }
            }
            PagingEvent::ListStateUpdate { op, .. } => {
                tracing::trace!("Ignoring {} from session", op.kind());
            }
        }
    }

    fn on_front_applied(&mut self, outcome: Result<ApplyOutcome, DifferError>) {
        let Some(Output::Applying { origin, .. }) = self.pending.pop_front() else {
            return;
        };

        match origin {
            Origin::Load {
                session,
                data,
                load_type,
                states,
            } => self.on_page_applied(session, data, load_type, states, outcome),
            Origin::Local { op, reply } => {
                let result = match outcome {
                    Ok(ApplyOutcome::Applied { version, changes }) => {
                        let event = PagingEvent::ListStateUpdate {
                            op,
                            states: self.states.clone(),
                        };
                        self.deliver_mutation(version, event, changes.clone());
                        Ok(ApplyOutcome::Applied { version, changes })
                    }
                    Ok(ignored) => Ok(ignored),
                    Err(e) => Err(PagingError::from(e)),
                };
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
        }

        self.deliver_ready();
    }

    fn on_page_applied(
        &mut self,
        session: SessionId,
        data: Arc<Vec<T>>,
        load_type: LoadType,
        states: LoadStates,
        outcome: Result<ApplyOutcome, DifferError>,
    ) {
        let (version, changes) = match outcome {
            Ok(ApplyOutcome::Applied { version, changes }) => (version, changes),
            Ok(ApplyOutcome::Ignored(reason)) => {
                tracing::debug!("{} page left the list unchanged: {}", load_type, reason);
                if self.is_current(session) {
                    self.page_done(load_type);
                    self.deliver_state(load_type, states);
                }
                return;
            }
            Err(DifferError::Cancelled) => {
                tracing::debug!("{} page superseded before it applied", load_type);
                if self.is_current(session) {
                    self.deliver_state(load_type, states);
                }
                return;
            }
            Err(e) => {
                tracing::warn!("{} page failed to apply: {}", load_type, e);
                if self.is_current(session) {
                    self.deliver_state(load_type, states);
                }
                return;
            }
        };

        if version <= self.last_version {
            tracing::warn!(
                "Dropping {} page at version {} (delivered {})",
                load_type,
                version,
                self.last_version
            );
            if self.is_current(session) {
                self.deliver_state(load_type, states);
            }
            return;
        }

        let prev_len = self.list_len;
        let hints = *self.render.borrow();
        let defer = hints.laying_out || (prev_len == 0 && hints.insert_unsafe);

        let event = PagingEvent::LoadDataSuccess {
            data,
            load_type,
            states,
        };
        if defer {
            let Some(op) = event.to_update_op(prev_len) else {
                return;
            };
            tracing::trace!("Deferring {} load state until render-safe", load_type);
            let list_part = PagingEvent::ListStateUpdate {
                op,
                states: self.states.clone(),
            };
            self.deliver_mutation(version, list_part, changes);
            self.deferred = Some((load_type, event.states().clone()));
        } else {
            let states = event.states().clone();
            self.deliver_mutation(version, event, changes);
            self.deferred = None;
            self.set_states(states);
        }
        self.page_done(load_type);
    }

    /// Load states of a replaced session are never published.
    fn is_current(&self, session: SessionId) -> bool {
        if session != self.session {
            tracing::debug!(
                "Not publishing load state of session {} (current {})",
                session,
                self.session
            );
            return false;
        }
        true
    }

    /// A REFRESH page was delivered: an armed scroll fires at the next
    /// render-safe point.
    fn page_done(&mut self, load_type: LoadType) {
        if load_type == LoadType::Refresh && self.scroll == Scroll::Armed {
            self.scroll = Scroll::Ready;
        }
    }

    /// Deliver load states that reached the front of the FIFO.
    fn deliver_ready(&mut self) {
        while let Some(Output::State(..)) = self.pending.front() {
            if let Some(Output::State(load_type, states)) = self.pending.pop_front() {
                self.deliver_state(load_type, states);
            }
        }
    }

    fn deliver_state(&mut self, load_type: LoadType, states: LoadStates) {
        if load_type == LoadType::Refresh {
            if states.refresh.is_loading() {
                self.scroll = Scroll::Armed;
            } else if states.refresh.is_failure() {
                self.scroll = Scroll::Idle;
            }
        }

        if self.deferred.is_some() {
            // Supersedes the held state; delivered at the render-safe point
            self.deferred = Some((load_type, states));
            return;
        }

        self.set_states(states.clone());
        let event = PagingEvent::LoadStateUpdate { load_type, states };
        self.emit(PagingUpdate::Event(
            Versioned::new(self.last_version, event),
            Vec::new(),
        ));
    }

    fn deliver_mutation(&mut self, version: Version, event: PagingEvent<T>, changes: Vec<ListChange>) {
        if version <= self.last_version {
            tracing::warn!(
                "Dropping stale list event at version {} (delivered {})",
                version,
                self.last_version
            );
            return;
        }
        let delta: isize = changes.iter().map(ListChange::len_delta).sum();
        self.list_len = self.list_len.saturating_add_signed(delta);
        self.last_version = version;
        self.emit(PagingUpdate::Event(Versioned::new(version, event), changes));
    }

    fn wants_render_safe(&self) -> bool {
        self.deferred.is_some() || self.scroll == Scroll::Ready
    }

    fn flush_deferred(&mut self) {
        if let Some((load_type, states)) = self.deferred.take() {
            self.deliver_state(load_type, states);
        }
        if self.scroll == Scroll::Ready {
            self.scroll = Scroll::Idle;
            self.emit(PagingUpdate::ScrollToFirst);
        }
    }

    fn set_states(&mut self, states: LoadStates) {
        self.states = states.clone();
        self.load_states.send_replace(states);
    }

    fn emit(&self, update: PagingUpdate<T>) {
        if let PagingUpdate::Event(event, changes) = &update {
            tracing::trace!(
                "Delivering event at version {} ({} changes)",
                event.version,
                changes.len()
            );
        }
        // A dropped stream stops the loop on the next turn
        let _ = self.out.send(update);
    }
}

async fn next_event<T>(events: &mut Option<SessionEvents<T>>) -> Option<Tagged<PagingEvent<T>>> {
    match events {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

async fn front_apply<T>(pending: &mut VecDeque<Output<T>>) -> Result<ApplyOutcome, DifferError> {
    match pending.front_mut() {
        Some(Output::Applying { apply, .. }) => apply.await,
        _ => std::future::pending().await,
    }
}

async fn render_safe(render: &mut watch::Receiver<RenderHints>) {
    // A dropped signal counts as render-safe
    let _ = render.wait_for(RenderHints::is_render_safe).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AppendPrefetch, PagingConfig};
    use crate::differ::IgnoreReason;
    use crate::source::MockPagingSource;
    use pagekit_core::EqCallback;
    use pagekit_types::LoadState;
    use std::time::Duration;

    type Source = MockPagingSource<u32, &'static str>;
    type Updates = UpdateStream<&'static str>;

    fn flow(
        source: &Source,
        config: PagingConfig,
        render: &RenderSignal,
    ) -> (PagingCollector<&'static str>, Updates) {
        let pager = Pager::new(source.clone(), 0, config);
        pager.flow(ListDiffer::new(EqCallback), render.clone())
    }

    fn config() -> PagingConfig {
        PagingConfig::default().with_page_size(2)
    }

    async fn next(updates: &mut Updates) -> PagingUpdate<&'static str> {
        tokio::time::timeout(Duration::from_secs(2), updates.recv())
            .await
            .expect("timed out waiting for update")
            .expect("stream ended")
    }

    async fn assert_quiet(updates: &mut Updates) {
        let waited = tokio::time::timeout(Duration::from_millis(30), updates.recv()).await;
        assert!(waited.is_err(), "unexpected update: {:?}", waited);
    }

    fn state_update(
        version: u64,
        load_type: LoadType,
        states: LoadStates,
    ) -> PagingUpdate<&'static str> {
        PagingUpdate::Event(
            Versioned::new(
                Version::new(version),
                PagingEvent::LoadStateUpdate { load_type, states },
            ),
            vec![],
        )
    }

    fn refresh(state: LoadState) -> LoadStates {
        LoadStates::new().with(LoadType::Refresh, state)
    }

    fn inserted(position: usize, count: usize) -> ListChange {
        ListChange::Inserted { position, count }
    }

    // ===========================================
    // Page loads
    // ===========================================

    #[tokio::test]
    async fn refresh_page_then_scroll_to_first() {
        let source = Source::new();
        source.push_page(vec!["a", "b"], Some(2));
        let render = RenderSignal::new();
        let (collector, mut updates) = flow(&source, config(), &render);

        assert_eq!(
            next(&mut updates).await,
            state_update(0, LoadType::Refresh, refresh(LoadState::Loading))
        );
        let loaded = refresh(LoadState::Success { is_fully: false });
        assert_eq!(
            next(&mut updates).await,
            PagingUpdate::Event(
                Versioned::new(
                    Version::new(1),
                    PagingEvent::LoadDataSuccess {
                        data: Arc::new(vec!["a", "b"]),
                        load_type: LoadType::Refresh,
                        states: loaded.clone(),
                    }
                ),
                vec![inserted(0, 2)],
            )
        );
        assert!(next(&mut updates).await.is_scroll_to_first());

        assert_eq!(collector.load_states(), loaded);
        assert_eq!(*collector.snapshot().items, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn laying_out_defers_load_state() {
        let source = Source::new();
        source.push_page(vec!["a"], None);
        let render = RenderSignal::new();
        render.set_laying_out(true);
        let (_collector, mut updates) = flow(&source, config(), &render);

        let loading = refresh(LoadState::Loading);
        assert_eq!(
            next(&mut updates).await,
            state_update(0, LoadType::Refresh, loading.clone())
        );
        // The list part is delivered at once, with the previous states
        assert_eq!(
            next(&mut updates).await,
            PagingUpdate::Event(
                Versioned::new(
                    Version::new(1),
                    PagingEvent::ListStateUpdate {
                        op: UpdateOp::submit(vec!["a"]),
                        states: loading,
                    }
                ),
                vec![inserted(0, 1)],
            )
        );
        assert_quiet(&mut updates).await;

        render.set_laying_out(false);
        assert_eq!(
            next(&mut updates).await,
            state_update(
                1,
                LoadType::Refresh,
                refresh(LoadState::Success { is_fully: true })
            )
        );
        assert!(next(&mut updates).await.is_scroll_to_first());
    }

    #[tokio::test]
    async fn insert_unsafe_defers_only_into_empty_list() {
        let source = Source::new();
        source.push_page(vec!["a"], Some(1));
        source.push_page(vec!["b"], None);
        let render = RenderSignal::new();
        render.set_insert_unsafe(true);
        let (collector, mut updates) = flow(&source, config(), &render);

        next(&mut updates).await;
        let list_part = next(&mut updates).await;
        assert!(matches!(
            list_part.event().map(|e| &e.item),
            Some(PagingEvent::ListStateUpdate { .. })
        ));
        let loaded = refresh(LoadState::Success { is_fully: false });
        assert_eq!(
            next(&mut updates).await,
            state_update(1, LoadType::Refresh, loaded.clone())
        );
        assert!(next(&mut updates).await.is_scroll_to_first());

        collector.append().unwrap();
        next(&mut updates).await;
        let appended = next(&mut updates).await;
        assert!(matches!(
            appended.event().map(|e| &e.item),
            Some(PagingEvent::LoadDataSuccess {
                load_type: LoadType::Append,
                ..
            })
        ));
        assert_eq!(appended.event().map(|e| e.version), Some(Version::new(2)));
        assert_eq!(appended.changes(), &[inserted(1, 1)]);
    }

    // ===========================================
    // Local updates
    // ===========================================

    #[tokio::test]
    async fn local_update_is_republished() {
        let source = Source::new();
        source.push_page(vec!["a", "b"], None);
        let render = RenderSignal::new();
        let (collector, mut updates) = flow(&source, config(), &render);
        for _ in 0..3 {
            next(&mut updates).await;
        }

        let outcome = collector.apply(UpdateOp::RemoveItems(0, 1)).await.unwrap();
        assert_eq!(outcome.version(), Some(Version::new(2)));
        assert_eq!(
            next(&mut updates).await,
            PagingUpdate::Event(
                Versioned::new(
                    Version::new(2),
                    PagingEvent::ListStateUpdate {
                        op: UpdateOp::RemoveItems(0, 1),
                        states: refresh(LoadState::Success { is_fully: true }),
                    }
                ),
                vec![ListChange::Removed {
                    position: 0,
                    count: 1
                }],
            )
        );
    }

    #[tokio::test]
    async fn ignored_local_update_publishes_nothing() {
        let source = Source::new();
        source.push_page(vec!["a"], None);
        let render = RenderSignal::new();
        let (collector, mut updates) = flow(&source, config(), &render);
        for _ in 0..3 {
            next(&mut updates).await;
        }

        let outcome = collector.apply(UpdateOp::SetItem(9, "x")).await.unwrap();
        assert_eq!(outcome, ApplyOutcome::Ignored(IgnoreReason::OutOfRange));
        assert_quiet(&mut updates).await;
    }

    // ===========================================
    // Controls
    // ===========================================

    #[tokio::test]
    async fn visible_item_near_end_appends() {
        let source = Source::new();
        source.push_page(vec!["a", "b"], Some(2));
        source.push_page(vec!["c"], None);
        let render = RenderSignal::new();
        let config = config().with_append_prefetch(AppendPrefetch::None);
        let (collector, mut updates) = flow(&source, config, &render);
        for _ in 0..3 {
            next(&mut updates).await;
        }

        collector.on_item_visible(0).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(source.call_count(), 1);

        collector.on_item_visible(1).unwrap();
        source.wait_for_calls(2).await;
        next(&mut updates).await;
        let appended = next(&mut updates).await;
        assert_eq!(appended.changes(), &[inserted(2, 1)]);
    }

    #[tokio::test]
    async fn queued_refreshes_are_coalesced() {
        let source = Source::new();
        source.hold();
        let render = RenderSignal::new();
        let (collector, _updates) = flow(&source, config(), &render);
        source.wait_for_calls(1).await;

        collector.refresh().unwrap();
        collector.refresh().unwrap();
        collector.refresh().unwrap();

        source.wait_for_calls(2).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(source.call_count(), 2);
        source.open();
    }

    #[tokio::test]
    async fn close_ends_stream() {
        let source = Source::new();
        source.hold();
        let render = RenderSignal::new();
        let (collector, mut updates) = flow(&source, config(), &render);

        collector.close().unwrap();

        while updates.recv().await.is_some() {}
        assert_eq!(
            collector.apply(UpdateOp::AddItem(0, "x")).await,
            Err(PagingError::Closed)
        );
        source.open();
    }

    // ===========================================
    // Stale sessions and the version guard
    // ===========================================

    /// An actor that is driven by hand instead of running its loop.
    fn actor(source: &Source) -> (Collector<u32, &'static str>, Updates) {
        let mut pager = Pager::new(source.clone(), 0, config());
        let (session, events) = pager.start_session();
        let (_inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (states_tx, _states_rx) = watch::channel(LoadStates::new());
        let actor = Collector {
            pager,
            differ: ListDiffer::new(EqCallback),
            render: RenderSignal::new().subscribe(),
            inbox: inbox_rx,
            refresh_requests: Arc::new(AtomicUsize::new(0)),
            out: out_tx,
            load_states: states_tx,
            session,
            events: Some(events),
            pending: VecDeque::new(),
            states: LoadStates::new(),
            last_version: Version::zero(),
            list_len: 0,
            deferred: None,
            scroll: Scroll::Idle,
        };
        (actor, out_rx)
    }

    fn loaded() -> LoadStates {
        LoadStates::of(LoadState::Success { is_fully: false }, LoadState::Incomplete)
    }

    #[tokio::test]
    async fn replaced_session_outcomes_publish_nothing() {
        let source = Source::new();
        source.hold();
        let (mut actor, mut updates) = actor(&source);
        let replaced = actor.session.next();
        actor.scroll = Scroll::Armed;

        let outcomes = vec![
            Ok(ApplyOutcome::Ignored(IgnoreReason::NoChange)),
            Err(DifferError::Cancelled),
            Err(DifferError::Callback("boom".into())),
            Ok(ApplyOutcome::Applied {
                version: Version::zero(),
                changes: vec![],
            }),
        ];
        for outcome in outcomes {
            actor.on_page_applied(
                replaced,
                Arc::new(vec!["a"]),
                LoadType::Refresh,
                loaded(),
                outcome,
            );
        }

        assert!(updates.try_recv().is_err());
        assert_eq!(actor.states, LoadStates::new());
        assert_eq!(actor.scroll, Scroll::Armed);
        source.open();
    }

    #[tokio::test]
    async fn current_session_ignored_page_publishes_state() {
        let source = Source::new();
        source.hold();
        let (mut actor, mut updates) = actor(&source);
        let session = actor.session;
        actor.scroll = Scroll::Armed;

        actor.on_page_applied(
            session,
            Arc::new(vec![]),
            LoadType::Refresh,
            loaded(),
            Ok(ApplyOutcome::Ignored(IgnoreReason::NoChange)),
        );

        assert_eq!(
            updates.try_recv().unwrap(),
            state_update(0, LoadType::Refresh, loaded())
        );
        assert_eq!(actor.states, loaded());
        assert_eq!(actor.scroll, Scroll::Ready);
        source.open();
    }

    #[tokio::test]
    async fn non_increasing_versions_are_not_delivered() {
        let source = Source::new();
        source.hold();
        let (mut actor, mut updates) = actor(&source);
        actor.last_version = Version::new(3);
        actor.list_len = 2;
        let local = PagingEvent::ListStateUpdate {
            op: UpdateOp::AddItem(0, "x"),
            states: LoadStates::new(),
        };

        actor.deliver_mutation(Version::new(3), local.clone(), vec![inserted(0, 1)]);
        actor.deliver_mutation(Version::new(2), local.clone(), vec![inserted(0, 1)]);
        assert!(updates.try_recv().is_err());
        assert_eq!(actor.list_len, 2);

        actor.deliver_mutation(Version::new(4), local.clone(), vec![inserted(0, 1)]);
        assert_eq!(
            updates.try_recv().unwrap(),
            PagingUpdate::Event(Versioned::new(Version::new(4), local), vec![inserted(0, 1)])
        );
        assert_eq!(actor.list_len, 3);
        assert_eq!(actor.last_version, Version::new(4));
        source.open();
    }

    #[tokio::test]
    async fn stale_page_version_publishes_only_its_state() {
        let source = Source::new();
        source.hold();
        let (mut actor, mut updates) = actor(&source);
        let session = actor.session;
        actor.last_version = Version::new(5);

        actor.on_page_applied(
            session,
            Arc::new(vec!["a"]),
            LoadType::Append,
            loaded(),
            Ok(ApplyOutcome::Applied {
                version: Version::new(5),
                changes: vec![inserted(0, 1)],
            }),
        );

        assert_eq!(
            updates.try_recv().unwrap(),
            state_update(5, LoadType::Append, loaded())
        );
        assert!(updates.try_recv().is_err());
        assert_eq!(actor.list_len, 0);
        source.open();
    }
}
