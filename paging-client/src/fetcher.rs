//! Fetcher sessions.
//!
//! A session is one task that drives a [`FetchState`] machine against a
//! [`PagingSource`]. It starts with a REFRESH, accepts append and retry
//! commands, and emits [`PagingEvent`]s tagged with its [`SessionId`].
//! Loads run on their own task so a panicking source cannot take the
//! session down.

use std::sync::Arc;

use pagekit_core::{Action, Event, FetchPolicy, FetchState};
use pagekit_types::{LoadError, LoadParams, LoadResult, LoadType, PagingEvent, SessionId, Tagged};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};

use crate::error::panic_message;
use crate::source::PagingSource;

/// Receiving end of a session's events.
pub type SessionEvents<T> = mpsc::UnboundedReceiver<Tagged<PagingEvent<T>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchCommand {
    Append,
    Retry,
}

/// Handle to a running session.
///
/// Dropping the handle aborts the session and any load in flight.
#[derive(Debug)]
pub struct FetcherHandle {
    session: SessionId,
    commands: mpsc::UnboundedSender<FetchCommand>,
    task: JoinHandle<()>,
    closed: bool,
}

impl FetcherHandle {
    /// Ask for the next page. Dropped unless append is allowed.
    pub fn append(&self) {
        self.send(FetchCommand::Append);
    }

    /// Re-issue the failing load, if any.
    pub fn retry(&self) {
        self.send(FetchCommand::Retry);
    }

    /// Stop the session. No further events are emitted.
    pub fn close(&mut self) {
        if !self.closed {
            tracing::debug!("Closing session {}", self.session);
            self.closed = true;
            self.task.abort();
        }
    }

    /// The session's id.
    pub fn session_id(&self) -> SessionId {
        self.session
    }

    /// Check if the session has stopped.
    pub fn is_closed(&self) -> bool {
        self.closed || self.commands.is_closed()
    }

    fn send(&self, command: FetchCommand) {
        if self.closed {
            return;
        }
        if self.commands.send(command).is_err() {
            tracing::debug!("Session {} gone, dropping {:?}", self.session, command);
        }
    }
}

impl Drop for FetcherHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Start a session that begins with a REFRESH from `initial_key`.
///
/// Must be called from within a tokio runtime.
pub fn spawn<K, T>(
    session: SessionId,
    source: Arc<dyn PagingSource<K, T>>,
    initial_key: K,
    policy: FetchPolicy,
) -> (FetcherHandle, SessionEvents<T>)
where
    K: Clone + Send + 'static,
    T: Send + Sync + 'static,
{
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::unbounded_channel();

    let fetcher = Fetcher {
        session,
        source,
        machine: FetchState::new(initial_key, policy),
        commands: command_rx,
        events: event_tx,
        load: None,
        page: None,
    };
    let task = tokio::spawn(fetcher.run());

    let handle = FetcherHandle {
        session,
        commands: command_tx,
        task,
        closed: false,
    };
    (handle, event_rx)
}

/// The load in flight. Aborted when dropped.
struct LoadTask<K, T> {
    load_type: LoadType,
    handle: JoinHandle<LoadResult<K, T>>,
}

impl<K, T> Drop for LoadTask<K, T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Fetcher<K, T> {
    session: SessionId,
    source: Arc<dyn PagingSource<K, T>>,
    machine: FetchState<K>,
    commands: mpsc::UnboundedReceiver<FetchCommand>,
    events: mpsc::UnboundedSender<Tagged<PagingEvent<T>>>,
    load: Option<LoadTask<K, T>>,
    /// Items of the page that just completed, until they are emitted.
    page: Option<Vec<T>>,
}

impl<K, T> Fetcher<K, T>
where
    K: Clone + Send + 'static,
    T: Send + Sync + 'static,
{
    async fn run(mut self) {
        tracing::debug!("Session {} started", self.session);
        self.handle(Event::RefreshRequested).await;

        while !self.events.is_closed() {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(FetchCommand::Append) => self.handle(Event::AppendRequested).await,
                    Some(FetchCommand::Retry) => self.handle(Event::RetryRequested).await,
                    None => break,
                },
                (load_type, joined) = join_load(&mut self.load) => {
                    self.load = None;
                    self.on_load_done(load_type, joined).await;
                }
            }
        }

        tracing::debug!("Session {} stopped", self.session);
    }

    async fn on_load_done(
        &mut self,
        load_type: LoadType,
        joined: Result<LoadResult<K, T>, JoinError>,
    ) {
        let event = match joined {
            Ok(LoadResult::Success { data, next_key }) => {
                tracing::debug!(
                    "Session {}: {} returned {} items (more: {})",
                    self.session,
                    load_type,
                    data.len(),
                    next_key.is_some()
                );
                let is_empty = data.is_empty();
                self.page = Some(data);
                Event::LoadSucceeded {
                    load_type,
                    is_empty,
                    next_key,
                }
            }
            Ok(LoadResult::Failure(error)) => {
                tracing::warn!("Session {}: {} failed: {}", self.session, load_type, error);
                Event::LoadFailed { load_type, error }
            }
            Err(e) if e.is_panic() => {
                let message = panic_message(e);
                tracing::warn!(
                    "Session {}: source panicked during {}: {}",
                    self.session,
                    load_type,
                    message
                );
                Event::LoadFailed {
                    load_type,
                    error: LoadError::SourcePanicked(message),
                }
            }
            // Cancelled loads emit nothing
            Err(_) => return,
        };
        self.handle(event).await;
    }

    async fn handle(&mut self, event: Event<K>) {
        let (machine, actions) = self.machine.clone().on_event(event);
        self.machine = machine;

        for action in actions {
            match action {
                Action::Load(params) => self.start_load(params),
                Action::ReloadAfterYield(params) => {
                    self.page = None;
                    tokio::task::yield_now().await;
                    self.start_load(params);
                }
                Action::EmitLoadState(load_type, states) => {
                    self.emit(PagingEvent::LoadStateUpdate { load_type, states });
                }
                Action::EmitData(load_type, states) => {
                    let data = self.page.take().unwrap_or_default();
                    self.emit(PagingEvent::LoadDataSuccess {
                        data: Arc::new(data),
                        load_type,
                        states,
                    });
                }
            }
        }
    }

    fn start_load(&mut self, params: LoadParams<K>) {
        tracing::debug!(
            "Session {}: loading {} (page size {})",
            self.session,
            params.load_type,
            params.page_size
        );
        let load_type = params.load_type;
        let source = Arc::clone(&self.source);
        let handle = tokio::spawn(async move { source.load(params).await });
        self.load = Some(LoadTask { load_type, handle });
    }

    fn emit(&self, event: PagingEvent<T>) {
        tracing::trace!("Session {}: emitting {:?}", self.session, event.load_type());
        // A closed receiver ends the loop on the next turn
        let _ = self.events.send(Tagged::new(self.session, event));
    }
}

async fn join_load<K, T>(
    load: &mut Option<LoadTask<K, T>>,
) -> (LoadType, Result<LoadResult<K, T>, JoinError>) {
    match load {
        Some(task) => (task.load_type, (&mut task.handle).await),
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockPagingSource;
    use pagekit_types::{LoadState, LoadStates};
    use std::time::Duration;

    type Events = SessionEvents<&'static str>;

    fn start(
        source: &MockPagingSource<u32, &'static str>,
        policy: FetchPolicy,
    ) -> (FetcherHandle, Events) {
        spawn(SessionId::first(), Arc::new(source.clone()), 0, policy)
    }

    fn policy(page_size: usize) -> FetchPolicy {
        FetchPolicy {
            page_size,
            ..FetchPolicy::default()
        }
    }

    async fn next(events: &mut Events) -> PagingEvent<&'static str> {
        tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("timed out waiting for event")
            .expect("session ended")
            .item
    }

    async fn assert_quiet(events: &mut Events) {
        let waited = tokio::time::timeout(Duration::from_millis(30), events.recv()).await;
        assert!(waited.is_err(), "unexpected event: {:?}", waited);
    }

    fn loading(load_type: LoadType, states: LoadStates) -> PagingEvent<&'static str> {
        PagingEvent::LoadStateUpdate { load_type, states }
    }

    fn refreshed(is_fully: bool) -> LoadStates {
        LoadStates::new().with(LoadType::Refresh, LoadState::Success { is_fully })
    }

    // ===========================================
    // Refresh
    // ===========================================

    #[tokio::test]
    async fn session_starts_with_refresh() {
        let source = MockPagingSource::new();
        source.push_page(vec!["a", "b"], Some(2));
        let policy = FetchPolicy {
            initial_page_size: Some(4),
            ..policy(2)
        };

        let (handle, mut events) = start(&source, policy);

        assert_eq!(
            next(&mut events).await,
            loading(
                LoadType::Refresh,
                LoadStates::new().with(LoadType::Refresh, LoadState::Loading)
            )
        );
        assert_eq!(
            next(&mut events).await,
            PagingEvent::LoadDataSuccess {
                data: Arc::new(vec!["a", "b"]),
                load_type: LoadType::Refresh,
                states: refreshed(false),
            }
        );
        assert_eq!(source.calls(), vec![LoadParams::new(LoadType::Refresh, 0, 4)]);
        assert_eq!(handle.session_id(), SessionId::first());
    }

    #[tokio::test]
    async fn events_are_tagged_with_session() {
        let source = MockPagingSource::new();
        source.push_page(vec!["a"], None);
        let session = SessionId::new(9);

        let (_handle, mut events) = spawn(session, Arc::new(source.clone()), 0u32, policy(2));

        let tagged = events.recv().await.unwrap();
        assert!(tagged.is_from(session));
    }

    // ===========================================
    // Append
    // ===========================================

    #[tokio::test]
    async fn append_loads_next_key() {
        let source = MockPagingSource::new();
        source.push_page(vec!["a", "b"], Some(2));
        source.push_page(vec!["c"], None);
        let (handle, mut events) = start(&source, policy(2));
        next(&mut events).await;
        next(&mut events).await;

        handle.append();

        let append_loading = refreshed(false).with(LoadType::Append, LoadState::Loading);
        assert_eq!(
            next(&mut events).await,
            loading(LoadType::Append, append_loading)
        );
        assert_eq!(
            next(&mut events).await,
            PagingEvent::LoadDataSuccess {
                data: Arc::new(vec!["c"]),
                load_type: LoadType::Append,
                states: refreshed(false).with(LoadType::Append, LoadState::Success { is_fully: true }),
            }
        );
        assert_eq!(source.last_call(), Some(LoadParams::new(LoadType::Append, 2, 2)));
    }

    #[tokio::test]
    async fn append_while_loading_is_dropped() {
        let source = MockPagingSource::new();
        source.push_page(vec!["a"], Some(1));
        source.push_page(vec!["b"], Some(2));
        let (handle, mut events) = start(&source, policy(1));
        next(&mut events).await;
        next(&mut events).await;

        source.hold();
        handle.append();
        next(&mut events).await;
        handle.append();
        handle.append();
        assert_quiet(&mut events).await;

        source.release(1);
        assert!(matches!(
            next(&mut events).await,
            PagingEvent::LoadDataSuccess { .. }
        ));
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn append_after_fully_loaded_is_dropped() {
        let source = MockPagingSource::new();
        source.push_page(vec!["a"], None);
        let (handle, mut events) = start(&source, policy(1));
        next(&mut events).await;
        next(&mut events).await;

        handle.append();
        handle.retry();

        assert_quiet(&mut events).await;
        assert_eq!(source.call_count(), 1);
    }

    // ===========================================
    // Failures and retry
    // ===========================================

    #[tokio::test]
    async fn failed_refresh_is_retried_on_request() {
        let source = MockPagingSource::new();
        source.push_failure("offline");
        source.push_page(vec!["a"], None);
        let (handle, mut events) = start(&source, policy(1));
        next(&mut events).await;

        let failed = LoadStates::new().with(
            LoadType::Refresh,
            LoadState::Failure(LoadError::message("offline")),
        );
        assert_eq!(next(&mut events).await, loading(LoadType::Refresh, failed));

        handle.retry();
        next(&mut events).await;
        assert!(matches!(
            next(&mut events).await,
            PagingEvent::LoadDataSuccess {
                load_type: LoadType::Refresh,
                ..
            }
        ));
        assert_eq!(source.call_count(), 2);
    }

    #[tokio::test]
    async fn failed_append_reenters_through_append() {
        let source = MockPagingSource::new();
        source.push_page(vec!["a"], Some(1));
        source.push_failure("offline");
        source.push_page(vec!["b"], None);
        let (handle, mut events) = start(&source, policy(1));
        next(&mut events).await;
        next(&mut events).await;

        handle.append();
        next(&mut events).await;
        let failed = next(&mut events).await;
        assert!(failed.states().append.is_failure());

        handle.append();
        next(&mut events).await;
        assert!(matches!(
            next(&mut events).await,
            PagingEvent::LoadDataSuccess {
                load_type: LoadType::Append,
                ..
            }
        ));
        // The failed key is requested again
        assert_eq!(source.last_call(), Some(LoadParams::new(LoadType::Append, 1, 1)));
    }

    #[tokio::test]
    async fn source_panic_becomes_failure() {
        let source = MockPagingSource::new();
        source.push_panic("source exploded");
        let (_handle, mut events) = start(&source, policy(1));
        next(&mut events).await;

        let event = next(&mut events).await;
        assert_eq!(
            event.states().refresh,
            LoadState::Failure(LoadError::SourcePanicked("source exploded".into()))
        );
    }

    // ===========================================
    // Empty pages
    // ===========================================

    #[tokio::test]
    async fn empty_page_with_next_key_is_skipped() {
        let source = MockPagingSource::new();
        source.push_page(vec![], Some(5));
        source.push_page(vec!["x"], None);
        let (_handle, mut events) = start(&source, policy(1));

        next(&mut events).await;
        assert_eq!(
            next(&mut events).await,
            PagingEvent::LoadDataSuccess {
                data: Arc::new(vec!["x"]),
                load_type: LoadType::Refresh,
                states: refreshed(true),
            }
        );
        assert_eq!(source.last_call(), Some(LoadParams::new(LoadType::Refresh, 5, 1)));
    }

    #[tokio::test]
    async fn empty_page_without_skip_is_invalid() {
        let source = MockPagingSource::new();
        source.push_page(vec![], Some(5));
        let policy = FetchPolicy {
            skip_empty_page_with_next_key: false,
            ..policy(1)
        };
        let (_handle, mut events) = start(&source, policy);
        next(&mut events).await;

        let event = next(&mut events).await;
        assert_eq!(
            event.states().refresh,
            LoadState::Failure(LoadError::InvalidPagingResult)
        );
    }

    #[tokio::test]
    async fn endless_empty_pages_give_up() {
        let source = MockPagingSource::new();
        for key in 1..=3 {
            source.push_page(vec![], Some(key));
        }
        let policy = FetchPolicy {
            max_empty_page_skips: 2,
            ..policy(1)
        };
        let (_handle, mut events) = start(&source, policy);
        next(&mut events).await;

        let event = next(&mut events).await;
        assert_eq!(
            event.states().refresh,
            LoadState::Failure(LoadError::TooManyEmptyPages { limit: 2 })
        );
        assert_eq!(source.call_count(), 3);
    }

    // ===========================================
    // Close
    // ===========================================

    #[tokio::test]
    async fn close_aborts_in_flight_load() {
        let source = MockPagingSource::new();
        source.push_page(vec!["a"], None);
        source.hold();
        let (mut handle, mut events) = start(&source, policy(1));
        next(&mut events).await;
        source.wait_for_calls(1).await;

        handle.close();

        let end = tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .unwrap();
        assert!(end.is_none());
        assert!(handle.is_closed());

        // The aborted load never takes its response
        source.open();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(source.remaining(), 1);
    }
}
