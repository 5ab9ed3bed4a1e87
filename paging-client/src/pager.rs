//! Session factory.
//!
//! A [`Pager`] knows how to start fetcher sessions for one paging source.
//! At most one session is alive: starting a new one closes the previous
//! one first, so none of its events can be delivered afterwards.

use std::sync::Arc;

use pagekit_types::SessionId;

use crate::collector::{PagingCollector, UpdateStream};
use crate::config::PagingConfig;
use crate::differ::ListDiffer;
use crate::fetcher::{self, FetcherHandle, SessionEvents};
use crate::render::RenderSignal;
use crate::source::PagingSource;

/// Starts and owns fetcher sessions.
pub struct Pager<K, T> {
    source: Arc<dyn PagingSource<K, T>>,
    initial_key: K,
    config: PagingConfig,
    session: Option<FetcherHandle>,
    next_session: SessionId,
}

impl<K, T> Pager<K, T>
where
    K: Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Create a pager. No session runs until [`Pager::start_session`].
    pub fn new<S>(source: S, initial_key: K, config: PagingConfig) -> Self
    where
        S: PagingSource<K, T> + 'static,
    {
        Self {
            source: Arc::new(source),
            initial_key,
            config,
            session: None,
            next_session: SessionId::first(),
        }
    }

    /// Close the current session and start a new one with a REFRESH.
    pub fn start_session(&mut self) -> (SessionId, SessionEvents<T>) {
        self.close();

        let session = self.next_session;
        self.next_session = session.next();
        let (handle, events) = fetcher::spawn(
            session,
            Arc::clone(&self.source),
            self.initial_key.clone(),
            self.config.fetch_policy(),
        );
        self.session = Some(handle);
        (session, events)
    }

    /// Ask the current session for the next page.
    pub fn append(&self) {
        if let Some(session) = &self.session {
            session.append();
        }
    }

    /// Ask the current session to re-issue its failing load.
    pub fn retry(&self) {
        if let Some(session) = &self.session {
            session.retry();
        }
    }

    /// Close the current session, if any.
    pub fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }

    /// The current session, if one is running.
    pub fn session_id(&self) -> Option<SessionId> {
        self.session
            .as_ref()
            .filter(|session| !session.is_closed())
            .map(FetcherHandle::session_id)
    }

    /// The configuration sessions run with.
    pub fn config(&self) -> &PagingConfig {
        &self.config
    }

    /// Spawn the collector that fuses this pager's sessions with local
    /// updates to `differ`.
    pub fn flow(
        self,
        differ: ListDiffer<T>,
        render: RenderSignal,
    ) -> (PagingCollector<T>, UpdateStream<T>) {
        PagingCollector::spawn(self, differ, render)
    }
}
