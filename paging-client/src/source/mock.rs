//! Mock paging source for testing.
//!
//! Allows scripting page responses and capturing load parameters for
//! verification.

use super::PagingSource;
use async_trait::async_trait;
use pagekit_types::{LoadError, LoadParams, LoadResult};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::{watch, Semaphore};

/// One scripted answer.
#[derive(Debug)]
enum Scripted<K, T> {
    Result(LoadResult<K, T>),
    Panic(String),
}

/// Mock paging source for testing.
///
/// Responses are served in the order they were pushed. Loads can be held
/// open with [`MockPagingSource::hold`] and let through one at a time with
/// [`MockPagingSource::release`].
pub struct MockPagingSource<K, T> {
    inner: Arc<Mutex<MockSourceInner<K, T>>>,
    calls: Arc<watch::Sender<usize>>,
}

struct MockSourceInner<K, T> {
    responses: VecDeque<Scripted<K, T>>,
    recorded: Vec<LoadParams<K>>,
    gate: Option<Arc<Semaphore>>,
}

impl<K, T> Default for MockSourceInner<K, T> {
    fn default() -> Self {
        Self {
            responses: VecDeque::new(),
            recorded: Vec::new(),
            gate: None,
        }
    }
}

impl<K: Clone, T> MockPagingSource<K, T> {
    /// Create a new mock source with no scripted responses.
    pub fn new() -> Self {
        let (calls, _) = watch::channel(0);
        Self {
            inner: Arc::new(Mutex::new(MockSourceInner::default())),
            calls: Arc::new(calls),
        }
    }

    /// Queue a successful page.
    pub fn push_page(&self, data: Vec<T>, next_key: Option<K>) {
        self.push_result(LoadResult::success(data, next_key));
    }

    /// Queue a failed page with the given message.
    pub fn push_failure(&self, error: &str) {
        self.push_result(LoadResult::failure(LoadError::message(error)));
    }

    /// Queue an arbitrary result.
    pub fn push_result(&self, result: LoadResult<K, T>) {
        let mut inner = self.inner.lock().unwrap();
        inner.responses.push_back(Scripted::Result(result));
    }

    /// Cause the matching `load()` call to panic with the given message.
    pub fn push_panic(&self, message: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.responses.push_back(Scripted::Panic(message.to_string()));
    }

    /// Number of scripted responses not served yet.
    pub fn remaining(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.responses.len()
    }

    /// Get the parameters of every `load()` call so far.
    pub fn calls(&self) -> Vec<LoadParams<K>> {
        let inner = self.inner.lock().unwrap();
        inner.recorded.clone()
    }

    /// Get the parameters of the most recent `load()` call.
    pub fn last_call(&self) -> Option<LoadParams<K>> {
        let inner = self.inner.lock().unwrap();
        inner.recorded.last().cloned()
    }

    /// Number of `load()` calls so far.
    pub fn call_count(&self) -> usize {
        *self.calls.borrow()
    }

    /// Wait until at least `count` loads have started.
    pub async fn wait_for_calls(&self, count: usize) {
        let mut rx = self.calls.subscribe();
        // The sender lives as long as `self`
        let _ = rx.wait_for(|calls| *calls >= count).await;
    }

    /// Hold every subsequent `load()` call open until released.
    pub fn hold(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.gate = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let `count` held loads through.
    pub fn release(&self, count: usize) {
        let inner = self.inner.lock().unwrap();
        if let Some(gate) = &inner.gate {
            gate.add_permits(count);
        }
    }

    /// Stop holding loads; loads already waiting are let through.
    pub fn open(&self) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(gate) = inner.gate.take() {
            gate.close();
        }
    }

    /// Clear all state (responses, recorded calls, gate).
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(gate) = inner.gate.take() {
            gate.close();
        }
        *inner = MockSourceInner::default();
        self.calls.send_replace(0);
    }
}

impl<K: Clone, T> Default for MockPagingSource<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> Clone for MockPagingSource<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            calls: Arc::clone(&self.calls),
        }
    }
}

#[async_trait]
impl<K, T> PagingSource<K, T> for MockPagingSource<K, T>
where
    K: Clone + Send + 'static,
    T: Send + 'static,
{
    async fn load(&self, params: LoadParams<K>) -> LoadResult<K, T> {
        let gate = {
            let mut inner = self.inner.lock().unwrap();
            inner.recorded.push(params);
            inner.gate.clone()
        };
        self.calls.send_modify(|calls| *calls += 1);

        if let Some(gate) = gate {
            // A closed gate lets everyone through
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let next = {
            let mut inner = self.inner.lock().unwrap();
            inner.responses.pop_front()
        };
        match next {
            Some(Scripted::Result(result)) => result,
            Some(Scripted::Panic(message)) => panic!("{}", message),
            None => LoadResult::failure(LoadError::message("no scripted response")),
        }
    }
}
