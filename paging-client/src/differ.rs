//! The list differ: the single owner of the current list.
//!
//! [`ListDiffer`] is a cheap handle to an actor task. The actor applies
//! updates strictly in submission order. Positional updates apply at once;
//! a `SubmitList` that needs a real diff runs [`pagekit_core::diff`] on the
//! blocking pool while later positional updates wait in a FIFO.
//!
//! Readers never see a list that is being diffed: after every version bump
//! the actor publishes an immutable [`ListSnapshot`].

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use pagekit_core::{diff, DiffCancelled, ItemCallback, ListState, OpBuffer};
use pagekit_types::{ListChange, UpdateOp, Version};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};

use crate::error::{panic_message, DifferError};

pub use pagekit_core::Ignored as IgnoreReason;

/// Updates that may wait behind one in-flight diff.
const MAX_PENDING: usize = 4096;

/// An immutable view of the list at one version.
#[derive(Debug)]
pub struct ListSnapshot<T> {
    /// The items.
    pub items: Arc<Vec<T>>,
    /// The version the items belong to.
    pub version: Version,
}

impl<T> Clone for ListSnapshot<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
            version: self.version,
        }
    }
}

/// What became of one update.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// The list changed; `changes` turn the previous list into the new one.
    Applied {
        /// Version of the list after the update.
        version: Version,
        /// Changes a renderer must replay.
        changes: Vec<ListChange>,
    },
    /// The list was left untouched.
    Ignored(IgnoreReason),
}

impl ApplyOutcome {
    /// Check if the update changed the list.
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }

    /// Version after the update, if it applied.
    pub fn version(&self) -> Option<Version> {
        match self {
            Self::Applied { version, .. } => Some(*version),
            Self::Ignored(_) => None,
        }
    }
}

type Reply = oneshot::Sender<Result<ApplyOutcome, DifferError>>;

/// An update as submitted.
enum Request<T> {
    Op(UpdateOp<T>),
    /// Append at whatever the end is when the update is applied.
    Extend(Vec<T>),
}

impl<T> Request<T> {
    fn resolve(self, len: usize) -> UpdateOp<T> {
        match self {
            Self::Op(op) => op,
            Self::Extend(items) => UpdateOp::AddItems(len, items),
        }
    }
}

struct Command<T> {
    request: Request<T>,
    reply: Option<Reply>,
}

/// Future returned by [`ListDiffer::enqueue`].
///
/// The update's place in the order is fixed when it is enqueued, whether or
/// not this future is polled.
#[derive(Debug)]
pub struct PendingApply {
    rx: oneshot::Receiver<Result<ApplyOutcome, DifferError>>,
}

impl Future for PendingApply {
    type Output = Result<ApplyOutcome, DifferError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or(Err(DifferError::Closed)))
    }
}

/// Handle to the list differ actor.
pub struct ListDiffer<T> {
    tx: mpsc::UnboundedSender<Command<T>>,
    snapshot: watch::Receiver<ListSnapshot<T>>,
}

impl<T> Clone for ListDiffer<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            snapshot: self.snapshot.clone(),
        }
    }
}

impl<T> ListDiffer<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Spawn a differ over an empty list.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<C>(callback: C) -> Self
    where
        C: ItemCallback<T> + 'static,
    {
        Self::with_items(Vec::new(), callback)
    }

    /// Spawn a differ starting with `items` at version zero.
    pub fn with_items<C>(items: Vec<T>, callback: C) -> Self
    where
        C: ItemCallback<T> + 'static,
    {
        let list = ListState::with_items(items);
        let (snapshot_tx, snapshot_rx) = watch::channel(ListSnapshot {
            items: Arc::clone(list.items()),
            version: list.version(),
        });
        let (tx, rx) = mpsc::unbounded_channel();

        let actor = DifferActor {
            rx,
            list,
            callback: Arc::new(callback),
            queue: OpBuffer::new(MAX_PENDING),
            job: None,
            snapshot: snapshot_tx,
        };
        tokio::spawn(actor.run());

        Self {
            tx,
            snapshot: snapshot_rx,
        }
    }

    /// Apply an update and wait until it is applied or discarded.
    pub async fn apply(&self, op: UpdateOp<T>) -> Result<ApplyOutcome, DifferError> {
        self.enqueue(op)?.await
    }

    /// Apply an update without waiting for it.
    pub fn submit(&self, op: UpdateOp<T>) -> Result<(), DifferError> {
        self.send(Request::Op(op), None)
    }

    /// Enqueue an update and return a future for its outcome.
    pub fn enqueue(&self, op: UpdateOp<T>) -> Result<PendingApply, DifferError> {
        self.enqueue_request(Request::Op(op))
    }

    /// Enqueue an append of `items` at the end of the list as it is when the
    /// update is applied.
    pub fn enqueue_extend(&self, items: Vec<T>) -> Result<PendingApply, DifferError> {
        self.enqueue_request(Request::Extend(items))
    }

    /// The most recently published list.
    pub fn snapshot(&self) -> ListSnapshot<T> {
        self.snapshot.borrow().clone()
    }

    /// Items of the most recently published list.
    pub fn current_list(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.snapshot.borrow().items)
    }

    /// Version of the most recently published list.
    pub fn version(&self) -> Version {
        self.snapshot.borrow().version
    }

    /// Watch published snapshots.
    pub fn subscribe(&self) -> watch::Receiver<ListSnapshot<T>> {
        self.snapshot.clone()
    }

    /// Check if the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn enqueue_request(&self, request: Request<T>) -> Result<PendingApply, DifferError> {
        let (reply, rx) = oneshot::channel();
        self.send(request, Some(reply))?;
        Ok(PendingApply { rx })
    }

    fn send(&self, request: Request<T>, reply: Option<Reply>) -> Result<(), DifferError> {
        self.tx
            .send(Command { request, reply })
            .map_err(|_| DifferError::Closed)
    }
}

/// The one diff allowed in flight.
struct DiffJob<T> {
    handle: JoinHandle<Result<Vec<ListChange>, DiffCancelled>>,
    cancel: Arc<AtomicBool>,
    target: Arc<Vec<T>>,
    reply: Option<Reply>,
}

impl<T> DiffJob<T> {
    fn abort(self) {
        self.cancel.store(true, Ordering::Relaxed);
        self.handle.abort();
        respond(self.reply, Err(DifferError::Cancelled));
    }
}

struct DifferActor<T> {
    rx: mpsc::UnboundedReceiver<Command<T>>,
    list: ListState<T>,
    callback: Arc<dyn ItemCallback<T>>,
    queue: OpBuffer<Command<T>>,
    job: Option<DiffJob<T>>,
    snapshot: watch::Sender<ListSnapshot<T>>,
}

impl<T> DifferActor<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.rx.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },
                joined = join_job(&mut self.job) => self.on_diff_done(joined),
            }
        }

        if let Some(job) = self.job.take() {
            job.abort();
        }
        tracing::debug!("List differ stopped at version {}", self.list.version());
    }

    fn on_command(&mut self, command: Command<T>) {
        let Some(job) = &self.job else {
            self.start(command);
            return;
        };

        let supersedes = match &command.request {
            Request::Op(UpdateOp::SubmitList(items)) => !Arc::ptr_eq(items, &job.target),
            _ => false,
        };
        if supersedes {
            self.cancel_pending();
            self.start(command);
            return;
        }

        if self.queue.is_full() {
            let capacity = self.queue.capacity();
            tracing::warn!("Update rejected: {} updates already pending", capacity);
            respond(command.reply, Err(DifferError::Backlog(capacity)));
            return;
        }
        if let Err(e) = self.queue.enqueue(command) {
            tracing::warn!("Update dropped: {}", e);
        }
    }

    /// Cancel the in-flight diff and everything queued behind it.
    fn cancel_pending(&mut self) {
        if let Some(job) = self.job.take() {
            tracing::debug!("Cancelling in-flight diff");
            job.abort();
        }
        let discarded = self.queue.discard_all();
        if !discarded.is_empty() {
            tracing::debug!("Discarded {} queued updates", discarded.len());
        }
        for command in discarded {
            respond(command.reply, Err(DifferError::Cancelled));
        }
    }

    fn start(&mut self, command: Command<T>) {
        let op = command.request.resolve(self.list.len());

        if self.list.needs_diff(&op) {
            if let UpdateOp::SubmitList(target) = op {
                self.spawn_diff(target, command.reply);
            }
            return;
        }

        let kind = op.kind();
        tracing::trace!("Applying {} at version {}", kind, self.list.version());
        let outcome = match self.list.apply(op) {
            Ok(changes) => {
                self.publish();
                ApplyOutcome::Applied {
                    version: self.list.version(),
                    changes,
                }
            }
            Err(reason) => {
                if reason == IgnoreReason::OutOfRange {
                    tracing::warn!(
                        "Ignoring {} outside list of {} items",
                        kind,
                        self.list.len()
                    );
                }
                ApplyOutcome::Ignored(reason)
            }
        };
        respond(command.reply, Ok(outcome));
    }

    fn spawn_diff(&mut self, target: Arc<Vec<T>>, reply: Option<Reply>) {
        tracing::debug!(
            "Diffing {} -> {} items at version {}",
            self.list.len(),
            target.len(),
            self.list.version()
        );
        let cancel = Arc::new(AtomicBool::new(false));
        let old = Arc::clone(self.list.items());
        let new = Arc::clone(&target);
        let callback = Arc::clone(&self.callback);
        let flag = Arc::clone(&cancel);

        let handle = tokio::task::spawn_blocking(move || diff(&old, &new, callback.as_ref(), &flag));

        self.job = Some(DiffJob {
            handle,
            cancel,
            target,
            reply,
        });
    }

    fn on_diff_done(&mut self, joined: Result<Result<Vec<ListChange>, DiffCancelled>, JoinError>) {
        let Some(job) = self.job.take() else {
            return;
        };

        let result = match joined {
            Ok(Ok(changes)) => {
                let changes = self.list.commit(job.target, changes);
                self.publish();
                tracing::debug!(
                    "Diff applied: {} changes, version {}",
                    changes.len(),
                    self.list.version()
                );
                Ok(ApplyOutcome::Applied {
                    version: self.list.version(),
                    changes,
                })
            }
            Ok(Err(DiffCancelled)) => Err(DifferError::Cancelled),
            Err(e) if e.is_panic() => {
                let message = panic_message(e);
                tracing::warn!("Item callback panicked during diff: {}", message);
                Err(DifferError::Callback(message))
            }
            Err(_) => Err(DifferError::Cancelled),
        };
        respond(job.reply, result);

        self.drain();
    }

    /// Apply queued updates until the queue is empty or a diff starts.
    fn drain(&mut self) {
        while self.job.is_none() {
            match self.queue.dequeue() {
                Some(command) => self.start(command),
                None => break,
            }
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(ListSnapshot {
            items: Arc::clone(self.list.items()),
            version: self.list.version(),
        });
    }
}

async fn join_job<T>(
    job: &mut Option<DiffJob<T>>,
) -> Result<Result<Vec<ListChange>, DiffCancelled>, JoinError> {
    match job {
        Some(job) => (&mut job.handle).await,
        None => std::future::pending().await,
    }
}

fn respond(reply: Option<Reply>, result: Result<ApplyOutcome, DifferError>) {
    if let Some(reply) = reply {
        // The waiter may have gone away
        let _ = reply.send(result);
    }
}
