//! Bounded worker pool
//!
//! A fixed number of worker threads fed by one coordinating tokio task.
//!
//! ```text
//!   submit ──▶ ┌────────────────────────────┐ ──task──▶ worker thread 0
//!   stats  ──▶ │ Dispatcher (single task)   │ ──task──▶ worker thread 1
//!   shutdown ▶ │ live / free / queue /      │ ◀─event── ...
//!              │ in_flight: WorkerId → task │
//!              └────────────────────────────┘
//! ```
//!
//! Concurrency is bounded by the worker count, queued tasks run in FIFO order
//! and completion order is unordered. Every submitted task's callback is
//! invoked exactly once. A crashed worker (panic or [`WorkerError::Fatal`]) is
//! replaced from the same factory and its task fails with
//! [`PoolError::WorkerCrashed`] unless `crash_retries` allows a requeue.

mod dispatcher;
pub mod worker;

pub use dispatcher::MAX_START_ATTEMPTS;
pub use worker::{Worker, WorkerError, WorkerFactory, WorkerId};

use crate::config::PoolConfig;
use dispatcher::{Command, Dispatcher};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use worker::{OutputOf, TaskOf};

/// Why a submitted task did not produce an output
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PoolError {
    #[error("Task failed: {0}")]
    Task(String),

    #[error("Worker crashed: {0}")]
    WorkerCrashed(String),

    #[error("Pool is shut down")]
    Shutdown,

    #[error("No workers available")]
    NoWorkers,
}

/// Completion callback; invoked exactly once
pub type Callback<O> = Box<dyn FnOnce(Result<O, PoolError>) + Send + 'static>;

/// Snapshot of the dispatcher's bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Running or starting workers
    pub live_workers: usize,
    pub free_workers: usize,
    pub queued: usize,
    pub in_flight: usize,
    /// Workers replaced after a crash
    pub replaced: u64,
}

/// Awaitable result of [`WorkerPool::submit`]
pub struct PendingTask<O> {
    rx: oneshot::Receiver<Result<O, PoolError>>,
}

impl<O> Future for PendingTask<O> {
    type Output = Result<O, PoolError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.get_mut().rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(PoolError::Shutdown)),
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Handle to a running pool. Cloning shares the same dispatcher.
pub struct WorkerPool<F: WorkerFactory> {
    commands: mpsc::UnboundedSender<Command<TaskOf<F>, OutputOf<F>>>,
    size: usize,
}

impl<F: WorkerFactory> Clone for WorkerPool<F> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            size: self.size,
        }
    }
}

impl<F: WorkerFactory> WorkerPool<F> {
    /// Start the pool; must be called from within a tokio runtime
    pub fn new(config: &PoolConfig, factory: F) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let dispatcher = Dispatcher::new(config, Arc::new(factory), commands_rx);
        tokio::spawn(dispatcher.run());

        Self {
            commands,
            size: config.effective_workers(),
        }
    }

    /// Configured worker count
    pub fn size(&self) -> usize {
        self.size
    }

    /// Submit a task with a completion callback.
    ///
    /// The callback runs on the dispatcher task and should not block. If the
    /// pool is already shut down it runs immediately with [`PoolError::Shutdown`].
    pub fn submit_with<C>(&self, task: TaskOf<F>, callback: C)
    where
        C: FnOnce(Result<OutputOf<F>, PoolError>) + Send + 'static,
    {
        let command = Command::Submit {
            task,
            callback: Box::new(callback),
        };
        if let Err(mpsc::error::SendError(Command::Submit { callback, .. })) =
            self.commands.send(command)
        {
            callback(Err(PoolError::Shutdown));
        }
    }

    /// Submit a task and get a future for its result
    pub fn submit(&self, task: TaskOf<F>) -> PendingTask<OutputOf<F>> {
        let (tx, rx) = oneshot::channel();
        self.submit_with(task, move |result| {
            let _ = tx.send(result);
        });
        PendingTask { rx }
    }

    pub async fn stats(&self) -> PoolStats {
        let (respond_to, rx) = oneshot::channel();
        if self.commands.send(Command::Stats { respond_to }).is_err() {
            return PoolStats::default();
        }
        rx.await.unwrap_or_default()
    }

    /// Stop every worker and fail queued and in-flight tasks with
    /// [`PoolError::Shutdown`]. Idle workers have exited when this returns;
    /// running tasks are not waited for.
    pub async fn shutdown(&self) {
        let (respond_to, rx) = oneshot::channel();
        if self.commands.send(Command::Shutdown { respond_to }).is_ok() {
            let _ = rx.await;
        }
    }
}
