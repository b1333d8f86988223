//! Worker threads
//!
//! Each worker is a dedicated OS thread owning its own state (an archive
//! processor with its own store handle, say). Tasks arrive over an unbounded
//! channel; results, crashes and start failures go back to the dispatcher as
//! [`WorkerEvent`]s.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

pub type WorkerId = u64;

/// What a worker returns when a task does not succeed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkerError {
    /// The task failed; the worker is still healthy
    #[error("{0}")]
    Task(String),
    /// The worker is unusable and must be replaced
    #[error("fatal: {0}")]
    Fatal(String),
}

/// A long-lived task executor
pub trait Worker: Send + 'static {
    type Task: Send + 'static;
    type Output: Send + 'static;

    fn run(&mut self, task: &Self::Task) -> Result<Self::Output, WorkerError>;
}

/// Starts workers; called again for every replacement
pub trait WorkerFactory: Send + Sync + 'static {
    type Worker: Worker;

    fn start(&self, id: WorkerId) -> Result<Self::Worker, WorkerError>;
}

pub(crate) type TaskOf<F> = <<F as WorkerFactory>::Worker as Worker>::Task;
pub(crate) type OutputOf<F> = <<F as WorkerFactory>::Worker as Worker>::Output;

/// Messages from worker threads to the dispatcher
#[derive(Debug)]
pub(crate) enum WorkerEvent<T, O> {
    Ready {
        id: WorkerId,
    },
    StartFailed {
        id: WorkerId,
        reason: String,
    },
    Done {
        id: WorkerId,
        result: Result<O, String>,
    },
    /// The worker thread exits after sending this; the task comes back for a
    /// possible retry
    Crashed {
        id: WorkerId,
        task: T,
        reason: String,
    },
}

/// Dispatcher-side handle of one live worker
pub(crate) struct WorkerHandle<T> {
    pub(crate) tasks: mpsc::UnboundedSender<T>,
    pub(crate) thread: JoinHandle<()>,
}

pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic".to_string()
    }
}

/// Spawn a worker thread. The worker reports [`WorkerEvent::Ready`] once the
/// factory has produced it.
pub(crate) fn spawn_worker<F: WorkerFactory>(
    id: WorkerId,
    factory: Arc<F>,
    events: mpsc::UnboundedSender<WorkerEvent<TaskOf<F>, OutputOf<F>>>,
) -> std::io::Result<WorkerHandle<TaskOf<F>>> {
    let (tasks, mut inbox) = mpsc::unbounded_channel::<TaskOf<F>>();

    let thread = std::thread::Builder::new()
        .name(format!("pool-worker-{}", id))
        .spawn(move || {
            let started = catch_unwind(AssertUnwindSafe(|| factory.start(id)));
            let mut worker = match started {
                Ok(Ok(worker)) => worker,
                Ok(Err(e)) => {
                    let _ = events.send(WorkerEvent::StartFailed {
                        id,
                        reason: e.to_string(),
                    });
                    return;
                }
                Err(panic) => {
                    let _ = events.send(WorkerEvent::StartFailed {
                        id,
                        reason: panic_message(panic.as_ref()),
                    });
                    return;
                }
            };

            if events.send(WorkerEvent::Ready { id }).is_err() {
                return;
            }

            while let Some(task) = inbox.blocking_recv() {
                let outcome = catch_unwind(AssertUnwindSafe(|| worker.run(&task)));
                let event = match outcome {
                    Ok(Ok(output)) => WorkerEvent::Done {
                        id,
                        result: Ok(output),
                    },
                    Ok(Err(WorkerError::Task(reason))) => WorkerEvent::Done {
                        id,
                        result: Err(reason),
                    },
                    Ok(Err(WorkerError::Fatal(reason))) => {
                        let _ = events.send(WorkerEvent::Crashed { id, task, reason });
                        return;
                    }
                    Err(panic) => {
                        let reason = panic_message(panic.as_ref());
                        let _ = events.send(WorkerEvent::Crashed { id, task, reason });
                        return;
                    }
                };
                if events.send(event).is_err() {
                    break;
                }
            }

            debug!("Worker {} stopped", id);
        })?;

    Ok(WorkerHandle { tasks, thread })
}
