//! Coordinating dispatch task
//!
//! All pool bookkeeping lives here and is touched only by this task: live
//! workers, the free list, the FIFO queue and the in-flight map. Worker threads
//! never see any of it; they only receive fully formed tasks.

use super::worker::{
    spawn_worker, OutputOf, TaskOf, WorkerEvent, WorkerFactory, WorkerHandle, WorkerId,
};
use super::{Callback, PoolError, PoolStats};
use crate::config::PoolConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Consecutive factory failures tolerated before a slot is given up
pub const MAX_START_ATTEMPTS: u32 = 3;

pub(crate) enum Command<T, O> {
    Submit {
        task: T,
        callback: Callback<O>,
    },
    Stats {
        respond_to: oneshot::Sender<PoolStats>,
    },
    Shutdown {
        respond_to: oneshot::Sender<()>,
    },
}

struct Queued<T, O> {
    task: T,
    callback: Callback<O>,
    attempts: u32,
}

/// Metadata of the task a worker is currently running
struct InFlight<O> {
    callback: Callback<O>,
    attempts: u32,
}

pub(crate) struct Dispatcher<F: WorkerFactory> {
    factory: Arc<F>,
    size: usize,
    crash_retries: u32,

    workers: HashMap<WorkerId, WorkerHandle<TaskOf<F>>>,
    free: VecDeque<WorkerId>,
    queue: VecDeque<Queued<TaskOf<F>, OutputOf<F>>>,
    in_flight: HashMap<WorkerId, InFlight<OutputOf<F>>>,

    next_worker_id: WorkerId,
    start_failures: u32,
    replaced: u64,

    commands: mpsc::UnboundedReceiver<Command<TaskOf<F>, OutputOf<F>>>,
    events_tx: mpsc::UnboundedSender<WorkerEvent<TaskOf<F>, OutputOf<F>>>,
    events_rx: mpsc::UnboundedReceiver<WorkerEvent<TaskOf<F>, OutputOf<F>>>,
}

impl<F: WorkerFactory> Dispatcher<F> {
    pub(crate) fn new(
        config: &PoolConfig,
        factory: Arc<F>,
        commands: mpsc::UnboundedReceiver<Command<TaskOf<F>, OutputOf<F>>>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            factory,
            size: config.effective_workers(),
            crash_retries: config.crash_retries,
            workers: HashMap::new(),
            free: VecDeque::new(),
            queue: VecDeque::new(),
            in_flight: HashMap::new(),
            next_worker_id: 0,
            start_failures: 0,
            replaced: 0,
            commands,
            events_tx,
            events_rx,
        }
    }

    pub(crate) async fn run(mut self) {
        info!(
            "Worker pool started (workers={}, crash_retries={})",
            self.size, self.crash_retries
        );
        for _ in 0..self.size {
            self.start_worker();
        }

        let mut stopping = Vec::new();
        let mut ack = None;
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(Command::Submit { task, callback }) => {
                            self.submit(task, callback);
                        }
                        Some(Command::Stats { respond_to }) => {
                            let _ = respond_to.send(self.stats());
                        }
                        Some(Command::Shutdown { respond_to }) => {
                            stopping = self.shutdown();
                            ack = Some(respond_to);
                            break;
                        }
                        None => {
                            // Every pool handle is gone
                            stopping = self.shutdown();
                            break;
                        }
                    }
                }

                Some(event) = self.events_rx.recv() => {
                    self.handle_event(event);
                }
            }
        }

        // Submissions racing with shutdown still get their callback
        self.commands.close();
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Submit { callback, .. } => callback(Err(PoolError::Shutdown)),
                Command::Stats { respond_to } => {
                    let _ = respond_to.send(self.stats());
                }
                Command::Shutdown { respond_to } => {
                    let _ = respond_to.send(());
                }
            }
        }

        // Releases the factory; idle workers then drop their own state on exit
        let replaced = self.replaced;
        drop(self);
        let _ = tokio::task::spawn_blocking(move || {
            for thread in stopping {
                let _ = thread.join();
            }
        })
        .await;

        info!("Worker pool stopped (replaced {} workers)", replaced);
        if let Some(ack) = ack {
            let _ = ack.send(());
        }
    }

    fn stats(&self) -> PoolStats {
        PoolStats {
            live_workers: self.workers.len(),
            free_workers: self.free.len(),
            queued: self.queue.len(),
            in_flight: self.in_flight.len(),
            replaced: self.replaced,
        }
    }

    fn submit(&mut self, task: TaskOf<F>, callback: Callback<OutputOf<F>>) {
        if self.workers.is_empty() {
            callback(Err(PoolError::NoWorkers));
            return;
        }
        self.queue.push_back(Queued {
            task,
            callback,
            attempts: 0,
        });
        self.dispatch();
    }

    /// Hand queued tasks to free workers, FIFO
    fn dispatch(&mut self) {
        while !self.queue.is_empty() {
            let Some(id) = self.free.pop_front() else {
                break;
            };
            let Some(handle) = self.workers.get(&id) else {
                continue;
            };
            let Some(queued) = self.queue.pop_front() else {
                self.free.push_front(id);
                break;
            };

            match handle.tasks.send(queued.task) {
                Ok(()) => {
                    self.in_flight.insert(
                        id,
                        InFlight {
                            callback: queued.callback,
                            attempts: queued.attempts,
                        },
                    );
                }
                Err(returned) => {
                    // Thread already gone; keep the task at the head and replace the worker
                    warn!("Worker {} unreachable, replacing", id);
                    self.queue.push_front(Queued {
                        task: returned.0,
                        callback: queued.callback,
                        attempts: queued.attempts,
                    });
                    self.workers.remove(&id);
                    self.replaced += 1;
                    self.start_worker();
                }
            }
        }
    }

    fn handle_event(&mut self, event: WorkerEvent<TaskOf<F>, OutputOf<F>>) {
        match event {
            WorkerEvent::Ready { id } => {
                if self.workers.contains_key(&id) {
                    debug!("Worker {} ready", id);
                    self.start_failures = 0;
                    self.free.push_back(id);
                    self.dispatch();
                }
            }

            WorkerEvent::StartFailed { id, reason } => {
                self.workers.remove(&id);
                self.start_failures += 1;
                warn!(
                    "Worker {} failed to start ({}/{}): {}",
                    id, self.start_failures, MAX_START_ATTEMPTS, reason
                );
                if self.start_failures < MAX_START_ATTEMPTS {
                    self.start_worker();
                } else if self.workers.is_empty() {
                    error!("No workers could be started");
                    self.fail_queued(PoolError::NoWorkers);
                }
            }

            WorkerEvent::Done { id, result } => {
                if let Some(in_flight) = self.in_flight.remove(&id) {
                    (in_flight.callback)(result.map_err(PoolError::Task));
                }
                if self.workers.contains_key(&id) {
                    self.free.push_back(id);
                }
                self.dispatch();
            }

            WorkerEvent::Crashed { id, task, reason } => {
                self.workers.remove(&id);
                self.free.retain(|free| *free != id);
                self.replaced += 1;
                warn!("Worker {} crashed, starting a replacement: {}", id, reason);

                if let Some(in_flight) = self.in_flight.remove(&id) {
                    if in_flight.attempts < self.crash_retries {
                        info!(
                            "Requeueing crashed task (attempt {}/{})",
                            in_flight.attempts + 1,
                            self.crash_retries
                        );
                        self.queue.push_front(Queued {
                            task,
                            callback: in_flight.callback,
                            attempts: in_flight.attempts + 1,
                        });
                    } else {
                        (in_flight.callback)(Err(PoolError::WorkerCrashed(reason)));
                    }
                }

                self.start_worker();
                self.dispatch();
            }
        }
    }

    fn start_worker(&mut self) {
        let id = self.next_worker_id;
        self.next_worker_id += 1;

        match spawn_worker(id, Arc::clone(&self.factory), self.events_tx.clone()) {
            Ok(handle) => {
                self.workers.insert(id, handle);
            }
            Err(e) => {
                // Same accounting as a factory failure
                let _ = self.events_tx.send(WorkerEvent::StartFailed {
                    id,
                    reason: format!("thread spawn failed: {}", e),
                });
            }
        }
    }

    fn fail_queued(&mut self, error: PoolError) {
        for queued in self.queue.drain(..) {
            (queued.callback)(Err(error.clone()));
        }
    }

    /// Close every worker channel and fail all pending callbacks. Running
    /// tasks are abandoned, not awaited; the threads of all other workers are
    /// returned so the caller can join them.
    fn shutdown(&mut self) -> Vec<JoinHandle<()>> {
        info!(
            "Shutting down worker pool ({} queued, {} in flight)",
            self.queue.len(),
            self.in_flight.len()
        );
        let mut idle = Vec::new();
        for (id, handle) in self.workers.drain() {
            if !self.in_flight.contains_key(&id) {
                idle.push(handle.thread);
            }
        }
        self.free.clear();
        self.fail_queued(PoolError::Shutdown);
        for (_, in_flight) in self.in_flight.drain() {
            (in_flight.callback)(Err(PoolError::Shutdown));
        }
        idle
    }
}
