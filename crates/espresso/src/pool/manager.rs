//! Fixed-size pool of asynchronous workers for one resource kind.
//!
//! This module defines the [`WorkerPool`] struct, which owns a set of
//! homogeneous workers (for example the two porta-filters of an espresso
//! machine) and exposes a single "submit and await" operation. Callers never
//! see which worker served them.
//!
//! Each worker listens on its own small bounded [`mpsc::Receiver`]. A request
//! goes to whichever worker queue accepts it first: a busy worker's queue
//! fills up and stops accepting, so idle workers naturally take the load.
//! Results come back through a per-request completion slot, never through a
//! shared channel.
//!
//! Shutdown is cooperative and draining: new submissions are refused, worker
//! queues are closed, and every request from a caller admitted before shutdown
//! is still completed before the workers exit.

use super::{
    request::Request,
    worker::{WorkerId, worker_loop},
};
use crate::{
    error::{Error, Result},
    stage::Stage,
};
use core::time::Duration;
use futures::future::{join_all, select_all};
use parking_lot::Mutex;
use std::sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};
use tokio::{
    sync::{Mutex as AsyncMutex, OnceCell, mpsc, mpsc::error::TrySendError},
    task::JoinHandle,
    time::timeout,
};
use tokio_util::sync::CancellationToken;

/// Lifecycle of a [`WorkerPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PoolState {
    /// Submissions are accepted.
    Accepting,
    /// Shutdown has begun: submissions fail with [`Error::PoolClosed`] while
    /// workers drain what was already enqueued.
    ShuttingDown,
    /// Every worker has exited.
    ShutDown,
}

/// Sizing and shutdown behavior of a single pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Number of workers in the pool.
    pub workers: usize,
    /// Capacity of each worker's private queue.
    ///
    /// A capacity of 1 means a worker holds at most one waiting request in
    /// addition to the one it is processing, which keeps dispatch responsive
    /// to which worker is actually free.
    pub queue_capacity: usize,
    /// How long `shutdown` waits for each worker to drain before giving up on
    /// it.
    pub shutdown_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            queue_capacity: 1,
            shutdown_timeout: Duration::from_secs(3),
        }
    }
}

impl PoolConfig {
    pub(crate) fn validate(&self, kind: &'static str) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::InvalidConfig {
                reason: format!("{kind} pool needs at least one worker"),
            });
        }
        if self.queue_capacity == 0 {
            return Err(Error::InvalidConfig {
                reason: format!("{kind} queue capacity must be greater than 0"),
            });
        }
        Ok(())
    }
}

/// Admission state, guarded by a single lock so that the transition out of
/// [`PoolState::Accepting`] is atomic with respect to every submitter.
struct Admission<In, Out> {
    state: PoolState,
    queues: Option<Arc<Vec<mpsc::Sender<Request<In, Out>>>>>,
}

/// A worker task as seen by shutdown.
///
/// The handle stays in the pool until the worker has been waited on, so an
/// interrupted `shutdown` can be resumed by the next call.
enum WorkerSlot {
    Running(JoinHandle<u64>),
    Drained(Result<()>),
}

/// A pool of identical workers servicing one kind of resource.
///
/// Construct with [`WorkerPool::spawn`]; the workers run as Tokio tasks on the
/// current runtime. The pool is `Sync` and is meant to be shared (typically
/// behind an `Arc`) by any number of concurrent callers.
pub struct WorkerPool<In, Out> {
    kind: &'static str,
    admission: Mutex<Admission<In, Out>>,
    workers: AsyncMutex<Vec<(WorkerId, WorkerSlot)>>,
    served: Vec<Arc<AtomicU64>>,
    next_worker: AtomicUsize,
    shutdown_timeout: Duration,
    shutdown_outcome: OnceCell<Result<()>>,
}

impl<In, Out> WorkerPool<In, Out>
where
    In: Send + 'static,
    Out: Send + 'static,
{
    /// Spawns `config.workers` workers that all run `stage`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if the pool would have no workers or
    /// zero-capacity queues.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn spawn<S>(kind: &'static str, config: PoolConfig, stage: S) -> Result<Self>
    where
        S: Stage<In, Out>,
    {
        config.validate(kind)?;

        let stage = Arc::new(stage);
        let mut queues = Vec::with_capacity(config.workers);
        let mut workers = Vec::with_capacity(config.workers);
        let mut served = Vec::with_capacity(config.workers);

        for index in 0..config.workers {
            let id = WorkerId { kind, index };
            let (tx, rx) = mpsc::channel(config.queue_capacity);
            let counter = Arc::new(AtomicU64::new(0));

            let fut = worker_loop(id, rx, Arc::clone(&stage), Arc::clone(&counter));
            #[cfg(feature = "tracing")]
            let fut = {
                use tracing::Instrument;
                fut.instrument(tracing::debug_span!("worker", %id))
            };

            queues.push(tx);
            workers.push((id, WorkerSlot::Running(tokio::spawn(fut))));
            served.push(counter);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Spawned {} {kind} workers", config.workers);

        Ok(Self {
            kind,
            admission: Mutex::new(Admission {
                state: PoolState::Accepting,
                queues: Some(Arc::new(queues)),
            }),
            workers: AsyncMutex::new(workers),
            served,
            next_worker: AtomicUsize::new(0),
            shutdown_timeout: config.shutdown_timeout,
            shutdown_outcome: OnceCell::new(),
        })
    }

    pub const fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn worker_count(&self) -> usize {
        self.served.len()
    }

    pub fn state(&self) -> PoolState {
        self.admission.lock().state
    }

    /// Number of requests each worker has served so far, indexed by worker.
    pub fn served_per_worker(&self) -> Vec<u64> {
        self.served
            .iter()
            .map(|counter| counter.load(Ordering::Relaxed))
            .collect()
    }

    /// Submits `payload` to whichever worker can take it first and waits for
    /// the result.
    ///
    /// # Errors
    ///
    /// - [`Error::PoolClosed`] if shutdown had already begun when this call
    ///   started. This is returned without blocking on any worker. A call
    ///   admitted earlier keeps its place and is served while the pool drains.
    /// - [`Error::StageFailure`] if the stage failed on this payload.
    /// - [`Error::WorkerLost`] if the serving worker died before completing.
    pub async fn submit(&self, payload: In) -> Result<Out> {
        let queues = self.admit()?;
        let (request, completion) = Request::new(payload, self.kind);
        self.dispatch(&queues, request).await?;
        drop(queues);

        completion.wait().await
    }

    /// Like [`WorkerPool::submit`], but abandons the request with
    /// [`Error::Cancelled`] as soon as `cancel` fires, whether the request is
    /// still waiting for a queue or already waiting for its result.
    ///
    /// An abandoned request that already sits in a worker queue is skipped by
    /// that worker.
    pub async fn submit_with_cancel(&self, payload: In, cancel: &CancellationToken) -> Result<Out> {
        let queues = self.admit()?;
        let (request, completion) = Request::new(payload, self.kind);
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Error::Cancelled),
            dispatched = self.dispatch(&queues, request) => dispatched?,
        }
        drop(queues);

        completion.wait_or_cancel(cancel).await
    }

    /// Gracefully shuts down every worker in the pool.
    ///
    /// - Stops accepting requests; later submits fail with
    ///   [`Error::PoolClosed`].
    /// - Closes the worker queues.
    /// - Waits (up to the configured timeout per worker) for each worker to
    ///   finish every request from callers admitted before shutdown, then
    ///   exit.
    ///
    /// Calling this more than once is harmless: every call waits for, and
    /// returns, the outcome of the first one to complete. If a call is dropped
    /// before it completes, the next call resumes waiting on the workers that
    /// are still running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShutdownTimeout`] if a worker failed to drain in time
    /// (it is then aborted), or [`Error::WorkerPanicked`] if a worker task
    /// panicked.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_outcome
            .get_or_init(|| self.drain())
            .await
            .clone()
    }

    /// Hands out the worker queues if, and only if, the pool is accepting.
    fn admit(&self) -> Result<Arc<Vec<mpsc::Sender<Request<In, Out>>>>> {
        let admission = self.admission.lock();
        match (&admission.state, &admission.queues) {
            (PoolState::Accepting, Some(queues)) => Ok(Arc::clone(queues)),
            _ => Err(Error::PoolClosed { kind: self.kind }),
        }
    }

    /// Returns the worker index dispatch starts probing from.
    ///
    /// Rotating the starting point keeps simultaneously idle workers sharing
    /// the load instead of always favouring the first one.
    fn next_worker_index(&self, workers: usize) -> usize {
        self.next_worker.fetch_add(1, Ordering::Relaxed) % workers
    }

    /// Moves `request` into exactly one worker queue.
    ///
    /// Tries every queue once without waiting, then races a reservation on
    /// every queue and sends to the first one that frees up.
    async fn dispatch(
        &self,
        queues: &[mpsc::Sender<Request<In, Out>>],
        request: Request<In, Out>,
    ) -> Result<()> {
        let start = self.next_worker_index(queues.len());
        let order = (0..queues.len()).map(|offset| (start + offset) % queues.len());

        for idx in order.clone() {
            match queues[idx].try_reserve() {
                Ok(permit) => {
                    permit.send(request);
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Request queued on {}-{}", self.kind, idx + 1);
                    return Ok(());
                }
                Err(TrySendError::Full(()) | TrySendError::Closed(())) => {}
            }
        }

        let mut pending: Vec<_> = order
            .map(|idx| Box::pin(async move { (idx, queues[idx].reserve().await) }))
            .collect();

        loop {
            if pending.is_empty() {
                return Err(Error::PoolClosed { kind: self.kind });
            }

            // The caller's clone of the senders keeps every queue open, so
            // this only fails for a worker that is gone.
            let ((_idx, reserved), _, rest) = select_all(pending).await;

            match reserved {
                Ok(permit) => {
                    permit.send(request);
                    #[cfg(feature = "tracing")]
                    tracing::trace!("Request queued on {}-{}", self.kind, _idx + 1);
                    return Ok(());
                }
                // That worker is gone; keep racing the others.
                Err(_) => pending = rest,
            }
        }
    }

    async fn drain(&self) -> Result<()> {
        // === Phase 0: Stop accepting new requests ===
        #[cfg(feature = "tracing")]
        tracing::info!("Shutting down {} pool", self.kind);
        {
            let mut admission = self.admission.lock();
            admission.state = PoolState::ShuttingDown;
            // Dropping the pool's senders closes each queue once the last
            // admitted caller has handed over its request.
            admission.queues = None;
        }

        // === Phase 1: Wait for every worker to drain and exit ===
        let mut workers = self.workers.lock().await;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Waiting up to {:?} per worker for {} {} workers to drain",
            self.shutdown_timeout,
            workers.len(),
            self.kind
        );

        let outcomes = join_all(
            workers
                .iter_mut()
                .map(|(id, slot)| self.drain_worker(*id, slot)),
        )
        .await;
        drop(workers);

        self.admission.lock().state = PoolState::ShutDown;

        #[cfg(feature = "tracing")]
        tracing::info!("{} pool shutdown complete", self.kind);

        outcomes.into_iter().collect()
    }

    /// Waits for one worker to exit, aborting it after the shutdown timeout.
    ///
    /// The outcome is recorded in `slot` only once it is known.
    async fn drain_worker(&self, id: WorkerId, slot: &mut WorkerSlot) -> Result<()> {
        let handle = match slot {
            WorkerSlot::Drained(outcome) => return outcome.clone(),
            WorkerSlot::Running(handle) => handle,
        };

        let outcome = match timeout(self.shutdown_timeout, &mut *handle).await {
            Ok(Ok(_served)) => {
                #[cfg(feature = "tracing")]
                tracing::trace!("Worker {id} drained after serving {_served} requests");
                Ok(())
            }
            Ok(Err(_e)) => {
                #[cfg(feature = "tracing")]
                tracing::error!("Worker {id} failed: {_e}");
                Err(Error::WorkerPanicked { worker: id })
            }
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Worker {id} did not drain in time, aborting");
                handle.abort();
                Err(Error::ShutdownTimeout {
                    worker: id,
                    timeout: self.shutdown_timeout,
                })
            }
        };

        *slot = WorkerSlot::Drained(outcome.clone());
        outcome
    }
}
