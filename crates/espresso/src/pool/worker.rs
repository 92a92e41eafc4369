use super::request::Request;
use crate::stage::Stage;
use core::fmt;
use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::mpsc;

/// Diagnostic identity of a worker, e.g. `porta-filter-1`.
///
/// Callers never address workers directly; the identity only shows up in logs,
/// errors, and the pool's per-worker counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WorkerId {
    pub kind: &'static str,
    pub index: usize,
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind, self.index + 1)
    }
}

/// Worker task responsible for processing [`Request`]s from its private queue.
///
/// The worker runs a single request at a time, to completion, before taking
/// the next one. It exits only once every sender of its queue is gone *and*
/// the queue is empty, so nothing enqueued is ever left behind.
///
/// # Behavior
///
/// - Runs the stage on the request payload and writes the outcome (success or
///   [`Error::StageFailure`](crate::Error::StageFailure)) into the request's
///   completion slot.
/// - Skips requests whose caller has already given up.
/// - Returns the number of requests it served.
pub(crate) async fn worker_loop<In, Out, S>(
    worker: WorkerId,
    mut rx: mpsc::Receiver<Request<In, Out>>,
    stage: Arc<S>,
    served: Arc<AtomicU64>,
) -> u64
where
    In: Send + 'static,
    Out: Send + 'static,
    S: Stage<In, Out>,
{
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker} started");

    let mut count = 0;

    while let Some(Request { payload, completer }) = rx.recv().await {
        if completer.is_abandoned() {
            #[cfg(feature = "tracing")]
            tracing::debug!("Worker {worker} skipping abandoned request");
            continue;
        }

        let result = stage
            .process(payload)
            .await
            .map_err(|e| e.into_error(worker.kind));

        #[cfg(feature = "tracing")]
        if let Err(e) = &result {
            tracing::warn!("Worker {worker} failed request: {e}");
        }

        completer.complete(result);
        served.fetch_add(1, Ordering::Relaxed);
        count += 1;
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker} stopped after serving {count} requests");

    count
}
