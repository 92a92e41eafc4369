use crate::error::{Error, Result};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

/// A single unit of work travelling from a caller to exactly one worker.
///
/// A request is created immediately before submission, moved into one
/// worker's queue, and consumed when that worker completes it. It is never
/// cloned or resent.
#[derive(Debug)]
pub(crate) struct Request<In, Out> {
    pub(crate) payload: In,
    pub(crate) completer: Completer<Out>,
}

impl<In, Out> Request<In, Out> {
    /// Creates a request and the completion slot its caller will wait on.
    pub(crate) fn new(payload: In, kind: &'static str) -> (Self, Completion<Out>) {
        let (tx, rx) = oneshot::channel();
        let request = Self {
            payload,
            completer: Completer(tx),
        };
        (request, Completion { rx, kind })
    }
}

/// Write half of a completion slot, owned by the serving worker.
///
/// [`Completer::complete`] consumes the completer, so a slot can be written at
/// most once.
#[derive(Debug)]
pub(crate) struct Completer<Out>(oneshot::Sender<Result<Out>>);

impl<Out> Completer<Out> {
    pub(crate) fn complete(self, result: Result<Out>) {
        // The caller may have given up on the request in the meantime; the
        // result is then discarded.
        let _ = self.0.send(result);
    }

    /// Returns `true` if the caller no longer waits for this request.
    pub(crate) fn is_abandoned(&self) -> bool {
        self.0.is_closed()
    }
}

/// Read half of a completion slot, owned by the caller.
#[derive(Debug)]
pub(crate) struct Completion<Out> {
    rx: oneshot::Receiver<Result<Out>>,
    kind: &'static str,
}

impl<Out> Completion<Out> {
    /// Waits until the serving worker writes the result.
    ///
    /// If the completer is dropped without a write (the worker died), this
    /// fails with [`Error::WorkerLost`] instead of hanging.
    pub(crate) async fn wait(self) -> Result<Out> {
        let kind = self.kind;
        self.rx.await.unwrap_or(Err(Error::WorkerLost { kind }))
    }

    /// Like [`Completion::wait`], but gives up with [`Error::Cancelled`] once
    /// `cancel` fires. Giving up closes the slot, so the worker skips the
    /// request if it has not started on it yet.
    pub(crate) async fn wait_or_cancel(self, cancel: &CancellationToken) -> Result<Out> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            result = self.wait() => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completion_receives_the_written_result() {
        let (request, completion) = Request::<u8, u8>::new(7, "test");
        request.completer.complete(Ok(request.payload * 6));

        assert_eq!(completion.wait().await, Ok(42));
    }

    #[tokio::test]
    async fn dropped_completer_fails_loudly() {
        let (request, completion) = Request::<u8, u8>::new(7, "test");
        drop(request);

        assert_eq!(
            completion.wait().await,
            Err(Error::WorkerLost { kind: "test" })
        );
    }

    #[tokio::test]
    async fn cancelled_wait_abandons_the_request() {
        let (request, completion) = Request::<u8, u8>::new(7, "test");
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert_eq!(completion.wait_or_cancel(&cancel).await, Err(Error::Cancelled));
        assert!(request.completer.is_abandoned());
    }
}
