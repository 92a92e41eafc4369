//! Error types for the espresso machine and its worker pools.
//!
//! This module defines the central `Error` enum, which captures every failure
//! a caller of a [`WorkerPool`](crate::WorkerPool) or
//! [`EspressoMachine`](crate::EspressoMachine) can observe. Per-request errors
//! are only ever delivered to the caller that issued the request; shutdown
//! errors are only ever delivered to the caller of `shutdown`.
//!
//! ## Error Cases
//! - `PoolClosed`: A request arrived after shutdown began.
//! - `StageFailure`: The stage function failed while processing the request.
//! - `WorkerLost`: The serving worker went away without completing the request.
//! - `Cancelled`: The caller abandoned the request.
//! - `ShutdownTimeout`: A worker did not drain its queue in time.
//! - `WorkerPanicked`: A worker task panicked.
//! - `InvalidConfig`: The machine configuration was rejected.

use crate::pool::WorkerId;
use core::time::Duration;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the espresso machine.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The pool is shutting down (or already shut down) and accepts no work.
    #[error("{kind} pool is closed")]
    PoolClosed { kind: &'static str },

    /// The stage function failed. Only the caller of the failed request sees
    /// this.
    #[error("{kind} stage failed: {reason}")]
    StageFailure { kind: &'static str, reason: String },

    /// The completion slot was dropped without a result being written.
    #[error("{kind} worker dropped the request without completing it")]
    WorkerLost { kind: &'static str },

    /// The caller cancelled the request before it completed.
    #[error("Request cancelled by caller")]
    Cancelled,

    /// A worker failed to drain its queue within the shutdown timeout.
    #[error("Worker {worker} did not drain within {timeout:?}")]
    ShutdownTimeout { worker: WorkerId, timeout: Duration },

    /// A worker task panicked.
    #[error("Worker {worker} panicked")]
    WorkerPanicked { worker: WorkerId },

    /// The machine configuration was invalid.
    #[error("Invalid config: {reason}")]
    InvalidConfig { reason: String },
}

/// Failure reported by a [`Stage`](crate::Stage) implementation.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
#[error("{0}")]
pub struct StageError(pub String);

impl StageError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    pub(crate) fn into_error(self, kind: &'static str) -> Error {
        Error::StageFailure {
            kind,
            reason: self.0,
        }
    }
}
