//! Bounded worker pools with first-ready dispatch and draining shutdown.
//!
//! ## Structure
//!
//! - [`manager`] - [`WorkerPool`], admission, dispatch and shutdown.
//! - [`worker`] - the per-worker service loop.
//! - [`request`] - requests and their single-assignment completion slots.

mod manager;
mod request;
mod worker;

pub use manager::{PoolConfig, PoolState, WorkerPool};
pub use worker::WorkerId;

#[cfg(test)]
mod tests;
