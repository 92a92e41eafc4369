//! The espresso machine: a resource coordinator over two worker pools.
//!
//! An [`EspressoMachine`] has a fixed number of porta-filters (extraction)
//! and steam wands (steaming). Baristas call [`EspressoMachine::pull_espresso_shot`]
//! and [`EspressoMachine::steam_milk`] concurrently; each call is served by
//! exactly one free porta-filter or steam wand, and the result comes back to
//! the barista that asked for it.

use crate::{
    error::{Error, Result},
    menu::{Espresso, GroundBeans, Milk, SteamedMilk},
    pool::{PoolConfig, PoolState, WorkerPool},
    stage::{Stage, StageTimings},
};
use core::time::Duration;
use tokio_util::sync::CancellationToken;

pub const PORTA_FILTER: &str = "porta-filter";
pub const STEAM_WAND: &str = "steam-wand";

/// Sizing of an [`EspressoMachine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MachineConfig {
    pub porta_filters: usize,
    pub steam_wands: usize,
    /// Capacity of each porta-filter's and steam wand's private queue.
    pub queue_capacity: usize,
    /// Per-worker bound on how long shutdown waits for draining.
    pub shutdown_timeout: Duration,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            porta_filters: 2,
            steam_wands: 2,
            queue_capacity: 1,
            shutdown_timeout: Duration::from_secs(3),
        }
    }
}

impl MachineConfig {
    const fn pool(&self, workers: usize) -> PoolConfig {
        PoolConfig {
            workers,
            queue_capacity: self.queue_capacity,
            shutdown_timeout: self.shutdown_timeout,
        }
    }
}

/// A simulated espresso machine with bounded extraction and steaming capacity.
pub struct EspressoMachine {
    porta_filters: WorkerPool<GroundBeans, Espresso>,
    steam_wands: WorkerPool<Milk, SteamedMilk>,
}

impl EspressoMachine {
    /// Builds a machine whose porta-filters run `extraction` and whose steam
    /// wands run `steaming`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfig`] if either kind would have no workers
    /// or the queue capacity is zero.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn new<E, W>(config: MachineConfig, extraction: E, steaming: W) -> Result<Self>
    where
        E: Stage<GroundBeans, Espresso>,
        W: Stage<Milk, SteamedMilk>,
    {
        let porta_filter_pool = config.pool(config.porta_filters);
        let steam_wand_pool = config.pool(config.steam_wands);
        porta_filter_pool.validate(PORTA_FILTER)?;
        steam_wand_pool.validate(STEAM_WAND)?;

        let porta_filters = WorkerPool::spawn(PORTA_FILTER, porta_filter_pool, extraction)?;
        let steam_wands = WorkerPool::spawn(STEAM_WAND, steam_wand_pool, steaming)?;

        #[cfg(feature = "tracing")]
        tracing::info!(
            "Espresso machine ready with {} porta-filters and {} steam wands",
            config.porta_filters,
            config.steam_wands
        );

        Ok(Self {
            porta_filters,
            steam_wands,
        })
    }

    /// Builds a machine running the simulated stages with the given timings.
    ///
    /// # Errors
    ///
    /// See [`EspressoMachine::new`].
    pub fn with_timings(config: MachineConfig, timings: &StageTimings) -> Result<Self> {
        Self::new(config, timings.porta_filter(), timings.steam_wand())
    }

    /// Pulls a shot on the first porta-filter that can take it.
    ///
    /// # Errors
    ///
    /// [`Error::PoolClosed`] once shutdown has begun, or the stage's failure.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub async fn pull_espresso_shot(&self, ground_beans: GroundBeans) -> Result<Espresso> {
        self.porta_filters.submit(ground_beans).await
    }

    /// Steams milk on the first steam wand that can take it.
    ///
    /// # Errors
    ///
    /// [`Error::PoolClosed`] once shutdown has begun, or the stage's failure.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "debug", skip(self)))]
    pub async fn steam_milk(&self, milk: Milk) -> Result<SteamedMilk> {
        self.steam_wands.submit(milk).await
    }

    /// Cancellable form of [`EspressoMachine::pull_espresso_shot`].
    ///
    /// # Errors
    ///
    /// Additionally returns [`Error::Cancelled`] if `cancel` fires first.
    pub async fn pull_espresso_shot_with_cancel(
        &self,
        ground_beans: GroundBeans,
        cancel: &CancellationToken,
    ) -> Result<Espresso> {
        self.porta_filters
            .submit_with_cancel(ground_beans, cancel)
            .await
    }

    /// Cancellable form of [`EspressoMachine::steam_milk`].
    ///
    /// # Errors
    ///
    /// Additionally returns [`Error::Cancelled`] if `cancel` fires first.
    pub async fn steam_milk_with_cancel(
        &self,
        milk: Milk,
        cancel: &CancellationToken,
    ) -> Result<SteamedMilk> {
        self.steam_wands.submit_with_cancel(milk, cancel).await
    }

    pub const fn porta_filters(&self) -> &WorkerPool<GroundBeans, Espresso> {
        &self.porta_filters
    }

    pub const fn steam_wands(&self) -> &WorkerPool<Milk, SteamedMilk> {
        &self.steam_wands
    }

    /// The least advanced lifecycle state across both pools.
    pub fn state(&self) -> PoolState {
        match (self.porta_filters.state(), self.steam_wands.state()) {
            (PoolState::Accepting, _) | (_, PoolState::Accepting) => PoolState::Accepting,
            (PoolState::ShutDown, PoolState::ShutDown) => PoolState::ShutDown,
            _ => PoolState::ShuttingDown,
        }
    }

    /// Shuts both pools down, draining every request already handed to a
    /// porta-filter or steam wand.
    ///
    /// Idempotent; repeated calls return the outcome of the first one.
    ///
    /// # Errors
    ///
    /// Returns the first drain failure ([`Error::ShutdownTimeout`] or
    /// [`Error::WorkerPanicked`]) reported by either pool. Both pools are
    /// always shut down, even if one of them fails.
    pub async fn shutdown(&self) -> Result<()> {
        let (porta_filters, steam_wands) =
            tokio::join!(self.porta_filters.shutdown(), self.steam_wands.shutdown());

        #[cfg(feature = "tracing")]
        tracing::info!("Espresso machine shut down");

        porta_filters.and(steam_wands)
    }
}
