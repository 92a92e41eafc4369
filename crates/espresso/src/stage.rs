//! # Stage Functions
//!
//! A stage is one physical processing step (grinding, extraction, steaming,
//! assembly). Every stage is a pure transformation paired with a simulated
//! latency, which makes processing time injectable: tests run stages with
//! millisecond (or zero) latencies, the shop runs them with the real ones.
//!
//! - [`Stage`] is the seam a [`WorkerPool`](crate::WorkerPool) executes. Each
//!   worker calls it for exactly one request at a time.
//! - [`SimulatedStage`] sleeps for its latency and then maps the input.
//! - [`FnStage`] adapts any async closure, including fallible ones.
//! - [`StageTimings`] holds the latency of every step and provides the stages
//!   the shop uses, in both async and thread-blocking flavours.

use crate::{
    error::StageError,
    menu::{Beverage, CoffeeBean, Espresso, GroundBeans, Milk, Order, SteamedMilk},
};
use core::{future::Future, time::Duration};

/// A unit of work executed by a pool worker.
///
/// Implementations must be shareable across worker tasks. A stage may fail by
/// returning a [`StageError`]; the failure is delivered to the caller that
/// submitted the input and to no one else.
pub trait Stage<In, Out>: Send + Sync + 'static {
    /// Processes a single input.
    fn process(&self, input: In) -> impl Future<Output = Result<Out, StageError>> + Send;
}

/// An infallible stage that sleeps for a fixed latency before mapping its
/// input.
#[derive(Clone, Debug)]
pub struct SimulatedStage<F> {
    label: &'static str,
    latency: Duration,
    map: F,
}

impl<F> SimulatedStage<F> {
    pub const fn new(label: &'static str, latency: Duration, map: F) -> Self {
        Self {
            label,
            latency,
            map,
        }
    }

    pub const fn label(&self) -> &'static str {
        self.label
    }

    pub const fn latency(&self) -> Duration {
        self.latency
    }
}

impl<In, Out, F> Stage<In, Out> for SimulatedStage<F>
where
    In: Send + 'static,
    Out: Send + 'static,
    F: Fn(In) -> Out + Send + Sync + 'static,
{
    fn process(&self, input: In) -> impl Future<Output = Result<Out, StageError>> + Send {
        async move { Ok(simulate(self.label, self.latency, || (self.map)(input)).await) }
    }
}

/// Adapts an async closure into a [`Stage`].
///
/// ```ignore
/// let stage = FnStage::new(|n: u64| async move {
///     if n == 0 {
///         Err(StageError::new("empty portafilter"))
///     } else {
///         Ok(n * 2)
///     }
/// });
/// ```
#[derive(Clone, Debug)]
pub struct FnStage<F>(F);

impl<F> FnStage<F> {
    pub const fn new(f: F) -> Self {
        Self(f)
    }
}

impl<In, Out, F, Fut> Stage<In, Out> for FnStage<F>
where
    F: Fn(In) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Out, StageError>> + Send,
{
    fn process(&self, input: In) -> impl Future<Output = Result<Out, StageError>> + Send {
        (self.0)(input)
    }
}

/// Stage used by porta-filter workers.
pub type PortaFilter = SimulatedStage<fn(GroundBeans) -> Espresso>;

/// Stage used by steam wand workers.
pub type SteamWand = SimulatedStage<fn(Milk) -> SteamedMilk>;

const PULL_LABEL: &str = "pulling espresso shot";
const STEAM_LABEL: &str = "steaming milk";

/// Simulated processing time of each step in making a cappuccino.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageTimings {
    pub grind: Duration,
    pub extract: Duration,
    pub steam: Duration,
    pub assemble: Duration,
}

impl Default for StageTimings {
    fn default() -> Self {
        Self {
            grind: Duration::from_millis(1000),
            extract: Duration::from_millis(600),
            steam: Duration::from_millis(300),
            assemble: Duration::from_millis(100),
        }
    }
}

impl StageTimings {
    /// Every step completes instantly.
    pub const fn instant() -> Self {
        Self {
            grind: Duration::ZERO,
            extract: Duration::ZERO,
            steam: Duration::ZERO,
            assemble: Duration::ZERO,
        }
    }

    pub fn porta_filter(&self) -> PortaFilter {
        SimulatedStage::new(
            PULL_LABEL,
            self.extract,
            Espresso as fn(GroundBeans) -> Espresso,
        )
    }

    pub fn steam_wand(&self) -> SteamWand {
        SimulatedStage::new(
            STEAM_LABEL,
            self.steam,
            SteamedMilk as fn(Milk) -> SteamedMilk,
        )
    }

    pub async fn grind(&self, beans: CoffeeBean) -> GroundBeans {
        simulate("grinding coffee beans", self.grind, || GroundBeans(beans)).await
    }

    /// Pulls a shot without going through a machine (no porta-filter limit).
    pub async fn extract(&self, ground: GroundBeans) -> Espresso {
        simulate(PULL_LABEL, self.extract, || Espresso(ground)).await
    }

    /// Steams milk without going through a machine (no steam wand limit).
    pub async fn steam(&self, milk: Milk) -> SteamedMilk {
        simulate(STEAM_LABEL, self.steam, || SteamedMilk(milk)).await
    }

    pub async fn assemble(
        &self,
        order: Order,
        espresso: Espresso,
        steamed_milk: SteamedMilk,
    ) -> Beverage {
        simulate("making cappuccino", self.assemble, || {
            Beverage::Cappuccino {
                order,
                espresso,
                steamed_milk,
            }
        })
        .await
    }

    pub fn grind_blocking(&self, beans: CoffeeBean) -> GroundBeans {
        simulate_blocking("grinding coffee beans", self.grind, || GroundBeans(beans))
    }

    pub fn extract_blocking(&self, ground: GroundBeans) -> Espresso {
        simulate_blocking(PULL_LABEL, self.extract, || Espresso(ground))
    }

    pub fn steam_blocking(&self, milk: Milk) -> SteamedMilk {
        simulate_blocking(STEAM_LABEL, self.steam, || SteamedMilk(milk))
    }

    pub fn assemble_blocking(
        &self,
        order: Order,
        espresso: Espresso,
        steamed_milk: SteamedMilk,
    ) -> Beverage {
        simulate_blocking("making cappuccino", self.assemble, || {
            Beverage::Cappuccino {
                order,
                espresso,
                steamed_milk,
            }
        })
    }
}

async fn simulate<T>(_label: &'static str, latency: Duration, make: impl FnOnce() -> T) -> T {
    #[cfg(feature = "tracing")]
    tracing::info!("{_label}");
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
    make()
}

fn simulate_blocking<T>(_label: &'static str, latency: Duration, make: impl FnOnce() -> T) -> T {
    #[cfg(feature = "tracing")]
    tracing::info!("{_label}");
    if !latency.is_zero() {
        std::thread::sleep(latency);
    }
    make()
}
