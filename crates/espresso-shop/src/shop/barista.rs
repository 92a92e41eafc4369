//! The steps a barista takes to turn one order into one beverage.
//!
//! Grinding and assembling happen at the barista's own station. Extraction and
//! steaming either go through a shared [`EspressoMachine`] or, when the shop
//! has no machine limit, run directly with the configured latency.

use espresso::{Beverage, EspressoMachine, Order, StageTimings};

/// Brews `order` without a machine: every step runs on the caller's thread.
pub fn brew_blocking(order: Order, timings: &StageTimings) -> Beverage {
    tracing::info!("Processing order: {order}");
    let ground = timings.grind_blocking(order.beans());
    let espresso = timings.extract_blocking(ground);
    let steamed_milk = timings.steam_blocking(order.milk());
    timings.assemble_blocking(order, espresso, steamed_milk)
}

/// Brews `order` as a task, with unlimited extraction and steaming capacity.
pub async fn brew(order: Order, timings: &StageTimings) -> Beverage {
    tracing::info!("Processing order: {order}");
    let ground = timings.grind(order.beans()).await;
    let espresso = timings.extract(ground).await;
    let steamed_milk = timings.steam(order.milk()).await;
    timings.assemble(order, espresso, steamed_milk).await
}

/// Brews `order` on a shared machine, waiting for a free porta-filter and
/// then a free steam wand.
///
/// # Errors
///
/// Propagates the machine's error if it is shutting down or a unit fails.
pub async fn brew_on_machine(
    order: Order,
    machine: &EspressoMachine,
    timings: &StageTimings,
) -> espresso::Result<Beverage> {
    tracing::info!("Processing order: {order}");
    let ground = timings.grind(order.beans()).await;
    let espresso = machine.pull_espresso_shot(ground).await?;
    let steamed_milk = machine.steam_milk(order.milk()).await?;
    Ok(timings.assemble(order, espresso, steamed_milk).await)
}
