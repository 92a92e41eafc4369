//! The ways a shop can work through a rush of orders.
//!
//! Every strategy serves each order exactly once and returns the served
//! beverages in the order they left the counter.

use crate::shop::{
    barista,
    config::{ShopConfig, Strategy},
};
use espresso::{Beverage, EspressoMachine, MachineConfig, Order, StageTimings};
use futures::{
    StreamExt, TryStreamExt,
    future::join_all,
    stream::{self, BoxStream},
};
use std::sync::Arc;
use tokio::{
    sync::{Mutex, mpsc},
    task,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, info_span};

/// Orders waiting at the counter, shared by every barista.
type OrderQueue = Arc<Mutex<ReceiverStream<Order>>>;

/// Runs the configured rush with the configured strategy.
///
/// # Errors
///
/// Fails if a barista thread or task panics, if the espresso machine cannot be
/// built, or if the machine reports an error while brewing or draining.
pub async fn run(config: &ShopConfig) -> anyhow::Result<Vec<Beverage>> {
    let orders = config.orders.clone();
    let timings = config.timings;

    match config.strategy {
        Strategy::Sequential => sequential(orders, timings).await,
        Strategy::Threaded => threaded(orders, config.baristas, timings).await,
        Strategy::Tasks => tasks(orders, config.baristas, timings).await,
        Strategy::Machine => machine(orders, config.baristas, config.machine, timings).await,
        Strategy::Streams => streams(orders, config.baristas, config.machine, timings).await,
    }
}

/// A single barista on a single thread, blocking on every step.
pub async fn sequential(
    orders: Vec<Order>,
    timings: StageTimings,
) -> anyhow::Result<Vec<Beverage>> {
    let beverages = task::spawn_blocking(move || {
        let _span = info_span!("barista", id = 1).entered();
        orders
            .into_iter()
            .map(|order| serve(barista::brew_blocking(order, &timings)))
            .collect()
    })
    .await?;
    Ok(beverages)
}

/// `baristas` blocking threads, each handed every `baristas`-th order up front.
pub async fn threaded(
    orders: Vec<Order>,
    baristas: usize,
    timings: StageTimings,
) -> anyhow::Result<Vec<Beverage>> {
    let mut shares = vec![Vec::<Order>::new(); baristas];
    for (i, order) in orders.into_iter().enumerate() {
        shares[i % baristas].push(order);
    }

    let handles = shares.into_iter().enumerate().map(|(i, share)| {
        task::spawn_blocking(move || {
            let _span = info_span!("barista", id = i + 1).entered();
            share
                .into_iter()
                .map(|order| serve(barista::brew_blocking(order, &timings)))
                .collect::<Vec<_>>()
        })
    });

    let mut beverages = Vec::new();
    for served in join_all(handles).await {
        beverages.extend(served?);
    }
    Ok(beverages)
}

/// `baristas` tasks taking orders from a shared counter, with no limit on
/// extraction or steaming.
pub async fn tasks(
    orders: Vec<Order>,
    baristas: usize,
    timings: StageTimings,
) -> anyhow::Result<Vec<Beverage>> {
    let queue = open_counter(orders, baristas);

    let handles = (1..=baristas).map(|id| {
        let queue = Arc::clone(&queue);
        tokio::spawn(
            async move {
                let mut served = Vec::new();
                while let Some(order) = next_order(&queue).await {
                    served.push(serve(barista::brew(order, &timings).await));
                }
                served
            }
            .instrument(info_span!("barista", id)),
        )
    });

    let mut beverages = Vec::new();
    for served in join_all(handles).await {
        beverages.extend(served?);
    }
    Ok(beverages)
}

/// `baristas` tasks taking orders from a shared counter and sharing one
/// espresso machine. The machine is drained once the counter is empty.
pub async fn machine(
    orders: Vec<Order>,
    baristas: usize,
    config: MachineConfig,
    timings: StageTimings,
) -> anyhow::Result<Vec<Beverage>> {
    let machine = Arc::new(EspressoMachine::with_timings(config, &timings)?);
    let queue = open_counter(orders, baristas);

    let handles = (1..=baristas).map(|id| {
        let queue = Arc::clone(&queue);
        let machine = Arc::clone(&machine);
        tokio::spawn(
            async move {
                let mut served = Vec::new();
                while let Some(order) = next_order(&queue).await {
                    let beverage = barista::brew_on_machine(order, &machine, &timings).await?;
                    served.push(serve(beverage));
                }
                Ok::<_, espresso::Error>(served)
            }
            .instrument(info_span!("barista", id)),
        )
    });
    let outcomes = join_all(handles).await;

    machine.shutdown().await?;

    let mut beverages = Vec::new();
    for served in outcomes {
        beverages.extend(served??);
    }
    Ok(beverages)
}

/// One stream of brewed orders per barista, merged as they are served.
///
/// Each lane pulls its next order from the shared counter only after its
/// previous beverage is done, so at most `baristas` orders are in flight.
pub async fn streams(
    orders: Vec<Order>,
    baristas: usize,
    config: MachineConfig,
    timings: StageTimings,
) -> anyhow::Result<Vec<Beverage>> {
    let machine = Arc::new(EspressoMachine::with_timings(config, &timings)?);
    let queue = open_counter(orders, baristas);

    let lanes = (1..=baristas).map(|id| barista_lane(id, &queue, &machine, timings));
    let outcome = stream::select_all(lanes)
        .map_ok(serve)
        .try_collect::<Vec<_>>()
        .await;

    machine.shutdown().await?;
    Ok(outcome?)
}

fn barista_lane(
    id: usize,
    queue: &OrderQueue,
    machine: &Arc<EspressoMachine>,
    timings: StageTimings,
) -> BoxStream<'static, espresso::Result<Beverage>> {
    let machine = Arc::clone(machine);
    stream::unfold(Arc::clone(queue), |queue| async move {
        let order = next_order(&queue).await?;
        Some((order, queue))
    })
    .then(move |order| {
        let machine = Arc::clone(&machine);
        async move { barista::brew_on_machine(order, &machine, &timings).await }
            .instrument(info_span!("barista", id))
    })
    .boxed()
}

/// Spawns a cashier feeding `orders` into a queue that holds at most
/// `baristas` waiting orders.
fn open_counter(orders: Vec<Order>, baristas: usize) -> OrderQueue {
    let (tx, rx) = mpsc::channel(baristas);
    tokio::spawn(
        async move {
            for order in orders {
                tracing::info!("Taking order: {order}");
                if tx.send(order).await.is_err() {
                    tracing::warn!("Counter closed with orders still waiting");
                    break;
                }
            }
        }
        .instrument(info_span!("cashier")),
    );
    Arc::new(Mutex::new(ReceiverStream::new(rx)))
}

async fn next_order(queue: &OrderQueue) -> Option<Order> {
    queue.lock().await.next().await
}

fn serve(beverage: Beverage) -> Beverage {
    tracing::info!("Serving: {beverage}");
    beverage
}
