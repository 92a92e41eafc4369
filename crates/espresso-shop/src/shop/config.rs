use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::{fmt, time::Duration};
use espresso::{MachineConfig, Order, StageTimings};

/// How the shop works through its orders.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// One barista, one thread, blocking on every step.
    Sequential,
    /// Several baristas on blocking threads, sharing an unlimited machine.
    Threaded,
    /// Several barista tasks pulling from a shared order queue, sharing an
    /// unlimited machine.
    Tasks,
    /// Barista tasks sharing an espresso machine with a fixed number of
    /// porta-filters and steam wands.
    Machine,
    /// A stream of orders brewed with bounded concurrency on a shared espresso
    /// machine.
    Streams,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Threaded => write!(f, "threaded"),
            Self::Tasks => write!(f, "tasks"),
            Self::Machine => write!(f, "machine"),
            Self::Streams => write!(f, "streams"),
        }
    }
}

/// Runtime configuration for the `espresso-shop` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is honoured), with defaults matching the classic six-order
/// rush: two baristas, two porta-filters, two steam wands.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "espresso-shop",
    version,
    about = "Runs a cappuccino rush through a simulated coffee shop"
)]
pub struct CliArgs {
    /// Concurrency strategy used to work through the orders.
    ///
    /// Environment variable: `STRATEGY`
    #[arg(long, env = "STRATEGY", value_enum, default_value_t = Strategy::Machine)]
    pub strategy: Strategy,

    /// Number of orders in the rush. Orders cycle through the house menu.
    ///
    /// Environment variable: `ORDERS`
    #[arg(long, env = "ORDERS", default_value_t = 6)]
    pub orders: usize,

    /// Number of baristas working concurrently (ignored by `sequential`).
    ///
    /// Environment variable: `BARISTAS`
    #[arg(long, env = "BARISTAS", default_value_t = 2)]
    pub baristas: usize,

    /// Number of porta-filters on the espresso machine.
    ///
    /// Only the `machine` and `streams` strategies are limited by it.
    ///
    /// Environment variable: `PORTA_FILTERS`
    #[arg(long, env = "PORTA_FILTERS", default_value_t = 2)]
    pub porta_filters: usize,

    /// Number of steam wands on the espresso machine.
    ///
    /// Only the `machine` and `streams` strategies are limited by it.
    ///
    /// Environment variable: `STEAM_WANDS`
    #[arg(long, env = "STEAM_WANDS", default_value_t = 2)]
    pub steam_wands: usize,

    /// Capacity of each porta-filter's and steam wand's private queue.
    ///
    /// Lower values make dispatch follow which unit is actually free; higher
    /// values let baristas hand off work earlier.
    ///
    /// Environment variable: `QUEUE_CAPACITY`
    #[arg(long, env = "QUEUE_CAPACITY", default_value_t = 1)]
    pub queue_capacity: usize,

    /// Time to grind the beans for one order, in milliseconds.
    ///
    /// Environment variable: `GRIND_MS`
    #[arg(long, env = "GRIND_MS", default_value_t = 1000)]
    pub grind_ms: u64,

    /// Time to pull one espresso shot, in milliseconds.
    ///
    /// Environment variable: `EXTRACT_MS`
    #[arg(long, env = "EXTRACT_MS", default_value_t = 600)]
    pub extract_ms: u64,

    /// Time to steam the milk for one order, in milliseconds.
    ///
    /// Environment variable: `STEAM_MS`
    #[arg(long, env = "STEAM_MS", default_value_t = 300)]
    pub steam_ms: u64,

    /// Time to assemble one cappuccino, in milliseconds.
    ///
    /// Environment variable: `ASSEMBLE_MS`
    #[arg(long, env = "ASSEMBLE_MS", default_value_t = 100)]
    pub assemble_ms: u64,

    /// How long the machine waits for each porta-filter or steam wand to
    /// drain on shutdown, in seconds.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 3)]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct ShopConfig {
    pub strategy: Strategy,
    pub orders: Vec<Order>,
    pub baristas: usize,
    pub machine: MachineConfig,
    pub timings: StageTimings,
}

impl TryFrom<CliArgs> for ShopConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.orders == 0 {
            bail!("ORDERS must be greater than 0");
        }
        if args.baristas == 0 {
            bail!("BARISTAS must be greater than 0");
        }
        if args.porta_filters == 0 {
            bail!("PORTA_FILTERS must be greater than 0");
        }
        if args.steam_wands == 0 {
            bail!("STEAM_WANDS must be greater than 0");
        }
        if args.queue_capacity == 0 {
            bail!("QUEUE_CAPACITY must be greater than 0");
        }

        Ok(Self {
            strategy: args.strategy,
            orders: Order::batch(args.orders),
            baristas: args.baristas,
            machine: MachineConfig {
                porta_filters: args.porta_filters,
                steam_wands: args.steam_wands,
                queue_capacity: args.queue_capacity,
                shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
            },
            timings: StageTimings {
                grind: Duration::from_millis(args.grind_ms),
                extract: Duration::from_millis(args.extract_ms),
                steam: Duration::from_millis(args.steam_ms),
                assemble: Duration::from_millis(args.assemble_ms),
            },
        })
    }
}
