#![doc = include_str!("../README.md")]

mod shop;

use clap::Parser;
use shop::config::{CliArgs, ShopConfig};
use shop::telemetry::init_telemetry;
use std::time::Instant;

// Using mimalloc for better performance under contention between the
// barista, porta-filter and steam wand tasks.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ShopConfig::try_from(args)?;

    init_telemetry()?;
    log_startup_info(&config);

    let start = Instant::now();
    let beverages = shop::strategy::run(&config).await?;

    tracing::info!(
        "Served {} beverages with the {} strategy in {} ms",
        beverages.len(),
        config.strategy,
        start.elapsed().as_millis()
    );
    Ok(())
}

fn log_startup_info(config: &ShopConfig) {
    if cfg!(debug_assertions) {
        tracing::info!("Opening the shop with full config: {:#?}", config);
    } else {
        tracing::info!(
            "Opening the shop: {} orders, {} baristas, {} strategy",
            config.orders.len(),
            config.baristas,
            config.strategy
        );
    }
    for order in &config.orders {
        tracing::info!("{order}");
    }
}
