//! Flash sale load generator
//!
//! ```bash
//! # In-memory backends, unprotected strategy
//! flash-sale-loadgen --mode naive --requests 500 --concurrency 500
//!
//! # Against a running server
//! flash-sale-loadgen --mode postgres --url http://localhost:8080 --reset
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use flash_sale::application::{InventoryConfig, InventoryService};
use flash_sale::domain::{Capacity, DelayMillis, ProductId, StrategyKind};
use flash_sale_loadgen::{
    ConcurrencyLevel, HarnessConfig, HttpTarget, InProcessTarget, LoadHarness, LoadReport,
    PurchaseTarget, RequestCount,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "flash-sale-loadgen",
    version,
    about = "Fires concurrent purchase attempts at one inventory strategy"
)]
struct Cli {
    /// Strategy to exercise: naive, postgres or redis
    #[arg(long, default_value = "redis")]
    mode: StrategyKind,

    /// Total purchase attempts
    #[arg(long, default_value_t = 500)]
    requests: usize,

    /// Attempts in flight at once
    #[arg(long, default_value_t = 500)]
    concurrency: usize,

    /// Initial stock
    #[arg(long, default_value_t = 100)]
    capacity: i64,

    /// Delay inside the unprotected strategy (in-memory runs only)
    #[arg(long, default_value_t = 5)]
    delay_ms: u64,

    /// Product under sale
    #[arg(long, default_value_t = 1)]
    product_id: i32,

    /// Base URL of a running server; in-memory backends are used when absent
    #[arg(long, value_name = "URL")]
    url: Option<String>,

    /// Reset the server's inventory before the run
    #[arg(long)]
    reset: bool,
}

async fn run<T: PurchaseTarget + 'static>(
    target: T,
    config: HarnessConfig,
    reset: bool,
) -> Result<LoadReport> {
    if reset {
        target.reset().await.context("Failed to reset inventory")?;
    }
    let harness = LoadHarness::new(Arc::new(target), config);
    Ok(harness.run().await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let product_id = ProductId::try_new(cli.product_id).context("--product-id must be positive")?;
    let initial_capacity = Capacity::try_new(cli.capacity).context("--capacity must not be negative")?;
    let config = HarnessConfig {
        total_requests: RequestCount::try_new(cli.requests).context("--requests must be positive")?,
        concurrency: ConcurrencyLevel::try_new(cli.concurrency)
            .context("--concurrency must be positive")?,
        product_id,
        initial_capacity,
    };

    println!(
        "Starting attack: {} requests at concurrency {} against {} units",
        cli.requests, cli.concurrency, cli.capacity
    );

    let report = match &cli.url {
        Some(url) => run(HttpTarget::new(url.as_str(), cli.mode), config, cli.reset).await?,
        None => {
            let service = InventoryService::in_memory(InventoryConfig {
                product_id,
                initial_capacity,
                naive_delay: DelayMillis::new(cli.delay_ms),
            })
            .await?;
            run(InProcessTarget::new(Arc::new(service), cli.mode), config, false).await?
        }
    };

    println!("\n{report}");
    Ok(())
}
