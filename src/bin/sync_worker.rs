//! Standalone worker process that runs the external calendar sync pipeline
//! (C6) on its configured cron schedule and exits on SIGINT/SIGTERM.
//!
//! Runs independently of any HTTP adapter: it only needs the relational
//! store and an outbound HTTP client, not the cache coordinator or
//! notification fan-out.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use reqwest::Client;
use tokio_cron_scheduler::JobScheduler;
use tracing::{error, info};

use calndr_core::config;
use calndr_core::db::Store;
use calndr_core::sync::scheduler::register_batch_sync_job;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = config::load_config().context("loading configuration")?;
    config::validate_config(&cfg).map_err(|e| anyhow!(e))?;

    info!(cron = %cfg.sync.cron_schedule, "starting sync worker");

    let store = Arc::new(
        Store::new(
            &cfg.database_url,
            cfg.pool.min_connections,
            cfg.pool.max_connections,
            Duration::from_secs(cfg.pool.recycle_seconds),
        )
        .await?,
    );

    let client = Client::builder()
        .user_agent(cfg.sync.http_user_agent.clone())
        .timeout(Duration::from_secs(cfg.sync.provider_timeout_seconds))
        .build()?;

    let scheduler = JobScheduler::new().await?;
    register_batch_sync_job(&scheduler, &cfg.sync.cron_schedule, Arc::clone(&store), client).await?;
    scheduler.start().await?;

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => error!(error = %e, "failed to listen for shutdown signal"),
    }

    scheduler.shutdown().await?;
    info!("sync worker stopped");
    Ok(())
}
