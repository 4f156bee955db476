//! Scheduler daemon: registers the jobs listed in `BOSSMAN_JOBS` against a
//! Redis server and runs until interrupted.

mod jobs;
mod signal;

use std::sync::Arc;

use anyhow::Context;

use bossman_core::LoggingMiddleware;
use bossman_infra::{RedisStore, Scheduler, SchedulerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bossman_observability::init();

    let config = SchedulerConfig::from_env().context("invalid scheduler configuration")?;
    let jobs = jobs::parse_job_list(&std::env::var(jobs::JOBS_VAR).unwrap_or_default())
        .with_context(|| format!("invalid {}", jobs::JOBS_VAR))?;
    if jobs.is_empty() {
        tracing::warn!("{} is empty; this instance will only idle", jobs::JOBS_VAR);
    }

    let store = RedisStore::connect(&config.redis_url)
        .await
        .with_context(|| format!("failed to connect to {}", config.redis_url))?;
    let scheduler = Scheduler::new(Arc::new(store), &config);
    scheduler.use_middleware(LoggingMiddleware);

    let handle = scheduler.start().await?;
    for entry in &jobs {
        scheduler
            .register(entry.name.as_str(), jobs::heartbeat(entry))
            .await?;
    }
    tracing::info!(jobs = jobs.len(), "scheduler running");

    signal::shutdown_signal().await;

    handle.shutdown().await?;
    tracing::info!(
        stats = %serde_json::to_string(&scheduler.stats())?,
        "scheduler stopped"
    );
    Ok(())
}
