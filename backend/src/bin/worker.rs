//! nightplan warm-up worker
//!
//! Loads the engine configuration, seeds the in-memory catalog from its
//! `[catalog]` section and keeps the engine caches warm until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Use ./nightplan.toml (or backend/nightplan.toml, ../nightplan.toml)
//! cargo run --bin nightplan-worker
//!
//! # Explicit configuration file
//! cargo run --bin nightplan-worker -- /etc/nightplan/site.toml
//! ```
//!
//! # Environment Variables
//!
//! - `NIGHTPLAN_REPOSITORY`: Repository backend (default: local)
//! - `NIGHTPLAN_SAMPLING_STEP`, `NIGHTPLAN_ALTITUDE_THRESHOLD`,
//!   `NIGHTPLAN_REFRESH_MINUTES`: configuration overrides
//! - `RUST_LOG`: Log filter (default: info)

use std::env;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use nightplan::config::EngineConfig;
use nightplan::db::{RepositoryFactory, RepositoryType};
use nightplan::scheduler::Supervisor;
use nightplan::PlanningEngine;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting nightplan worker");

    let mut config = match env::args().nth(1) {
        Some(path) => EngineConfig::from_file(&path)?,
        None => EngineConfig::from_default_location().unwrap_or_else(|e| {
            warn!("{}; using built-in defaults", e);
            EngineConfig::default()
        }),
    };
    config.apply_env_overrides()?;

    let repository = RepositoryFactory::create(RepositoryType::from_env(), &config)?;
    if !repository.health_check().await? {
        anyhow::bail!("catalog repository is not healthy");
    }
    info!(
        "Catalog ready: {} locations, {} targets",
        repository.list_locations().await?.len(),
        repository.list_targets().await?.len()
    );

    let worker_config = config.worker.clone();
    let engine = Arc::new(PlanningEngine::new(config));
    let supervisor = Supervisor::start(Arc::clone(&engine), repository, worker_config);

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested");
    supervisor.stop().await?;

    let stats = engine.cache_stats();
    info!(
        "Cache entries at exit: {} windows, {} opportunity scans, {} heatmap nights",
        stats.windows.len, stats.opportunities.len, stats.heatmap.len
    );
    Ok(())
}
