//! Background cache warm-up.
//!
//! The [`Supervisor`] owns one tokio task that wakes up every
//! `refresh_minutes`, reads the catalog from the repository and precomputes the
//! opportunity scan and the yearly heatmap of every active location, so the
//! first request of the day is served from cache. CPU-bound work runs on the
//! blocking pool; shutdown is checked between heatmap chunks.

use anyhow::Context;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::{ImagingCriteria, Location, LocationId, Target};
use crate::config::WorkerConfig;
use crate::db::CatalogRepository;
use crate::engine::PlanningEngine;
use crate::error::EngineResult;
use crate::services::job_tracker::{JobKind, JobTracker, LogLevel};

/// What one warm-up pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarmupSummary {
    /// Active locations visited
    pub locations: usize,
    /// Enabled targets in the catalog
    pub targets: usize,
    pub opportunity_scans: usize,
    pub heatmap_chunks: usize,
    /// Shutdown was requested before the pass finished
    pub cancelled: bool,
}

#[derive(Debug, Default)]
struct HeatmapWalk {
    chunks: usize,
    cancelled: bool,
}

/// Handle to the running warm-up task.
pub struct Supervisor {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
    jobs: JobTracker,
}

impl Supervisor {
    /// Spawn the warm-up loop on the current tokio runtime.
    ///
    /// The first pass starts immediately.
    pub fn start(engine: Arc<PlanningEngine>, repo: Arc<dyn CatalogRepository>, config: WorkerConfig) -> Self {
        let (shutdown, receiver) = watch::channel(false);
        let jobs = JobTracker::new();
        let handle = tokio::spawn(supervise(engine, repo, config, jobs.clone(), receiver));
        log::info!("warm-up supervisor started");
        Self {
            shutdown,
            handle: Some(handle),
            jobs,
        }
    }

    /// Jobs recorded by the warm-up loop.
    pub fn jobs(&self) -> &JobTracker {
        &self.jobs
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal shutdown and wait for the loop to exit.
    ///
    /// A pass in progress stops at the next heatmap chunk boundary.
    pub async fn stop(mut self) -> anyhow::Result<()> {
        let _ = self.shutdown.send(true);
        if let Some(handle) = self.handle.take() {
            handle.await.context("warm-up task panicked")?;
        }
        log::info!("warm-up supervisor stopped");
        Ok(())
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if self.handle.is_some() {
            let _ = self.shutdown.send(true);
        }
    }
}

async fn supervise(
    engine: Arc<PlanningEngine>,
    repo: Arc<dyn CatalogRepository>,
    config: WorkerConfig,
    jobs: JobTracker,
    mut shutdown: watch::Receiver<bool>,
) {
    let period = Duration::from_secs(config.refresh_minutes.max(1).saturating_mul(60));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let started = std::time::Instant::now();
        match run_once(&engine, &repo, &config, &jobs, &shutdown).await {
            Ok(summary) => log::info!(
                "warm-up pass: {} locations, {} targets, {} scans, {} heatmap chunks in {:?}{}",
                summary.locations,
                summary.targets,
                summary.opportunity_scans,
                summary.heatmap_chunks,
                started.elapsed(),
                if summary.cancelled { " (cancelled)" } else { "" }
            ),
            Err(e) => log::error!("warm-up pass failed: {:#}", e),
        }

        if *shutdown.borrow() {
            break;
        }
    }
}

/// Run a single warm-up pass.
///
/// # Arguments
/// * `engine` - Engine whose caches are filled
/// * `repo` - Source of locations and targets
/// * `config` - Which caches to warm
/// * `jobs` - Tracker receiving one job per warm-up kind
/// * `shutdown` - Checked between locations and between heatmap chunks
///
/// # Returns
/// * `Err` - If the catalog could not be read; per-location failures only
///   fail the corresponding job
pub async fn run_once(
    engine: &Arc<PlanningEngine>,
    repo: &Arc<dyn CatalogRepository>,
    config: &WorkerConfig,
    jobs: &JobTracker,
    shutdown: &watch::Receiver<bool>,
) -> anyhow::Result<WarmupSummary> {
    let locations: Vec<Location> = repo
        .list_locations()
        .await
        .context("listing locations")?
        .into_iter()
        .filter(|l| l.active)
        .collect();
    let targets: Arc<Vec<Target>> = Arc::new(repo.list_targets().await.context("listing targets")?);

    let mut summary = WarmupSummary {
        locations: locations.len(),
        targets: targets.iter().filter(|t| t.enabled).count(),
        ..Default::default()
    };

    if config.warm_opportunities && !*shutdown.borrow() {
        summary.opportunity_scans = warm_opportunities(engine, &targets, &locations, jobs).await;
    }

    if config.warm_heatmap && !*shutdown.borrow() {
        let job_id = jobs.create_job(JobKind::HeatmapWarmup);
        let mut failures = Vec::new();
        for location in &locations {
            let engine = Arc::clone(engine);
            let targets = Arc::clone(&targets);
            let location = location.clone();
            let cancel = shutdown.clone();
            let location_id = location.id;

            let walk = tokio::task::spawn_blocking(move || walk_heatmap(&engine, &targets, &location, &cancel)).await;
            match walk {
                Ok(Ok(walk)) => {
                    summary.heatmap_chunks += walk.chunks;
                    jobs.log(
                        &job_id,
                        LogLevel::Info,
                        format!("location {}: {} chunks", location_id, walk.chunks),
                    );
                    if walk.cancelled {
                        summary.cancelled = true;
                        break;
                    }
                }
                Ok(Err(e)) => failures.push(failure(location_id, &e)),
                Err(e) => failures.push(failure(location_id, &e)),
            }
        }

        if summary.cancelled {
            jobs.cancel_job(&job_id);
        } else if failures.is_empty() {
            jobs.complete_job(&job_id, Some(serde_json::json!({ "chunks": summary.heatmap_chunks })));
        } else {
            log::warn!("heatmap warm-up failed for {} locations", failures.len());
            jobs.fail_job(&job_id, failures.join("; "));
        }
    }

    if *shutdown.borrow() {
        summary.cancelled = true;
    }
    Ok(summary)
}

/// Scan every location concurrently with the default criteria.
///
/// # Returns
/// The number of scans that succeeded.
async fn warm_opportunities(
    engine: &Arc<PlanningEngine>,
    targets: &Arc<Vec<Target>>,
    locations: &[Location],
    jobs: &JobTracker,
) -> usize {
    let job_id = jobs.create_job(JobKind::OpportunityWarmup);
    let scans = locations.iter().cloned().map(|location| {
        let engine = Arc::clone(engine);
        let targets = Arc::clone(targets);
        let location_id = location.id;
        let task = tokio::task::spawn_blocking(move || -> EngineResult<usize> {
            let report = engine.scan_opportunities(&targets, &location, None, &ImagingCriteria::default(), None)?;
            Ok(report.opportunities.len())
        });
        async move { (location_id, task.await) }
    });

    let mut completed = 0;
    let mut failures = Vec::new();
    for (location_id, outcome) in join_all(scans).await {
        match outcome {
            Ok(Ok(found)) => {
                completed += 1;
                jobs.log(
                    &job_id,
                    LogLevel::Info,
                    format!("location {}: {} opportunities", location_id, found),
                );
            }
            Ok(Err(e)) => failures.push(failure(location_id, &e)),
            Err(e) => failures.push(failure(location_id, &e)),
        }
    }

    if failures.is_empty() {
        jobs.complete_job(&job_id, Some(serde_json::json!({ "scans": completed })));
    } else {
        log::warn!("opportunity warm-up failed for {} locations", failures.len());
        jobs.fail_job(&job_id, failures.join("; "));
    }
    completed
}

fn failure(location_id: LocationId, error: &dyn std::fmt::Display) -> String {
    format!("location {}: {}", location_id, error)
}

fn walk_heatmap(
    engine: &PlanningEngine,
    targets: &[Target],
    location: &Location,
    shutdown: &watch::Receiver<bool>,
) -> EngineResult<HeatmapWalk> {
    let mut walk = HeatmapWalk::default();
    let mut cursor = Some(engine.heatmap_start_cursor(location)?);
    while let Some(current) = cursor {
        if *shutdown.borrow() {
            walk.cancelled = true;
            break;
        }
        let chunk = engine.build_heatmap_chunk(targets, location, current)?;
        walk.chunks += 1;
        cursor = chunk.next_cursor;
    }
    Ok(walk)
}
