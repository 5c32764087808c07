//! Planning engine facade.
//!
//! [`PlanningEngine`] is what the serving layer holds on to: it owns the
//! configuration and the caches, resolves the planning date and routes every
//! call through the memoized path. The computations themselves live in
//! [`crate::services`].

use chrono::{DateTime, Duration, NaiveDate, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

use crate::api::{
    HeatmapChunk, HeatmapCursor, ImagingCriteria, Location, MergeCandidate, MergeReport, NightBounds,
    ObservabilityWindow, OpportunityReport, PositionResult, ScanResume, Target, TargetId,
};
use crate::cache::fingerprint::target_set_fingerprint;
use crate::cache::{Clock, EngineCacheStats, EngineCaches, HeatmapKey, OpportunityKey, PositionKey, SystemClock, WindowKey};
use crate::config::EngineConfig;
use crate::db::CatalogRepository;
use crate::error::EngineResult;
use crate::services::astronomical_night::{astronomical_night, logical_night_date, night_window};
use crate::services::duplicates;
use crate::services::heatmap::{build_heatmap_chunk_with, night_cells, HeatmapSettings};
use crate::services::observability::{self, WindowSettings};
use crate::services::opportunities::{self, NightEvaluator, ScanRequest, WorkBudget};

/// Cached entry point to every engine operation.
///
/// The engine is `Send + Sync`; share it behind an `Arc` between request
/// handlers and the background [`crate::scheduler::Supervisor`].
pub struct PlanningEngine {
    config: EngineConfig,
    caches: EngineCaches,
    clock: Arc<dyn Clock>,
    /// Simulated planning date; `None` follows the clock
    planning_date: RwLock<Option<NaiveDate>>,
    window_settings: WindowSettings,
    heatmap_settings: HeatmapSettings,
}

impl PlanningEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an engine reading time from `clock` (tests use [`crate::cache::ManualClock`]).
    pub fn with_clock(config: EngineConfig, clock: Arc<dyn Clock>) -> Self {
        let caches = EngineCaches::new(&config.cache, clock.clone());
        let window_settings = WindowSettings::from(&config.sampling);
        let heatmap_settings = HeatmapSettings::from(&config.heatmap);
        Self {
            config,
            caches,
            clock,
            planning_date: RwLock::new(None),
            window_settings,
            heatmap_settings,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Simulated planning date, `None` while the engine follows the clock.
    pub fn simulated_date(&self) -> Option<NaiveDate> {
        *self.planning_date.read()
    }

    /// Switch simulation mode on (`Some`) or off (`None`).
    ///
    /// Opportunity scans and heatmap nights anchored at the previous planning
    /// date are evicted. While following the clock every location is anchored
    /// at its own logical night, which for any UTC offset lies between two
    /// days before and one day after the UTC date.
    ///
    /// # Returns
    /// The number of cache entries evicted.
    pub fn set_planning_date(&self, date: Option<NaiveDate>) -> usize {
        let previous = std::mem::replace(&mut *self.planning_date.write(), date);
        if previous == date {
            return 0;
        }
        let (first, last) = match previous {
            Some(previous) => (previous, previous),
            None => {
                let today = self.clock.now().date_naive();
                (today - Duration::days(2), today + Duration::days(1))
            }
        };
        let evicted = self
            .caches
            .invalidate_anchors(|anchor| anchor >= first && anchor <= last && Some(anchor) != date);
        log::info!(
            "planning date {:?} -> {:?}: evicted {} cached results",
            previous,
            date,
            evicted
        );
        evicted
    }

    /// Logical night the location is in right now, or the simulated date.
    ///
    /// Opportunity scans and the heatmap start from this night.
    pub fn tonight(&self, location: &Location) -> EngineResult<NaiveDate> {
        if let Some(date) = *self.planning_date.read() {
            return Ok(date);
        }
        logical_night_date(location, self.clock.now())
    }

    /// Dusk and dawn of `date`.
    pub fn astronomical_night(&self, location: &Location, date: NaiveDate) -> EngineResult<NightBounds> {
        astronomical_night(location, date)
    }

    /// Position of `target` at `instant`.
    ///
    /// Whole-second instants are memoized; sub-second instants are computed
    /// directly.
    pub fn compute_position(
        &self,
        target: &Target,
        location: &Location,
        instant: DateTime<Utc>,
    ) -> EngineResult<PositionResult> {
        target.validate()?;
        location.validate()?;
        if instant.timestamp_subsec_nanos() != 0 {
            return observability::compute_position(target, location, instant);
        }
        let key = PositionKey::new(target, location, instant.timestamp());
        self.caches
            .positions
            .get_or_compute(key, || observability::compute_position(target, location, instant))
    }

    /// Observability window of `target` for the night starting on `date`.
    ///
    /// The trend is taken at the clock's current instant while that instant
    /// lies inside the night's noon-to-noon window; such windows change from
    /// minute to minute and are not cached. Every other night uses the transit
    /// and is memoized.
    pub fn compute_observability_window(
        &self,
        target: &Target,
        location: &Location,
        date: NaiveDate,
    ) -> EngineResult<ObservabilityWindow> {
        target.validate()?;
        location.validate()?;
        let now = self.clock.now();
        let (start, end) = night_window(location, date)?;
        if now >= start && now < end {
            return observability::compute_observability_window(
                target,
                location,
                date,
                &self.window_settings,
                Some(now),
            );
        }
        self.cached_window(target, location, date)
    }

    fn cached_window(&self, target: &Target, location: &Location, date: NaiveDate) -> EngineResult<ObservabilityWindow> {
        let key = WindowKey::new(target, location, date, self.window_settings.step);
        self.caches.windows.get_or_compute(key, || {
            observability::compute_observability_window(target, location, date, &self.window_settings, None)
        })
    }

    /// Qualifying nights of `targets` from tonight on.
    ///
    /// # Arguments
    /// * `targets` - Candidate targets; disabled ones are ignored
    /// * `location` - Observer site
    /// * `horizon_months` - Months to scan; `None` uses the configured horizon
    /// * `criteria` - Thresholds a night must pass
    /// * `limit` - Keep at most this many opportunities
    ///
    /// # Returns
    /// When `scanner.max_evaluations` cuts the scan short the report carries a
    /// resume point for [`Self::scan_opportunities_from`]. Only complete
    /// reports are cached.
    pub fn scan_opportunities(
        &self,
        targets: &[Target],
        location: &Location,
        horizon_months: Option<u32>,
        criteria: &ImagingCriteria,
        limit: Option<usize>,
    ) -> EngineResult<OpportunityReport> {
        self.scan_opportunities_from(targets, location, horizon_months, criteria, limit, None)
    }

    /// Continue a scan from the resume point of an earlier partial report.
    ///
    /// A resumed call returns only what lies past `resume` and is never cached.
    pub fn scan_opportunities_from(
        &self,
        targets: &[Target],
        location: &Location,
        horizon_months: Option<u32>,
        criteria: &ImagingCriteria,
        limit: Option<usize>,
        resume: Option<ScanResume>,
    ) -> EngineResult<OpportunityReport> {
        let anchor = self.tonight(location)?;
        let horizon = horizon_months.unwrap_or(self.config.scanner.horizon_months);
        let mut request = ScanRequest::new(anchor, horizon, *criteria).with_budget(WorkBudget {
            max_evaluations: self.config.scanner.max_evaluations,
        });
        request.limit = limit;

        if let Some(resume) = resume {
            return opportunities::scan_opportunities(self, targets, location, &request.resuming(resume));
        }

        let key = OpportunityKey::new(
            targets,
            location,
            anchor,
            horizon,
            criteria,
            limit,
            self.window_settings.step,
        );
        if let Some(report) = self.caches.opportunities.get(&key) {
            return Ok(report);
        }
        let report = opportunities::scan_opportunities(self, targets, location, &request)?;
        if report.is_complete() {
            self.caches.opportunities.insert(key, report.clone());
        }
        Ok(report)
    }

    /// Cursor of the first heatmap chunk, starting at tonight.
    pub fn heatmap_start_cursor(&self, location: &Location) -> EngineResult<HeatmapCursor> {
        Ok(HeatmapCursor::new(self.tonight(location)?))
    }

    /// Compute the heatmap chunk at `cursor`; nights are memoized individually.
    pub fn build_heatmap_chunk(
        &self,
        targets: &[Target],
        location: &Location,
        cursor: HeatmapCursor,
    ) -> EngineResult<HeatmapChunk> {
        let target_set = target_set_fingerprint(targets);
        let step = self.window_settings.step;
        build_heatmap_chunk_with(targets, location, cursor, &self.heatmap_settings, |date, enabled| {
            let key = HeatmapKey::new(&target_set, location, cursor.start, date, step);
            self.caches
                .heatmap
                .get_or_compute(key, || night_cells(self, enabled, location, date))
        })
    }

    /// Pairs of enabled targets closer than `threshold_arcmin`.
    ///
    /// `None` uses the configured threshold.
    pub fn find_duplicates(&self, catalog: &[Target], threshold_arcmin: Option<f64>) -> Vec<MergeCandidate> {
        duplicates::find_duplicates(
            catalog,
            threshold_arcmin.unwrap_or(self.config.duplicates.threshold_arcmin),
        )
    }

    /// Merge `drop` into `keep` and forget everything cached for either.
    pub async fn merge_targets(
        &self,
        repo: &dyn CatalogRepository,
        keep: TargetId,
        drop: TargetId,
    ) -> EngineResult<MergeReport> {
        let report = duplicates::merge_targets(repo, keep, drop).await?;
        self.caches.invalidate_target(drop);
        self.caches.invalidate_target(keep);
        Ok(report)
    }

    /// Forget cached results of a target whose record was edited.
    pub fn invalidate_target(&self, target_id: TargetId) -> usize {
        self.caches.invalidate_target(target_id)
    }

    pub fn clear_caches(&self) {
        self.caches.clear();
    }

    pub fn cache_stats(&self) -> EngineCacheStats {
        self.caches.stats()
    }
}

impl NightEvaluator for PlanningEngine {
    fn evaluate(&self, target: &Target, location: &Location, date: NaiveDate) -> EngineResult<ObservabilityWindow> {
        self.cached_window(target, location, date)
    }
}
