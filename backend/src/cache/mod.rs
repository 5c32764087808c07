//! Memoization layer.
//!
//! One [`BoundedCache`] per result kind, bundled in [`EngineCaches`]. This is
//! the only shared mutable state of the engine.

pub mod bounded;
pub mod clock;
pub mod fingerprint;
pub mod keys;

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use bounded::{BoundedCache, CacheStats};
pub use clock::{Clock, ManualClock, SystemClock};
pub use keys::{HeatmapKey, OpportunityKey, PositionKey, WindowKey};

use crate::api::{HeatmapCell, ObservabilityWindow, OpportunityReport, PositionResult, TargetId};
use crate::config::{CacheConfig, MAX_TTL_MINUTES};

/// Per-process caches of the planning engine.
pub struct EngineCaches {
    pub positions: BoundedCache<PositionKey, PositionResult>,
    pub windows: BoundedCache<WindowKey, ObservabilityWindow>,
    pub opportunities: BoundedCache<OpportunityKey, OpportunityReport>,
    pub heatmap: BoundedCache<HeatmapKey, Vec<HeatmapCell>>,
}

/// Statistics of every cache in [`EngineCaches`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCacheStats {
    pub positions: CacheStats,
    pub windows: CacheStats,
    pub opportunities: CacheStats,
    pub heatmap: CacheStats,
}

impl EngineCaches {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let minutes = |m: u64| Duration::minutes(m.min(MAX_TTL_MINUTES) as i64);
        let hours = |h: u64| minutes(h.saturating_mul(60));
        Self {
            positions: BoundedCache::with_clock("positions", config.position_capacity, None, clock.clone()),
            windows: BoundedCache::with_clock(
                "windows",
                config.window_capacity,
                config.window_ttl_minutes.map(minutes),
                clock.clone(),
            ),
            opportunities: BoundedCache::with_clock(
                "opportunities",
                config.opportunity_capacity,
                Some(minutes(config.opportunity_ttl_minutes)),
                clock.clone(),
            ),
            heatmap: BoundedCache::with_clock(
                "heatmap",
                config.heatmap_capacity,
                Some(hours(config.heatmap_ttl_hours)),
                clock,
            ),
        }
    }

    /// Drop everything computed for `target_id`.
    ///
    /// Batch results (opportunities, heatmap) are keyed by target-set digest
    /// and cannot be matched to a single target, so they are cleared whole.
    ///
    /// # Returns
    /// The number of per-target entries removed.
    pub fn invalidate_target(&self, target_id: TargetId) -> usize {
        let removed = self.positions.invalidate_where(|k, _| k.target_id == target_id)
            + self.windows.invalidate_where(|k, _| k.target_id == target_id);
        self.opportunities.clear();
        self.heatmap.clear();
        log::debug!("invalidated {} cached results of target {}", removed, target_id);
        removed
    }

    /// Drop opportunity and heatmap results whose anchor date matches `predicate`.
    pub fn invalidate_anchors<P>(&self, predicate: P) -> usize
    where
        P: Fn(NaiveDate) -> bool,
    {
        self.opportunities.invalidate_where(|k, _| predicate(k.anchor))
            + self.heatmap.invalidate_where(|k, _| predicate(k.anchor))
    }

    pub fn clear(&self) {
        self.positions.clear();
        self.windows.clear();
        self.opportunities.clear();
        self.heatmap.clear();
    }

    pub fn stats(&self) -> EngineCacheStats {
        EngineCacheStats {
            positions: self.positions.stats(),
            windows: self.windows.stats(),
            opportunities: self.opportunities.stats(),
            heatmap: self.heatmap.stats(),
        }
    }
}
