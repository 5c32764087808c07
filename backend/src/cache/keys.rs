//! Cache keys.
//!
//! Every key carries the location tag and, where a single target is involved,
//! the target id plus a version of its coordinates, so edited records miss
//! instead of returning stale results.

use chrono::NaiveDate;

use crate::api::{ImagingCriteria, Location, Target, TargetId};
use crate::cache::fingerprint::{criteria_fingerprint, location_tag, target_set_fingerprint, target_version};
use crate::config::SamplingStep;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PositionKey {
    pub target_id: TargetId,
    pub target_version: u64,
    pub location: u64,
    pub unix_seconds: i64,
}

impl PositionKey {
    pub fn new(target: &Target, location: &Location, unix_seconds: i64) -> Self {
        Self {
            target_id: target.id,
            target_version: target_version(target),
            location: location_tag(location),
            unix_seconds,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowKey {
    pub target_id: TargetId,
    pub target_version: u64,
    pub location: u64,
    pub date: NaiveDate,
    pub step: SamplingStep,
}

impl WindowKey {
    pub fn new(target: &Target, location: &Location, date: NaiveDate, step: SamplingStep) -> Self {
        Self {
            target_id: target.id,
            target_version: target_version(target),
            location: location_tag(location),
            date,
            step,
        }
    }
}

/// Key of a whole opportunity scan.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OpportunityKey {
    pub target_set: String,
    pub location: u64,
    /// Planning date the scan starts from
    pub anchor: NaiveDate,
    pub horizon_months: u32,
    pub request: String,
    pub step: SamplingStep,
}

impl OpportunityKey {
    pub fn new(
        targets: &[Target],
        location: &Location,
        anchor: NaiveDate,
        horizon_months: u32,
        criteria: &ImagingCriteria,
        limit: Option<usize>,
        step: SamplingStep,
    ) -> Self {
        Self {
            target_set: target_set_fingerprint(targets),
            location: location_tag(location),
            anchor,
            horizon_months,
            request: criteria_fingerprint(criteria, limit),
            step,
        }
    }
}

/// Key of the heatmap cells of one representative night.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HeatmapKey {
    pub target_set: String,
    pub location: u64,
    /// Start date of the twelve-month span the night belongs to
    pub anchor: NaiveDate,
    pub date: NaiveDate,
    pub step: SamplingStep,
}

impl HeatmapKey {
    pub fn new(target_set: &str, location: &Location, anchor: NaiveDate, date: NaiveDate, step: SamplingStep) -> Self {
        Self {
            target_set: target_set.to_string(),
            location: location_tag(location),
            anchor,
            date,
            step,
        }
    }
}
