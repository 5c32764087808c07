//! Forward-looking opportunity scanner.
//!
//! Walks every night of the next few months for every enabled target, keeps the
//! nights that meet the imaging criteria and ranks them. Night evaluation goes
//! through [`NightEvaluator`] so the engine can put its cache in front of the
//! window calculator.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::api::{
    ImagingCriteria, Location, ObservabilityWindow, Opportunity, OpportunityReport, ScanResume, Target,
};
use crate::error::{EngineError, EngineResult};
use crate::services::coordinates::culmination_altitude;
use crate::services::observability::{compute_observability_window, WindowSettings};
use crate::services::scoring::window_quality;

/// Source of per-night observability windows.
pub trait NightEvaluator {
    fn evaluate(&self, target: &Target, location: &Location, date: NaiveDate) -> EngineResult<ObservabilityWindow>;
}

/// Uncached evaluator straight on top of the window calculator.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectEvaluator {
    pub settings: WindowSettings,
}

impl NightEvaluator for DirectEvaluator {
    fn evaluate(&self, target: &Target, location: &Location, date: NaiveDate) -> EngineResult<ObservabilityWindow> {
        compute_observability_window(target, location, date, &self.settings, None)
    }
}

/// Cap on the night evaluations a single call may perform.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkBudget {
    pub max_evaluations: Option<usize>,
}

impl WorkBudget {
    pub fn unlimited() -> Self {
        Self { max_evaluations: None }
    }

    pub fn evaluations(max: usize) -> Self {
        Self {
            max_evaluations: Some(max),
        }
    }

    /// At least one night is evaluated per call so a resumed scan always advances.
    fn exhausted(&self, used: usize) -> bool {
        self.max_evaluations.is_some_and(|max| used >= max.max(1))
    }
}

/// Parameters of one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    /// First night of the scan
    pub start: NaiveDate,
    pub horizon_months: u32,
    pub criteria: ImagingCriteria,
    /// Keep at most this many opportunities
    pub limit: Option<usize>,
    #[serde(default)]
    pub budget: WorkBudget,
    /// Continue a scan that ran out of budget
    #[serde(default)]
    pub resume: Option<ScanResume>,
}

impl ScanRequest {
    pub fn new(start: NaiveDate, horizon_months: u32, criteria: ImagingCriteria) -> Self {
        Self {
            start,
            horizon_months,
            criteria,
            limit: None,
            budget: WorkBudget::unlimited(),
            resume: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_budget(mut self, budget: WorkBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn resuming(mut self, resume: ScanResume) -> Self {
        self.resume = Some(resume);
        self
    }

    /// First night after the scan horizon.
    pub fn end(&self) -> EngineResult<NaiveDate> {
        self.start
            .checked_add_months(Months::new(self.horizon_months))
            .ok_or_else(|| EngineError::Internal(format!("scan horizon overflows from {}", self.start)))
    }
}

/// Whether a window meets every imaging criterion.
pub fn qualifies(window: &ObservabilityWindow, criteria: &ImagingCriteria) -> bool {
    window.observable_minutes >= criteria.min_observable_minutes
        && window.max_altitude >= criteria.min_max_altitude
        && window.moon_illumination * 100.0 <= criteria.max_moon_illumination
        && window.moon_separation >= criteria.min_moon_separation
}

/// Scan `targets` from `location` for qualifying nights.
///
/// # Arguments
///
/// * `evaluator` - Night evaluator (cached by the engine, counting in tests)
/// * `targets` - Candidate targets; disabled ones are ignored
/// * `location` - Observer site; an inactive site yields an empty report
/// * `request` - Date range, criteria, result cap and work budget
///
/// # Returns
///
/// Opportunities sorted by rating (best first), then date, then target id.
/// Every enabled target is validated before the first night is evaluated.
/// Targets whose culmination can never reach the minimum altitude are listed in
/// `skipped_targets` without a single night being evaluated. When the budget
/// runs out the report carries a resume point; opportunities found before that
/// point are not repeated by the resumed call.
pub fn scan_opportunities<E: NightEvaluator + ?Sized>(
    evaluator: &E,
    targets: &[Target],
    location: &Location,
    request: &ScanRequest,
) -> EngineResult<OpportunityReport> {
    let mut report = OpportunityReport::default();
    if !location.active {
        log::info!("location {} is inactive; skipping opportunity scan", location.id);
        return Ok(report);
    }

    location.validate()?;
    for target in targets.iter().filter(|t| t.enabled) {
        target.validate()?;
    }

    let end = request.end()?;
    let (first_target, resume_date) = match request.resume {
        Some(resume) => (resume.target_index, Some(resume.date)),
        None => (0, None),
    };

    'targets: for (index, target) in targets.iter().enumerate().skip(first_target) {
        if !target.enabled {
            continue;
        }
        if culmination_altitude(target.dec_degrees, location.latitude) < request.criteria.min_max_altitude {
            report.skipped_targets.push(target.id);
            continue;
        }

        let mut date = match resume_date {
            Some(resume) if index == first_target => resume.max(request.start),
            _ => request.start,
        };
        while date < end {
            if request.budget.exhausted(report.evaluated_nights) {
                report.resume = Some(ScanResume {
                    target_index: index,
                    date,
                });
                break 'targets;
            }

            let window = evaluator.evaluate(target, location, date)?;
            report.evaluated_nights += 1;

            if qualifies(&window, &request.criteria) {
                report.opportunities.push(Opportunity {
                    target_id: target.id,
                    date,
                    rating: window_quality(&window, location.altitude_threshold),
                    observable_minutes: window.observable_minutes,
                    max_altitude: window.max_altitude,
                    moon_illumination: window.moon_illumination * 100.0,
                    moon_separation: window.moon_separation,
                    transit_time: window.transit_time,
                });
            }

            date = match date.succ_opt() {
                Some(next) => next,
                None => break,
            };
        }
    }

    report.opportunities.sort_by(|a, b| {
        b.rating
            .total_cmp(&a.rating)
            .then(a.date.cmp(&b.date))
            .then(a.target_id.cmp(&b.target_id))
    });
    if let Some(limit) = request.limit {
        report.opportunities.truncate(limit);
    }

    log::debug!(
        "opportunity scan at location {}: {} nights evaluated, {} opportunities, {} targets skipped{}",
        location.id,
        report.evaluated_nights,
        report.opportunities.len(),
        report.skipped_targets.len(),
        if report.resume.is_some() { ", budget exhausted" } else { "" }
    );
    Ok(report)
}
