//! Yearly observability heatmap.
//!
//! The grid covers twelve months from a start date, sampling one
//! representative night every `sample_interval_days` within each month. A full
//! year for a large catalog is far too much work for one call, so the grid is
//! produced in chunks: one month at most, and at most `max_cells_per_chunk`
//! target-night cells. The returned cursor picks up where the chunk stopped.

use chrono::{Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::api::{HeatmapCell, HeatmapChunk, HeatmapCursor, Location, Target};
use crate::config::HeatmapConfig;
use crate::error::{EngineError, EngineResult};
use crate::services::opportunities::NightEvaluator;
use crate::services::scoring::window_quality;

/// Chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapSettings {
    pub sample_interval_days: u32,
    pub max_cells_per_chunk: usize,
    pub months: u32,
}

impl Default for HeatmapSettings {
    fn default() -> Self {
        Self::from(&HeatmapConfig::default())
    }
}

impl From<&HeatmapConfig> for HeatmapSettings {
    fn from(config: &HeatmapConfig) -> Self {
        Self {
            sample_interval_days: config.sample_interval_days,
            max_cells_per_chunk: config.max_cells_per_chunk,
            months: config.months,
        }
    }
}

/// First day of month `offset` of the span starting at `start`.
pub fn month_begin(start: NaiveDate, offset: u32) -> EngineResult<NaiveDate> {
    start
        .checked_add_months(Months::new(offset))
        .ok_or_else(|| EngineError::Internal(format!("heatmap month {} overflows from {}", offset, start)))
}

/// Representative nights of month `offset`: its first night and every
/// `interval_days` after, up to the start of the next month.
pub fn representative_nights(start: NaiveDate, offset: u32, interval_days: u32) -> EngineResult<Vec<NaiveDate>> {
    let begin = month_begin(start, offset)?;
    let end = month_begin(start, offset + 1)?;
    let step = Duration::days(i64::from(interval_days.max(1)));

    let mut nights = Vec::new();
    let mut date = begin;
    while date < end {
        nights.push(date);
        date = match date.checked_add_signed(step) {
            Some(next) => next,
            None => break,
        };
    }
    Ok(nights)
}

/// Score every target on one night.
pub fn night_cells<E: NightEvaluator + ?Sized>(
    evaluator: &E,
    targets: &[Target],
    location: &Location,
    date: NaiveDate,
) -> EngineResult<Vec<HeatmapCell>> {
    targets
        .iter()
        .map(|target| {
            let window = evaluator.evaluate(target, location, date)?;
            Ok(HeatmapCell {
                target_id: target.id,
                date,
                score: window_quality(&window, location.altitude_threshold),
                observable_minutes: window.observable_minutes,
                max_altitude: window.max_altitude,
                moon_illumination: window.moon_illumination,
            })
        })
        .collect()
}

/// Compute the next chunk of the heatmap, evaluating nights directly.
pub fn build_heatmap_chunk<E: NightEvaluator + ?Sized>(
    evaluator: &E,
    targets: &[Target],
    location: &Location,
    cursor: HeatmapCursor,
    settings: &HeatmapSettings,
) -> EngineResult<HeatmapChunk> {
    build_heatmap_chunk_with(targets, location, cursor, settings, |date, enabled| {
        night_cells(evaluator, enabled, location, date)
    })
}

/// Compute the next chunk of the heatmap.
///
/// # Arguments
///
/// * `targets` - Catalog; disabled targets are left out of the grid
/// * `location` - Observer site; an inactive site yields an empty, final chunk
/// * `cursor` - Where to continue; [`HeatmapCursor::new`] starts a new grid
/// * `settings` - Sampling interval, cell budget and span length
/// * `cells_for_night` - Produces the cells of one night for the enabled
///   targets; the engine puts its heatmap cache here
///
/// # Returns
///
/// The chunk's cells and the cursor for the next call, `None` once the last
/// month is done. At least one night is computed per call even when a single
/// night exceeds the cell budget.
pub fn build_heatmap_chunk_with<F>(
    targets: &[Target],
    location: &Location,
    cursor: HeatmapCursor,
    settings: &HeatmapSettings,
    mut cells_for_night: F,
) -> EngineResult<HeatmapChunk>
where
    F: FnMut(NaiveDate, &[Target]) -> EngineResult<Vec<HeatmapCell>>,
{
    let month_start = month_begin(cursor.start, cursor.month_offset)?;
    if !location.active || cursor.month_offset >= settings.months {
        log::debug!(
            "heatmap for location {} has nothing to do at month {}",
            location.id,
            cursor.month_offset
        );
        return Ok(HeatmapChunk {
            month_start,
            cells: Vec::new(),
            next_cursor: None,
            budget_exceeded: false,
        });
    }

    location.validate()?;
    let enabled: Vec<Target> = targets.iter().filter(|t| t.enabled).cloned().collect();
    for target in &enabled {
        target.validate()?;
    }
    let nights = representative_nights(cursor.start, cursor.month_offset, settings.sample_interval_days)?;
    let first = (cursor.night_index as usize).min(nights.len());

    let (taken, cells) = if enabled.is_empty() {
        (nights.len() - first, Vec::new())
    } else {
        let nights_per_chunk = (settings.max_cells_per_chunk / enabled.len()).max(1);
        let mut cells = Vec::new();
        let mut taken = 0;
        for &date in nights[first..].iter().take(nights_per_chunk) {
            cells.extend(cells_for_night(date, &enabled)?);
            taken += 1;
        }
        (taken, cells)
    };

    let next_index = first + taken;
    let budget_exceeded = next_index < nights.len();
    let next_cursor = if budget_exceeded {
        Some(HeatmapCursor {
            night_index: next_index as u32,
            ..cursor
        })
    } else if cursor.month_offset + 1 < settings.months {
        Some(HeatmapCursor {
            start: cursor.start,
            month_offset: cursor.month_offset + 1,
            night_index: 0,
        })
    } else {
        None
    };

    log::debug!(
        "heatmap chunk for location {} month {} nights {}..{}: {} cells",
        location.id,
        month_start,
        first,
        next_index,
        cells.len()
    );
    Ok(HeatmapChunk {
        month_start,
        cells,
        next_cursor,
        budget_exceeded,
    })
}
