//! Per-night observability windows.
//!
//! For one target, one site and one logical night this module answers: how long
//! is the target above the site's effective horizon while the sky is
//! astronomically dark, how high does it culminate and when, which way is it
//! moving, and where is the Moon.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::api::{Location, NightBounds, ObservabilityWindow, PositionResult, Target, Trend};
use crate::config::{SamplingConfig, SamplingStep};
use crate::error::EngineResult;
use crate::services::astronomical_night::{astronomical_night, night_window};
use crate::services::coordinates::{
    angular_separation, equatorial_to_horizontal, moon_illumination, moon_position,
};

/// Sidereal rotation of the hour angle, degrees per solar day.
const SIDEREAL_RATE_DEG_PER_DAY: f64 = 360.985_647_366_29;

/// Altitude changes smaller than this (degrees) report a steady trend.
const TREND_TOLERANCE_DEG: f64 = 1e-9;

/// Knobs for the window calculator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSettings {
    pub step: SamplingStep,
    /// Look-ahead used to classify the altitude trend
    pub trend_epsilon_seconds: i64,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self::from(&SamplingConfig::default())
    }
}

impl From<&SamplingConfig> for WindowSettings {
    fn from(config: &SamplingConfig) -> Self {
        Self {
            step: config.step,
            trend_epsilon_seconds: config.trend_epsilon_seconds,
        }
    }
}

/// Position of a target and of the Moon at one instant.
pub fn compute_position(
    target: &Target,
    location: &Location,
    instant: DateTime<Utc>,
) -> EngineResult<PositionResult> {
    target.validate()?;
    location.validate()?;

    let horizontal = equatorial_to_horizontal(
        target.ra_hours,
        target.dec_degrees,
        location.latitude,
        location.longitude,
        instant,
    );
    let moon = moon_position(instant);
    let moon_horizontal = equatorial_to_horizontal(
        moon.ra_hours,
        moon.dec_degrees,
        location.latitude,
        location.longitude,
        instant,
    );

    Ok(PositionResult {
        instant,
        altitude: horizontal.altitude,
        azimuth: horizontal.azimuth,
        moon_altitude: moon_horizontal.altitude,
        moon_separation: angular_separation(
            target.ra_hours,
            target.dec_degrees,
            moon.ra_hours,
            moon.dec_degrees,
        ),
        moon_illumination: moon_illumination(instant),
    })
}

/// Compute the observability window of `target` from `location` for the
/// logical night starting on `date`.
///
/// # Arguments
///
/// * `target` - Target to evaluate
/// * `location` - Observer site, including its threshold and horizon mask
/// * `date` - Calendar date of the evening the night starts on
/// * `settings` - Sampling step and trend look-ahead
/// * `reference` - Instant the trend is reported for ("now"); ignored when it
///   falls outside the night's noon-to-noon window, in which case the trend at
///   transit is reported
///
/// # Returns
///
/// The window. `FullDaylight` nights report zero observable minutes; a
/// `FullDarkness` night treats the whole noon-to-noon window as dark.
pub fn compute_observability_window(
    target: &Target,
    location: &Location,
    date: NaiveDate,
    settings: &WindowSettings,
    reference: Option<DateTime<Utc>>,
) -> EngineResult<ObservabilityWindow> {
    target.validate()?;
    location.validate()?;

    let tz = location.tz()?;
    let (start, end) = night_window(location, date)?;
    let night = astronomical_night(location, date)?;

    let dark = match night {
        NightBounds::Night { dusk, dawn } => Some((dusk, dawn)),
        NightBounds::FullDarkness => Some((start, end)),
        NightBounds::FullDaylight => None,
    };

    let altitude_at = |t: DateTime<Utc>| {
        equatorial_to_horizontal(
            target.ra_hours,
            target.dec_degrees,
            location.latitude,
            location.longitude,
            t,
        )
    };

    let mut observable_seconds = 0i64;
    let mut first_visible = None;
    let mut last_visible = None;
    let mut dark_minutes = 0;

    if let Some((dusk, dawn)) = dark {
        dark_minutes = (dawn - dusk).num_minutes();
        let mask = location.horizon_mask();
        let step = settings.step.duration();

        let mut t = dusk;
        while t < dawn {
            let segment_end = (t + step).min(dawn);
            let position = altitude_at(t);
            if mask.is_visible(location.altitude_threshold, position.altitude, position.azimuth) {
                observable_seconds += (segment_end - t).num_seconds();
                first_visible.get_or_insert(t);
                last_visible = Some(segment_end);
            }
            t = segment_end;
        }
    }

    let transit = upper_transit(altitude_at(start).hour_angle, start);
    let max_altitude = altitude_at(transit).altitude;

    let trend_at = match reference {
        Some(now) if now >= start && now < end => now,
        _ => transit,
    };
    let trend = classify_trend(
        altitude_at(trend_at).altitude,
        altitude_at(trend_at + Duration::seconds(settings.trend_epsilon_seconds)).altitude,
    );

    let moon = moon_position(transit);
    let window = ObservabilityWindow {
        target_id: target.id,
        location_id: location.id,
        date,
        night,
        dark_minutes,
        observable_minutes: observable_seconds / 60,
        max_altitude,
        transit_time: transit,
        transit_local: transit.with_timezone(&tz).naive_local(),
        trend,
        moon_illumination: moon_illumination(transit),
        moon_separation: angular_separation(
            target.ra_hours,
            target.dec_degrees,
            moon.ra_hours,
            moon.dec_degrees,
        ),
        first_visible,
        last_visible,
    };

    log::debug!(
        "window target={} location={} date={}: {} min observable, culmination {:.1}°",
        target.id,
        location.id,
        date,
        window.observable_minutes,
        window.max_altitude
    );
    Ok(window)
}

/// First upper transit (hour angle 0) at or after `start`.
///
/// The search spans one sidereal day, so on a 23 h spring-forward night the
/// transit may fall up to an hour past the window's noon.
fn upper_transit(hour_angle_at_start: f64, start: DateTime<Utc>) -> DateTime<Utc> {
    let degrees_to_go = (360.0 - hour_angle_at_start).rem_euclid(360.0);
    let seconds = degrees_to_go / SIDEREAL_RATE_DEG_PER_DAY * 86_400.0;
    start + Duration::seconds(seconds.round() as i64)
}

fn classify_trend(now: f64, later: f64) -> Trend {
    let delta = later - now;
    if delta > TREND_TOLERANCE_DEG {
        Trend::Rising
    } else if delta < -TREND_TOLERANCE_DEG {
        Trend::Setting
    } else {
        Trend::Steady
    }
}
