//! Night quality scoring shared by the opportunity scanner and the heatmap.

use crate::api::ObservabilityWindow;

/// Observable time at which the duration term saturates.
pub const DURATION_SATURATION_MINUTES: f64 = 480.0;

const DURATION_WEIGHT: f64 = 0.4;
const ALTITUDE_WEIGHT: f64 = 0.3;
const DARKNESS_WEIGHT: f64 = 0.3;

/// Composite quality of a night, 0-100.
///
/// Combines normalized observable duration, altitude margin above the site
/// threshold (scaled to the room left up to the zenith) and Moon darkness.
/// A night with no observable time scores 0.
pub fn night_quality(
    observable_minutes: i64,
    max_altitude: f64,
    altitude_threshold: f64,
    moon_illumination: f64,
) -> f64 {
    if observable_minutes <= 0 {
        return 0.0;
    }
    let duration = (observable_minutes as f64 / DURATION_SATURATION_MINUTES).min(1.0);
    let headroom = (90.0 - altitude_threshold).max(1.0);
    let altitude = ((max_altitude - altitude_threshold) / headroom).clamp(0.0, 1.0);
    let darkness = (1.0 - moon_illumination).clamp(0.0, 1.0);

    100.0 * (DURATION_WEIGHT * duration + ALTITUDE_WEIGHT * altitude + DARKNESS_WEIGHT * darkness)
}

/// [`night_quality`] of a computed window.
pub fn window_quality(window: &ObservabilityWindow, altitude_threshold: f64) -> f64 {
    night_quality(
        window.observable_minutes,
        window.max_altitude,
        altitude_threshold,
        window.moon_illumination,
    )
}
