//! Astronomical night computation service.
//!
//! Computes astronomical night (Sun altitude < -18°) for a given observer
//! location and logical night. Nights follow a noon-to-noon convention in the
//! location's local time: a query at 02:00 and one at 14:00 on the previous
//! calendar day resolve to the same night.

use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;

use crate::api::{Location, NightBounds};
use crate::error::{EngineError, EngineResult};
use crate::services::coordinates::sun_altitude;

/// Solar altitude defining astronomical twilight, in degrees.
pub const ASTRONOMICAL_TWILIGHT: f64 = -18.0;

/// Coarse sampling step for the solar altitude scan.
const COARSE_STEP_MINUTES: i64 = 10;

/// Bisection stops once the bracket is this narrow.
const REFINE_TOLERANCE_SECONDS: i64 = 1;

/// Local noon of `date` in `tz`, as a UTC instant.
fn local_noon(tz: &Tz, date: NaiveDate) -> EngineResult<DateTime<Utc>> {
    let noon = date
        .and_hms_opt(12, 0, 0)
        .ok_or_else(|| EngineError::Internal(format!("invalid noon for {}", date)))?;
    match tz.from_local_datetime(&noon) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        // No zone shifts its clocks at noon today, but a gap is not impossible
        LocalResult::None => tz
            .from_local_datetime(&(noon + Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .ok_or_else(|| EngineError::Timezone(format!("no local noon on {} in {}", date, tz))),
    }
}

/// Noon-to-noon window of the logical night starting on `date`.
///
/// # Returns
/// `(start, end)` in UTC; usually 24 h, 23 h or 25 h across DST changes.
pub fn night_window(location: &Location, date: NaiveDate) -> EngineResult<(DateTime<Utc>, DateTime<Utc>)> {
    let tz = location.tz()?;
    let next = date
        .succ_opt()
        .ok_or_else(|| EngineError::Internal(format!("date overflow after {}", date)))?;
    Ok((local_noon(&tz, date)?, local_noon(&tz, next)?))
}

/// Date of the logical night an instant belongs to.
///
/// Local times before noon belong to the night that started the previous evening.
pub fn logical_night_date(location: &Location, instant: DateTime<Utc>) -> EngineResult<NaiveDate> {
    let tz = location.tz()?;
    let local = instant.with_timezone(&tz);
    let date = local.date_naive();
    if local.hour() < 12 {
        date.pred_opt()
            .ok_or_else(|| EngineError::Internal(format!("date underflow before {}", date)))
    } else {
        Ok(date)
    }
}

/// Compute astronomical night for a location and logical night.
///
/// Astronomical night is defined as the period when the Sun's center is more than
/// 18° below the horizon (altitude < -18°).
///
/// # Arguments
///
/// * `location` - Observer location (latitude, longitude, timezone)
/// * `date` - Calendar date of the evening the night starts on
///
/// # Returns
///
/// [`NightBounds::Night`] with the dusk/dawn crossings, or one of the explicit
/// states when the Sun never crosses -18° inside the noon-to-noon window. If the
/// window holds several dark intervals the longest one is returned.
pub fn astronomical_night(location: &Location, date: NaiveDate) -> EngineResult<NightBounds> {
    let (start, end) = night_window(location, date)?;
    let intervals = find_dark_intervals(
        location.latitude,
        location.longitude,
        start,
        end,
        ASTRONOMICAL_TWILIGHT,
    );

    let bounds = match intervals.iter().max_by_key(|(s, e)| *e - *s) {
        None => NightBounds::FullDaylight,
        Some(&(dusk, dawn)) if dusk == start && dawn == end => NightBounds::FullDarkness,
        Some(&(dusk, dawn)) => NightBounds::Night { dusk, dawn },
    };
    log::debug!(
        "astronomical night for location {} on {}: {:?}",
        location.id,
        date,
        bounds
    );
    Ok(bounds)
}

/// Intervals inside `[start, end]` during which the Sun is below `threshold`.
///
/// The Sun's altitude is sampled on a coarse grid and every state change is
/// refined by bisection.
pub fn find_dark_intervals(
    latitude: f64,
    longitude: f64,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    threshold: f64,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let is_dark = |t: DateTime<Utc>| sun_altitude(latitude, longitude, t) < threshold;
    let step = Duration::minutes(COARSE_STEP_MINUTES);

    let mut intervals = Vec::new();
    let mut prev_t = start;
    let mut prev_dark = is_dark(start);
    let mut open = if prev_dark { Some(start) } else { None };

    while prev_t < end {
        let t = (prev_t + step).min(end);
        let dark = is_dark(t);
        if dark != prev_dark {
            let crossing = bisect_crossing(&is_dark, prev_t, t, prev_dark);
            match open.take() {
                Some(dusk) => intervals.push((dusk, crossing)),
                None => open = Some(crossing),
            }
        }
        prev_t = t;
        prev_dark = dark;
    }

    if let Some(dusk) = open {
        intervals.push((dusk, end));
    }
    intervals
}

/// Narrow `[lo, hi]` down to the instant where `is_dark` flips.
fn bisect_crossing<F>(is_dark: &F, mut lo: DateTime<Utc>, mut hi: DateTime<Utc>, lo_dark: bool) -> DateTime<Utc>
where
    F: Fn(DateTime<Utc>) -> bool,
{
    while (hi - lo).num_seconds() > REFINE_TOLERANCE_SECONDS {
        let mid = lo + Duration::seconds((hi - lo).num_seconds() / 2);
        if is_dark(mid) == lo_dark {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    hi
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::LocationId;

    fn site(lat: f64, lon: f64, tz: &str) -> Location {
        Location::new(LocationId(1), "test", lat, lon, tz, 20.0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_astronomical_night_roque_de_los_muchachos() {
        // Roque de los Muchachos Observatory
        let location = site(28.7624, -17.8892, "Atlantic/Canary");

        let night = astronomical_night(&location, date(2026, 1, 15)).unwrap();
        match night {
            NightBounds::Night { dusk, dawn } => {
                let hours = (dawn - dusk).num_minutes() as f64 / 60.0;
                // Typical astronomical night in winter at this latitude is ~10 hours
                assert!(hours > 9.0 && hours < 11.5, "night length {:.1} h", hours);
            }
            other => panic!("expected a night, got {:?}", other),
        }
    }

    #[test]
    fn test_astronomical_night_greenwich_winter() {
        let location = site(51.4769, 0.0, "Europe/London");
        let (start, end) = night_window(&location, date(2026, 1, 15)).unwrap();

        let NightBounds::Night { dusk, dawn } = astronomical_night(&location, date(2026, 1, 15)).unwrap() else {
            panic!("expected astronomical night in January");
        };
        assert!(start < dusk && dusk < dawn && dawn < end);
        // Dusk around 18:00 UTC in mid-January
        assert!((dusk - (start + Duration::hours(6))).num_minutes().abs() < 60);
    }

    #[test]
    fn test_greenwich_midsummer_has_no_astronomical_night() {
        let location = site(51.4769, 0.0, "Europe/London");
        let night = astronomical_night(&location, date(2026, 6, 21)).unwrap();
        assert_eq!(night, NightBounds::FullDaylight);
    }

    #[test]
    fn test_polar_night_is_full_darkness() {
        let location = site(89.0, 0.0, "UTC");
        let night = astronomical_night(&location, date(2025, 12, 21)).unwrap();
        assert_eq!(night, NightBounds::FullDarkness);
    }

    #[test]
    fn test_night_window_spans_noon_to_noon() {
        let location = site(52.0, 13.0, "Europe/Berlin");
        let (start, end) = night_window(&location, date(2025, 1, 15)).unwrap();
        // CET is UTC+1 in January
        assert_eq!(start.hour(), 11);
        assert_eq!((end - start).num_hours(), 24);
    }

    #[test]
    fn test_night_window_across_dst_change() {
        let location = site(52.0, 13.0, "Europe/Berlin");
        // Clocks go forward in the early hours of 2025-03-30
        let (start, end) = night_window(&location, date(2025, 3, 29)).unwrap();
        assert_eq!((end - start).num_hours(), 23);
    }

    #[test]
    fn test_logical_night_date_uses_noon_boundary() {
        let location = site(52.0, 13.0, "Europe/Berlin");
        let early = Utc.with_ymd_and_hms(2025, 1, 16, 1, 0, 0).unwrap(); // 02:00 local
        let afternoon = Utc.with_ymd_and_hms(2025, 1, 15, 13, 0, 0).unwrap(); // 14:00 local
        assert_eq!(logical_night_date(&location, early).unwrap(), date(2025, 1, 15));
        assert_eq!(logical_night_date(&location, afternoon).unwrap(), date(2025, 1, 15));
    }
}
