//! Coordinate and ephemeris transforms.
//!
//! Low-precision models, accurate to a few hundredths of a degree for the Sun
//! and about 0.3° for the Moon (geocentric, parallax ignored). That is far
//! below what matters for session planning with a several-minute sampling step.
//!
//! Conventions: right ascension in hours, every other angle in degrees,
//! longitude east positive, azimuth from north through east in [0, 360).
//! All functions are pure and safe to call from any thread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::models::ModifiedJulianDate;

/// Mean Earth-Sun distance in km.
const SUN_DISTANCE_KM: f64 = 149_597_870.7;

/// Mean Earth-Moon distance in km.
const MOON_DISTANCE_KM: f64 = 385_000.56;

/// Horizontal (alt/az) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizontalPosition {
    pub altitude: f64,
    pub azimuth: f64,
    /// Local hour angle in degrees, [0, 360)
    pub hour_angle: f64,
}

/// Equatorial coordinates of date (RA in hours).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquatorialPosition {
    pub ra_hours: f64,
    pub dec_degrees: f64,
}

/// Wrap an angle into [0, 360).
#[inline]
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid can return 360.0 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Reject right ascension / declination outside their valid ranges.
pub fn validate_equatorial(ra_hours: f64, dec_degrees: f64) -> EngineResult<()> {
    if !ra_hours.is_finite() || !(0.0..24.0).contains(&ra_hours) {
        return Err(EngineError::invalid_coordinate(
            "ra_hours",
            ra_hours,
            "must be in [0, 24)",
        ));
    }
    if !dec_degrees.is_finite() || !(-90.0..=90.0).contains(&dec_degrees) {
        return Err(EngineError::invalid_coordinate(
            "dec_degrees",
            dec_degrees,
            "must be in [-90, 90]",
        ));
    }
    Ok(())
}

/// Sexagesimal right ascension to decimal hours.
pub fn hms_to_hours(hours: f64, minutes: f64, seconds: f64) -> f64 {
    hours + minutes / 60.0 + seconds / 3600.0
}

/// Sexagesimal declination to decimal degrees. The sign is taken from
/// `degrees`, so `-0.0` yields a southern declination.
pub fn dms_to_degrees(degrees: f64, arcmin: f64, arcsec: f64) -> f64 {
    let magnitude = degrees.abs() + arcmin / 60.0 + arcsec / 3600.0;
    if degrees.is_sign_negative() {
        -magnitude
    } else {
        magnitude
    }
}

/// Greenwich mean sidereal time in degrees (IAU 1982 expression).
pub fn gmst_degrees(instant: DateTime<Utc>) -> f64 {
    let mjd = ModifiedJulianDate::from_datetime(instant);
    let d = mjd.days_since_j2000();
    let t = d / 36525.0;
    normalize_degrees(
        280.460_618_37 + 360.985_647_366_29 * d + 0.000_387_933 * t * t - t * t * t / 38_710_000.0,
    )
}

/// Local mean sidereal time in degrees.
pub fn local_sidereal_time(instant: DateTime<Utc>, longitude: f64) -> f64 {
    normalize_degrees(gmst_degrees(instant) + longitude)
}

/// Altitude and azimuth for a given hour angle.
pub fn hour_angle_to_horizontal(hour_angle: f64, dec_degrees: f64, latitude: f64) -> (f64, f64) {
    let h = hour_angle.to_radians();
    let dec = dec_degrees.to_radians();
    let lat = latitude.to_radians();

    let sin_alt = dec.sin() * lat.sin() + dec.cos() * lat.cos() * h.cos();
    let altitude = sin_alt.clamp(-1.0, 1.0).asin().to_degrees();

    let y = -dec.cos() * h.sin();
    let x = dec.sin() * lat.cos() - dec.cos() * lat.sin() * h.cos();
    let azimuth = normalize_degrees(y.atan2(x).to_degrees());

    (altitude, azimuth)
}

/// Equatorial to horizontal coordinates for an observer at `instant`.
pub fn equatorial_to_horizontal(
    ra_hours: f64,
    dec_degrees: f64,
    latitude: f64,
    longitude: f64,
    instant: DateTime<Utc>,
) -> HorizontalPosition {
    let lst = local_sidereal_time(instant, longitude);
    let hour_angle = normalize_degrees(lst - ra_hours * 15.0);
    let (altitude, azimuth) = hour_angle_to_horizontal(hour_angle, dec_degrees, latitude);
    HorizontalPosition {
        altitude,
        azimuth,
        hour_angle,
    }
}

/// Highest altitude a target can ever reach from `latitude` (upper transit).
///
/// Independent of date: this is what lets the scanner reject a target without
/// looking at a single night.
#[inline]
pub fn culmination_altitude(dec_degrees: f64, latitude: f64) -> f64 {
    90.0 - (latitude - dec_degrees).abs()
}

/// Great-circle distance in degrees (haversine form, stable for tiny angles).
pub fn angular_separation(ra1_hours: f64, dec1_degrees: f64, ra2_hours: f64, dec2_degrees: f64) -> f64 {
    let ra1 = (ra1_hours * 15.0).to_radians();
    let ra2 = (ra2_hours * 15.0).to_radians();
    let dec1 = dec1_degrees.to_radians();
    let dec2 = dec2_degrees.to_radians();

    let hav_dec = ((dec2 - dec1) / 2.0).sin().powi(2);
    let hav_ra = ((ra2 - ra1) / 2.0).sin().powi(2);
    let h = (hav_dec + dec1.cos() * dec2.cos() * hav_ra).clamp(0.0, 1.0);
    (2.0 * h.sqrt().asin()).to_degrees()
}

/// Mean obliquity of the ecliptic in degrees.
fn obliquity(days_since_j2000: f64) -> f64 {
    23.439 - 0.000_000_4 * days_since_j2000
}

fn ecliptic_to_equatorial(longitude: f64, latitude: f64, obliquity: f64) -> EquatorialPosition {
    let lambda = longitude.to_radians();
    let beta = latitude.to_radians();
    let eps = obliquity.to_radians();

    let ra = (lambda.sin() * eps.cos() - beta.tan() * eps.sin()).atan2(lambda.cos());
    let dec = (beta.sin() * eps.cos() + beta.cos() * eps.sin() * lambda.sin())
        .clamp(-1.0, 1.0)
        .asin();

    EquatorialPosition {
        ra_hours: normalize_degrees(ra.to_degrees()) / 15.0,
        dec_degrees: dec.to_degrees(),
    }
}

/// Apparent position of the Sun (Astronomical Almanac low-precision formula).
pub fn sun_position(instant: DateTime<Utc>) -> EquatorialPosition {
    let n = ModifiedJulianDate::from_datetime(instant).days_since_j2000();
    let mean_longitude = normalize_degrees(280.460 + 0.985_647_4 * n);
    let mean_anomaly = normalize_degrees(357.528 + 0.985_600_3 * n).to_radians();
    let ecliptic_longitude =
        mean_longitude + 1.915 * mean_anomaly.sin() + 0.020 * (2.0 * mean_anomaly).sin();
    ecliptic_to_equatorial(ecliptic_longitude, 0.0, obliquity(n))
}

/// Geocentric position of the Moon (six-term longitude, four-term latitude series).
pub fn moon_position(instant: DateTime<Utc>) -> EquatorialPosition {
    let mjd = ModifiedJulianDate::from_datetime(instant);
    let t = mjd.julian_centuries();
    let s = |a: f64, b: f64| (a + b * t).to_radians().sin();

    let longitude = 218.32 + 481_267.881 * t + 6.29 * s(135.0, 477_198.87)
        - 1.27 * s(259.3, -413_335.36)
        + 0.66 * s(235.7, 890_534.22)
        + 0.21 * s(269.9, 954_397.74)
        - 0.19 * s(357.5, 35_999.05)
        - 0.11 * s(186.5, 966_404.03);
    let latitude = 5.13 * s(93.3, 483_202.02) + 0.28 * s(228.2, 960_400.89)
        - 0.28 * s(318.3, 6_003.15)
        - 0.17 * s(217.6, -407_332.21);

    ecliptic_to_equatorial(normalize_degrees(longitude), latitude, obliquity(mjd.days_since_j2000()))
}

/// Illuminated fraction of the Moon's disk, [0, 1].
///
/// Phase angle from the Sun-Moon elongation using mean distances. Combined
/// with the positional error of the lunar series the result is good to about
/// 0.02 in fraction, which is finer than any moon-illumination criterion.
pub fn moon_illumination(instant: DateTime<Utc>) -> f64 {
    let sun = sun_position(instant);
    let moon = moon_position(instant);
    let elongation =
        angular_separation(sun.ra_hours, sun.dec_degrees, moon.ra_hours, moon.dec_degrees).to_radians();

    let phase_angle = (SUN_DISTANCE_KM * elongation.sin())
        .atan2(MOON_DISTANCE_KM - SUN_DISTANCE_KM * elongation.cos());
    ((1.0 + phase_angle.cos()) / 2.0).clamp(0.0, 1.0)
}

/// Altitude of the Sun for an observer.
pub fn sun_altitude(latitude: f64, longitude: f64, instant: DateTime<Utc>) -> f64 {
    let sun = sun_position(instant);
    equatorial_to_horizontal(sun.ra_hours, sun.dec_degrees, latitude, longitude, instant).altitude
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_gmst_at_j2000() {
        let gmst = gmst_degrees(utc(2000, 1, 1, 12, 0));
        assert!((gmst - 280.46).abs() < 0.01, "gmst = {}", gmst);
    }

    #[test]
    fn test_target_on_meridian_is_due_south() {
        let instant = utc(2025, 1, 15, 22, 0);
        let lst_hours = local_sidereal_time(instant, 13.0) / 15.0;
        let pos = equatorial_to_horizontal(lst_hours, 7.0, 52.0, 13.0, instant);
        assert!((pos.altitude - culmination_altitude(7.0, 52.0)).abs() < 1e-6);
        assert!((pos.azimuth - 180.0).abs() < 1e-6);
        assert!(pos.hour_angle.abs() < 1e-6 || (pos.hour_angle - 360.0).abs() < 1e-6);
    }

    #[test]
    fn test_azimuth_west_after_transit() {
        let (_, az) = hour_angle_to_horizontal(30.0, 10.0, 45.0);
        assert!(az > 180.0 && az < 360.0, "az = {}", az);
        let (_, az) = hour_angle_to_horizontal(330.0, 10.0, 45.0);
        assert!(az > 0.0 && az < 180.0, "az = {}", az);
    }

    #[test]
    fn test_pole_star_altitude_matches_latitude() {
        let pos = equatorial_to_horizontal(2.53, 89.999, 48.0, 2.0, utc(2024, 3, 1, 0, 0));
        assert!((pos.altitude - 48.0).abs() < 0.01);
    }

    #[test]
    fn test_sun_declination_at_solstices() {
        let june = sun_position(utc(2024, 6, 20, 20, 51));
        assert!((june.dec_degrees - 23.44).abs() < 0.05, "dec = {}", june.dec_degrees);
        let december = sun_position(utc(2024, 12, 21, 9, 20));
        assert!((december.dec_degrees + 23.44).abs() < 0.05, "dec = {}", december.dec_degrees);
    }

    #[test]
    fn test_moon_illumination_full_and_new() {
        // Full moon 2024-01-25 17:54 UTC, new moon 2024-01-11 11:57 UTC
        assert!(moon_illumination(utc(2024, 1, 25, 17, 54)) > 0.97);
        assert!(moon_illumination(utc(2024, 1, 11, 11, 57)) < 0.03);
        // First quarter 2024-01-18 03:53 UTC
        let quarter = moon_illumination(utc(2024, 1, 18, 3, 53));
        assert!((quarter - 0.5).abs() < 0.05, "quarter = {}", quarter);
    }

    #[test]
    fn test_angular_separation() {
        assert!((angular_separation(0.0, 0.0, 6.0, 0.0) - 90.0).abs() < 1e-9);
        assert!((angular_separation(1.0, 89.0, 13.0, 89.0) - 2.0).abs() < 1e-9);
        // One second of RA at the equator is 15 arcseconds
        let sep = angular_separation(10.0, 0.0, hms_to_hours(10.0, 0.0, 1.0), 0.0);
        assert!((sep * 3600.0 - 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_sexagesimal_helpers() {
        assert!((hms_to_hours(10.0, 30.0, 0.0) - 10.5).abs() < 1e-12);
        assert!((dms_to_degrees(-5.0, 30.0, 0.0) + 5.5).abs() < 1e-12);
        assert!((dms_to_degrees(-0.0, 30.0, 0.0) + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_validate_equatorial() {
        assert!(validate_equatorial(0.0, -90.0).is_ok());
        assert!(validate_equatorial(23.99, 90.0).is_ok());
        assert!(validate_equatorial(24.0, 0.0).is_err());
        assert!(validate_equatorial(-0.1, 0.0).is_err());
        assert!(validate_equatorial(f64::NAN, 0.0).is_err());
    }
}
