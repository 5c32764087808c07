//! Horizon obstruction model.
//!
//! A mask is a list of `(azimuth, altitude)` points. Inside the azimuth span the
//! points cover, obstruction is interpolated linearly between the two bracketing
//! points; outside it the sky is clear (0°). A mask anchored at azimuth 0 also
//! covers the wrap segment from its last point round to 360°.
//!
//! A 0° point ends an obstructed segment, so `[[0,0],[90,30],[180,0]]` blocks the
//! eastern quadrants and leaves the west open.

use serde::{Deserialize, Serialize};

use crate::api::HorizonPoint;
use crate::services::coordinates::normalize_degrees;

/// Above this altitude azimuth is too ill-conditioned to look up an
/// obstruction; the sky is treated as clear.
pub const NEAR_ZENITH_ALTITUDE: f64 = 85.0;

/// Sorted, de-duplicated horizon mask.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HorizonMask {
    points: Vec<HorizonPoint>,
}

impl HorizonMask {
    /// Build a mask. Azimuths are wrapped so 360° becomes 0°; on duplicates
    /// the first point wins.
    pub fn new(points: &[HorizonPoint]) -> Self {
        let mut normalized: Vec<HorizonPoint> = points
            .iter()
            .map(|p| HorizonPoint::new(normalize_degrees(p.azimuth), p.altitude))
            .collect();
        // Stable sort keeps the first occurrence ahead of later duplicates
        normalized.sort_by(|a, b| a.azimuth.total_cmp(&b.azimuth));
        normalized.dedup_by(|later, earlier| later.azimuth == earlier.azimuth);
        Self { points: normalized }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[HorizonPoint] {
        &self.points
    }

    /// True when the mask has a point on the 0°/360° seam and therefore covers
    /// the segment from its last point back round to 360°.
    fn wraps(&self) -> bool {
        self.points.len() >= 2 && self.points[0].azimuth == 0.0
    }

    /// Obstruction altitude in degrees at `azimuth`.
    pub fn obstruction(&self, azimuth: f64) -> f64 {
        let az = normalize_degrees(azimuth);
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return 0.0,
        };

        if az < first.azimuth || az > last.azimuth {
            if self.wraps() && az > last.azimuth {
                return interpolate(last.azimuth, last.altitude, 360.0, first.altitude, az);
            }
            return 0.0;
        }

        // First point at or beyond az; az >= first.azimuth guarantees idx exists
        let idx = self.points.partition_point(|p| p.azimuth < az);
        let upper = self.points[idx];
        if upper.azimuth == az || idx == 0 {
            return upper.altitude;
        }
        let lower = self.points[idx - 1];
        interpolate(lower.azimuth, lower.altitude, upper.azimuth, upper.altitude, az)
    }

    /// Obstruction seen by a target at `altitude`/`azimuth`.
    ///
    /// Near the zenith the azimuth is held: the obstruction resolves to 0° so
    /// azimuth jitter cannot flip the visibility decision.
    pub fn obstruction_for(&self, altitude: f64, azimuth: f64) -> f64 {
        if altitude > NEAR_ZENITH_ALTITUDE {
            0.0
        } else {
            self.obstruction(azimuth)
        }
    }

    /// `max(threshold, obstruction)` at the target's position.
    pub fn net_min_altitude(&self, threshold: f64, altitude: f64, azimuth: f64) -> f64 {
        threshold.max(self.obstruction_for(altitude, azimuth))
    }

    /// Whether a target at `altitude`/`azimuth` clears both the threshold and the mask.
    pub fn is_visible(&self, threshold: f64, altitude: f64, azimuth: f64) -> bool {
        altitude >= self.net_min_altitude(threshold, altitude, azimuth)
    }
}

fn interpolate(az0: f64, alt0: f64, az1: f64, alt1: f64, az: f64) -> f64 {
    let span = az1 - az0;
    if span <= 0.0 {
        return alt0;
    }
    alt0 + (alt1 - alt0) * (az - az0) / span
}
