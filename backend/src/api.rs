//! Public API surface of the engine.
//!
//! This file consolidates the record and result types exchanged with the
//! persistence and serving collaborators. All types derive Serialize/Deserialize
//! so the serving layer can hand them straight to its JSON encoder.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::services::coordinates::validate_equatorial;
use crate::services::horizon::HorizonMask;

/// Observing location identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LocationId(pub i64);

/// Target identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetId(pub i64);

/// Imaging session identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub i64);

/// Project identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProjectId(pub i64);

macro_rules! impl_id {
    ($($name:ident),*) => {
        $(
            impl $name {
                pub fn new(value: i64) -> Self {
                    $name(value)
                }

                pub fn value(&self) -> i64 {
                    self.0
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl From<$name> for i64 {
                fn from(id: $name) -> Self {
                    id.0
                }
            }
        )*
    };
}

impl_id!(LocationId, TargetId, SessionId, ProjectId);

/// One vertex of a horizon mask: obstruction altitude at an azimuth (degrees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizonPoint {
    /// Azimuth in degrees, north through east, [0, 360]
    pub azimuth: f64,
    /// Obstruction altitude in degrees, [0, 90]
    pub altitude: f64,
}

impl HorizonPoint {
    pub fn new(azimuth: f64, altitude: f64) -> Self {
        Self { azimuth, altitude }
    }
}

impl From<[f64; 2]> for HorizonPoint {
    fn from(p: [f64; 2]) -> Self {
        Self::new(p[0], p[1])
    }
}

/// Fixed observing site.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Location {
    pub id: LocationId,
    pub name: String,
    /// Latitude in decimal degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in decimal degrees, east positive (-180 to 180)
    pub longitude: f64,
    /// IANA timezone identifier, e.g. `Europe/Berlin`
    pub timezone: String,
    /// Global minimum altitude in degrees
    pub altitude_threshold: f64,
    /// Horizon mask points, ordered by azimuth
    #[serde(default)]
    pub horizon: Vec<HorizonPoint>,
    /// Inactive locations are skipped by batch scans
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

impl Location {
    pub fn new(
        id: LocationId,
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
        timezone: impl Into<String>,
        altitude_threshold: f64,
    ) -> EngineResult<Self> {
        let location = Self {
            id,
            name: name.into(),
            latitude,
            longitude,
            timezone: timezone.into(),
            altitude_threshold,
            horizon: Vec::new(),
            active: true,
        };
        location.validate()?;
        Ok(location)
    }

    /// Replace the horizon mask.
    pub fn with_horizon<P: Into<HorizonPoint>>(
        mut self,
        points: impl IntoIterator<Item = P>,
    ) -> EngineResult<Self> {
        self.horizon = points.into_iter().map(Into::into).collect();
        self.validate()?;
        Ok(self)
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Check ranges, timezone and mask points.
    pub fn validate(&self) -> EngineResult<()> {
        if !(-90.0..=90.0).contains(&self.latitude) {
            return Err(EngineError::invalid_coordinate(
                "latitude",
                self.latitude,
                "must be between -90 and 90 degrees",
            ));
        }
        if !(-180.0..=180.0).contains(&self.longitude) {
            return Err(EngineError::invalid_coordinate(
                "longitude",
                self.longitude,
                "must be between -180 and 180 degrees",
            ));
        }
        if !(-90.0..90.0).contains(&self.altitude_threshold) {
            return Err(EngineError::InvalidLocation(format!(
                "altitude threshold {} must be in [-90, 90)",
                self.altitude_threshold
            )));
        }
        for point in &self.horizon {
            if !(0.0..=360.0).contains(&point.azimuth) || !(0.0..=90.0).contains(&point.altitude) {
                return Err(EngineError::InvalidLocation(format!(
                    "horizon point ({}, {}) out of range",
                    point.azimuth, point.altitude
                )));
            }
        }
        self.tz()?;
        Ok(())
    }

    /// Resolve the IANA timezone.
    pub fn tz(&self) -> EngineResult<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| EngineError::Timezone(format!("{}: {}", self.timezone, e)))
    }

    /// Evaluator over this location's mask points.
    pub fn horizon_mask(&self) -> HorizonMask {
        HorizonMask::new(&self.horizon)
    }
}

/// Deep-sky target in J2000 equatorial coordinates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Target {
    pub id: TargetId,
    pub name: String,
    /// Right ascension in hours, [0, 24)
    pub ra_hours: f64,
    /// Declination in degrees, [-90, 90]
    pub dec_degrees: f64,
    /// Disabled targets are excluded from batch scans
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Target {
    pub fn new(id: TargetId, name: impl Into<String>, ra_hours: f64, dec_degrees: f64) -> EngineResult<Self> {
        validate_equatorial(ra_hours, dec_degrees)?;
        Ok(Self {
            id,
            name: name.into(),
            ra_hours,
            dec_degrees,
            enabled: true,
        })
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        validate_equatorial(self.ra_hours, self.dec_degrees)
    }
}

/// Direction of a target's altitude change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Rising,
    Setting,
    Steady,
}

/// Astronomical night for one noon-to-noon window.
///
/// High-latitude sites may have no -18° crossing at all; those nights are
/// reported as [`NightBounds::FullDaylight`] or [`NightBounds::FullDarkness`]
/// instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NightBounds {
    Night {
        dusk: DateTime<Utc>,
        dawn: DateTime<Utc>,
    },
    /// The Sun never goes below -18° in the window.
    FullDaylight,
    /// The Sun never rises above -18° in the window.
    FullDarkness,
}

impl NightBounds {
    pub fn is_night(&self) -> bool {
        matches!(self, NightBounds::Night { .. })
    }
}

/// Instantaneous position of a target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PositionResult {
    pub instant: DateTime<Utc>,
    /// Degrees above the horizon
    pub altitude: f64,
    /// Degrees, north through east
    pub azimuth: f64,
    /// Moon altitude in degrees
    pub moon_altitude: f64,
    /// Angular distance to the Moon in degrees
    pub moon_separation: f64,
    /// Illuminated fraction of the Moon, [0, 1]
    pub moon_illumination: f64,
}

/// Observability of one target for one logical night.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservabilityWindow {
    pub target_id: TargetId,
    pub location_id: LocationId,
    /// Calendar date of the evening the night starts on
    pub date: NaiveDate,
    pub night: NightBounds,
    /// Length of the dark window in minutes
    pub dark_minutes: i64,
    /// Minutes above the net minimum visible altitude inside the dark window
    pub observable_minutes: i64,
    /// Culmination altitude over the whole day; may be negative
    pub max_altitude: f64,
    pub transit_time: DateTime<Utc>,
    /// Transit in the location's wall-clock time
    pub transit_local: NaiveDateTime,
    pub trend: Trend,
    /// Illuminated fraction of the Moon at transit, [0, 1]
    pub moon_illumination: f64,
    /// Target-Moon separation at transit in degrees
    pub moon_separation: f64,
    pub first_visible: Option<DateTime<Utc>>,
    pub last_visible: Option<DateTime<Utc>>,
}

/// Thresholds a night must pass to count as an imaging opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImagingCriteria {
    #[serde(default = "default_min_observable_minutes")]
    pub min_observable_minutes: i64,
    /// Degrees
    #[serde(default = "default_min_max_altitude")]
    pub min_max_altitude: f64,
    /// Percent, [0, 100]
    #[serde(default = "default_max_moon_illumination")]
    pub max_moon_illumination: f64,
    /// Degrees
    #[serde(default = "default_min_moon_separation")]
    pub min_moon_separation: f64,
}

fn default_min_observable_minutes() -> i64 {
    120
}

fn default_min_max_altitude() -> f64 {
    30.0
}

fn default_max_moon_illumination() -> f64 {
    100.0
}

fn default_min_moon_separation() -> f64 {
    0.0
}

impl Default for ImagingCriteria {
    fn default() -> Self {
        Self {
            min_observable_minutes: default_min_observable_minutes(),
            min_max_altitude: default_min_max_altitude(),
            max_moon_illumination: default_max_moon_illumination(),
            min_moon_separation: default_min_moon_separation(),
        }
    }
}

/// A future night meeting the imaging criteria.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Opportunity {
    pub target_id: TargetId,
    pub date: NaiveDate,
    /// Composite rating, 0-100
    pub rating: f64,
    pub observable_minutes: i64,
    pub max_altitude: f64,
    /// Percent, [0, 100]
    pub moon_illumination: f64,
    pub moon_separation: f64,
    pub transit_time: DateTime<Utc>,
}

/// Where an interrupted scan picks up again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResume {
    /// Index into the target slice passed to the scan
    pub target_index: usize,
    pub date: NaiveDate,
}

/// Result of an opportunity scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OpportunityReport {
    pub opportunities: Vec<Opportunity>,
    /// Number of target-nights evaluated
    pub evaluated_nights: usize,
    /// Targets skipped because their culmination can never reach the criteria
    pub skipped_targets: Vec<TargetId>,
    /// Set when the work budget ran out before the horizon was covered
    pub resume: Option<ScanResume>,
}

impl OpportunityReport {
    pub fn is_complete(&self) -> bool {
        self.resume.is_none()
    }
}

/// Position in the yearly heatmap computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeatmapCursor {
    /// First night of the twelve-month span
    pub start: NaiveDate,
    /// Month being computed, 0-11
    pub month_offset: u32,
    /// Next representative night within that month
    pub night_index: u32,
}

impl HeatmapCursor {
    pub fn new(start: NaiveDate) -> Self {
        Self {
            start,
            month_offset: 0,
            night_index: 0,
        }
    }
}

/// Quality score of one target on one representative night.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeatmapCell {
    pub target_id: TargetId,
    pub date: NaiveDate,
    /// Continuous score, 0-100
    pub score: f64,
    pub observable_minutes: i64,
    pub max_altitude: f64,
    /// Illuminated fraction of the Moon at transit, [0, 1]
    pub moon_illumination: f64,
}

/// One bounded slice of the yearly heatmap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeatmapChunk {
    pub month_start: NaiveDate,
    pub cells: Vec<HeatmapCell>,
    /// `None` once all twelve months are done
    pub next_cursor: Option<HeatmapCursor>,
    /// The chunk stopped early because of its work budget
    pub budget_exceeded: bool,
}

/// Two catalog entries close enough to be the same object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergeCandidate {
    /// Lower id of the pair
    pub first: TargetId,
    pub second: TargetId,
    pub separation_arcmin: f64,
}

/// What a merge changed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeReport {
    pub kept: TargetId,
    pub dropped: TargetId,
    pub sessions_relinked: usize,
    pub projects_relinked: usize,
    pub notes_appended: bool,
    pub framing_transferred: bool,
}
