//! Engine configuration.
//!
//! Configuration is read once at the boundary from a TOML file, optionally
//! overridden from the environment, validated, and then handed to the engine
//! as plain typed values.
//!
//! ```toml
//! [sampling]
//! step_minutes = 10
//!
//! [scanner]
//! horizon_months = 3
//!
//! [worker]
//! refresh_minutes = 60
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Duration;

use crate::api::{Location, LocationId, Target};
use crate::error::{EngineError, EngineResult};

/// Longest accepted cache TTL (one year).
pub const MAX_TTL_MINUTES: u64 = 366 * 24 * 60;

/// Sampling step of the window calculator, in whole minutes (1-60).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct SamplingStep(u32);

impl SamplingStep {
    pub const MIN_MINUTES: u32 = 1;
    pub const MAX_MINUTES: u32 = 60;

    pub fn new(minutes: u32) -> EngineResult<Self> {
        if !(Self::MIN_MINUTES..=Self::MAX_MINUTES).contains(&minutes) {
            return Err(EngineError::Configuration(format!(
                "sampling step must be between {} and {} minutes, got {}",
                Self::MIN_MINUTES,
                Self::MAX_MINUTES,
                minutes
            )));
        }
        Ok(Self(minutes))
    }

    pub fn minutes(&self) -> u32 {
        self.0
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(i64::from(self.0))
    }
}

impl Default for SamplingStep {
    fn default() -> Self {
        Self(10)
    }
}

impl TryFrom<u32> for SamplingStep {
    type Error = EngineError;

    fn try_from(minutes: u32) -> Result<Self, Self::Error> {
        Self::new(minutes)
    }
}

impl From<SamplingStep> for u32 {
    fn from(step: SamplingStep) -> Self {
        step.0
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub heatmap: HeatmapConfig,
    #[serde(default)]
    pub duplicates: DuplicatesConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Seed catalog for the in-memory repository
    #[serde(default)]
    pub catalog: CatalogConfig,
}

/// Window calculator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    #[serde(rename = "step_minutes", default)]
    pub step: SamplingStep,
    #[serde(default = "default_trend_epsilon_seconds")]
    pub trend_epsilon_seconds: i64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            step: SamplingStep::default(),
            trend_epsilon_seconds: default_trend_epsilon_seconds(),
        }
    }
}

/// Capacities and freshness of the memoization layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_position_capacity")]
    pub position_capacity: usize,
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
    #[serde(default = "default_opportunity_capacity")]
    pub opportunity_capacity: usize,
    #[serde(default = "default_heatmap_capacity")]
    pub heatmap_capacity: usize,
    /// Window results never go stale on their own; `None` keeps them until evicted
    #[serde(default)]
    pub window_ttl_minutes: Option<u64>,
    #[serde(default = "default_opportunity_ttl_minutes")]
    pub opportunity_ttl_minutes: u64,
    #[serde(default = "default_heatmap_ttl_hours")]
    pub heatmap_ttl_hours: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            position_capacity: default_position_capacity(),
            window_capacity: default_window_capacity(),
            opportunity_capacity: default_opportunity_capacity(),
            heatmap_capacity: default_heatmap_capacity(),
            window_ttl_minutes: None,
            opportunity_ttl_minutes: default_opportunity_ttl_minutes(),
            heatmap_ttl_hours: default_heatmap_ttl_hours(),
        }
    }
}

/// Opportunity scanner defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    #[serde(default = "default_horizon_months")]
    pub horizon_months: u32,
    /// Night evaluations allowed per scan before it returns a resume point
    #[serde(default)]
    pub max_evaluations: Option<usize>,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            horizon_months: default_horizon_months(),
            max_evaluations: None,
        }
    }
}

/// Yearly heatmap settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeatmapConfig {
    #[serde(default = "default_sample_interval_days")]
    pub sample_interval_days: u32,
    #[serde(default = "default_max_cells_per_chunk")]
    pub max_cells_per_chunk: usize,
    #[serde(default = "default_heatmap_months")]
    pub months: u32,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            sample_interval_days: default_sample_interval_days(),
            max_cells_per_chunk: default_max_cells_per_chunk(),
            months: default_heatmap_months(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicatesConfig {
    #[serde(default = "default_duplicate_threshold_arcmin")]
    pub threshold_arcmin: f64,
}

impl Default for DuplicatesConfig {
    fn default() -> Self {
        Self {
            threshold_arcmin: default_duplicate_threshold_arcmin(),
        }
    }
}

/// Background warm-up supervisor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u64,
    #[serde(default = "default_true")]
    pub warm_heatmap: bool,
    #[serde(default = "default_true")]
    pub warm_opportunities: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            refresh_minutes: default_refresh_minutes(),
            warm_heatmap: true,
            warm_opportunities: true,
        }
    }
}

/// Locations and targets loaded into the in-memory repository at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Applied to locations that do not set their own threshold
    #[serde(default = "default_altitude_threshold")]
    pub default_altitude_threshold: f64,
    #[serde(default)]
    pub locations: Vec<CatalogLocation>,
    #[serde(default)]
    pub targets: Vec<Target>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            default_altitude_threshold: default_altitude_threshold(),
            locations: Vec::new(),
            targets: Vec::new(),
        }
    }
}

/// Location entry as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogLocation {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub timezone: String,
    #[serde(default)]
    pub altitude_threshold: Option<f64>,
    #[serde(default)]
    pub horizon: Vec<[f64; 2]>,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_trend_epsilon_seconds() -> i64 {
    60
}

fn default_position_capacity() -> usize {
    4096
}

fn default_window_capacity() -> usize {
    8192
}

fn default_opportunity_capacity() -> usize {
    64
}

fn default_heatmap_capacity() -> usize {
    32_768
}

fn default_opportunity_ttl_minutes() -> u64 {
    360
}

fn default_heatmap_ttl_hours() -> u64 {
    24
}

fn default_horizon_months() -> u32 {
    3
}

fn default_sample_interval_days() -> u32 {
    7
}

fn default_max_cells_per_chunk() -> usize {
    500
}

fn default_heatmap_months() -> u32 {
    12
}

fn default_duplicate_threshold_arcmin() -> f64 {
    2.5
}

fn default_refresh_minutes() -> u64 {
    60
}

fn default_altitude_threshold() -> f64 {
    20.0
}

fn default_true() -> bool {
    true
}

impl FromStr for EngineConfig {
    type Err = EngineError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| EngineError::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    /// * `Ok(EngineConfig)` if the file was read, parsed and validated
    /// * `Err(EngineError::Configuration)` otherwise
    pub fn from_file<P: AsRef<Path>>(path: P) -> EngineResult<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            EngineError::Configuration(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        content.parse()
    }

    /// Load configuration from the default location.
    ///
    /// Searches for `nightplan.toml` in:
    /// 1. Current directory
    /// 2. `backend/` directory
    /// 3. Parent directory
    pub fn from_default_location() -> EngineResult<Self> {
        let search_paths = [
            PathBuf::from("nightplan.toml"),
            PathBuf::from("backend/nightplan.toml"),
            PathBuf::from("../nightplan.toml"),
        ];

        for path in search_paths {
            if path.exists() {
                log::info!("Loading configuration from {}", path.display());
                return Self::from_file(&path);
            }
        }

        Err(EngineError::Configuration(
            "No nightplan.toml found in standard locations".to_string(),
        ))
    }

    /// Apply overrides from the process environment.
    ///
    /// # Environment Variables
    /// - `NIGHTPLAN_SAMPLING_STEP`: sampling step in minutes
    /// - `NIGHTPLAN_ALTITUDE_THRESHOLD`: default altitude threshold for catalog locations
    /// - `NIGHTPLAN_REFRESH_MINUTES`: warm-up interval of the background supervisor
    pub fn apply_env_overrides(&mut self) -> EngineResult<()> {
        self.apply_overrides_with(|name| env::var(name).ok())
    }

    /// Same as [`EngineConfig::apply_env_overrides`] with an explicit variable lookup.
    pub fn apply_overrides_with<F>(&mut self, lookup: F) -> EngineResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("NIGHTPLAN_SAMPLING_STEP") {
            let minutes = parse_override::<u32>("NIGHTPLAN_SAMPLING_STEP", &raw)?;
            self.sampling.step = SamplingStep::new(minutes)?;
        }
        if let Some(raw) = lookup("NIGHTPLAN_ALTITUDE_THRESHOLD") {
            self.catalog.default_altitude_threshold =
                parse_override::<f64>("NIGHTPLAN_ALTITUDE_THRESHOLD", &raw)?;
        }
        if let Some(raw) = lookup("NIGHTPLAN_REFRESH_MINUTES") {
            self.worker.refresh_minutes = parse_override::<u64>("NIGHTPLAN_REFRESH_MINUTES", &raw)?;
        }
        self.validate()
    }

    /// Reject values the engine cannot work with.
    pub fn validate(&self) -> EngineResult<()> {
        let positive = [
            ("cache.position_capacity", self.cache.position_capacity),
            ("cache.window_capacity", self.cache.window_capacity),
            ("cache.opportunity_capacity", self.cache.opportunity_capacity),
            ("cache.heatmap_capacity", self.cache.heatmap_capacity),
            ("heatmap.max_cells_per_chunk", self.heatmap.max_cells_per_chunk),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(EngineError::Configuration(format!("{} must be positive", name)));
            }
        }
        let longest_ttl_minutes = [
            self.cache.window_ttl_minutes.unwrap_or(0),
            self.cache.opportunity_ttl_minutes,
            self.cache.heatmap_ttl_hours.saturating_mul(60),
        ]
        .into_iter()
        .max()
        .unwrap_or(0);
        if longest_ttl_minutes > MAX_TTL_MINUTES {
            return Err(EngineError::Configuration(format!(
                "cache TTLs must not exceed {} minutes",
                MAX_TTL_MINUTES
            )));
        }
        if self.sampling.trend_epsilon_seconds <= 0 {
            return Err(EngineError::Configuration(
                "sampling.trend_epsilon_seconds must be positive".to_string(),
            ));
        }
        if self.scanner.horizon_months == 0 {
            return Err(EngineError::Configuration(
                "scanner.horizon_months must be positive".to_string(),
            ));
        }
        if self.scanner.max_evaluations == Some(0) {
            return Err(EngineError::Configuration(
                "scanner.max_evaluations must be positive when set".to_string(),
            ));
        }
        if self.heatmap.sample_interval_days == 0 || self.heatmap.months == 0 {
            return Err(EngineError::Configuration(
                "heatmap.sample_interval_days and heatmap.months must be positive".to_string(),
            ));
        }
        if self.duplicates.threshold_arcmin.is_nan() || self.duplicates.threshold_arcmin <= 0.0 {
            return Err(EngineError::Configuration(
                "duplicates.threshold_arcmin must be positive".to_string(),
            ));
        }
        if self.worker.refresh_minutes == 0 {
            return Err(EngineError::Configuration(
                "worker.refresh_minutes must be positive".to_string(),
            ));
        }
        if !(-90.0..90.0).contains(&self.catalog.default_altitude_threshold) {
            return Err(EngineError::Configuration(format!(
                "catalog.default_altitude_threshold {} must be in [-90, 90)",
                self.catalog.default_altitude_threshold
            )));
        }
        Ok(())
    }

    /// Build validated [`Location`] records from the catalog section.
    pub fn catalog_locations(&self) -> EngineResult<Vec<Location>> {
        self.catalog
            .locations
            .iter()
            .map(|entry| {
                let threshold = entry
                    .altitude_threshold
                    .unwrap_or(self.catalog.default_altitude_threshold);
                Location::new(
                    LocationId::new(entry.id),
                    entry.name.clone(),
                    entry.latitude,
                    entry.longitude,
                    entry.timezone.clone(),
                    threshold,
                )?
                .with_horizon(entry.horizon.iter().copied())
                .map(|location| location.with_active(entry.active))
            })
            .collect()
    }

    /// Validated catalog targets.
    pub fn catalog_targets(&self) -> EngineResult<Vec<Target>> {
        for target in &self.catalog.targets {
            target.validate()?;
        }
        Ok(self.catalog.targets.clone())
    }
}

fn parse_override<T: FromStr>(name: &str, raw: &str) -> EngineResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| EngineError::Configuration(format!("{} has invalid value '{}'", name, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.sampling.step.minutes(), 10);
        assert_eq!(config.heatmap.months, 12);
        assert_eq!(config.duplicates.threshold_arcmin, 2.5);
    }

    #[test]
    fn test_parse_partial_file_fills_defaults() {
        let config: EngineConfig = r#"
            [sampling]
            step_minutes = 5

            [heatmap]
            max_cells_per_chunk = 200
        "#
        .parse()
        .unwrap();
        assert_eq!(config.sampling.step.minutes(), 5);
        assert_eq!(config.heatmap.max_cells_per_chunk, 200);
        assert_eq!(config.heatmap.sample_interval_days, 7);
        assert_eq!(config.scanner.horizon_months, 3);
    }

    #[test]
    fn test_out_of_range_step_is_rejected() {
        let result = "[sampling]\nstep_minutes = 0\n".parse::<EngineConfig>();
        assert!(matches!(result, Err(EngineError::Configuration(_))));
        assert!(SamplingStep::new(61).is_err());
        assert!(SamplingStep::new(60).is_ok());
    }

    #[test]
    fn test_zero_evaluation_budget_is_rejected() {
        let result = "[scanner]\nmax_evaluations = 0\n".parse::<EngineConfig>();
        assert!(matches!(result, Err(EngineError::Configuration(msg)) if msg.contains("max_evaluations")));
        let config = "[scanner]\nmax_evaluations = 25\n".parse::<EngineConfig>().unwrap();
        assert_eq!(config.scanner.max_evaluations, Some(25));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [worker]
            refresh_minutes = 15

            [[catalog.locations]]
            id = 1
            name = "Backyard"
            latitude = 52.0
            longitude = 13.0
            timezone = "Europe/Berlin"
            horizon = [[0.0, 0.0], [90.0, 30.0], [180.0, 0.0]]

            [[catalog.targets]]
            id = 1
            name = "M42"
            ra_hours = 5.588
            dec_degrees = -5.39
            "#
        )
        .unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.worker.refresh_minutes, 15);

        let locations = config.catalog_locations().unwrap();
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].altitude_threshold, 20.0);
        assert_eq!(locations[0].horizon.len(), 3);
        assert!(locations[0].active);
        assert_eq!(config.catalog_targets().unwrap()[0].name, "M42");
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = EngineConfig::from_file(dir.path().join("nope.toml"));
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("NIGHTPLAN_SAMPLING_STEP", "15"),
            ("NIGHTPLAN_ALTITUDE_THRESHOLD", "25.5"),
            ("NIGHTPLAN_REFRESH_MINUTES", "30"),
        ]
        .into_iter()
        .collect();

        let mut config = EngineConfig::default();
        config
            .apply_overrides_with(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.sampling.step.minutes(), 15);
        assert_eq!(config.catalog.default_altitude_threshold, 25.5);
        assert_eq!(config.worker.refresh_minutes, 30);
    }

    #[test]
    fn test_invalid_env_override_is_rejected() {
        let mut config = EngineConfig::default();
        let result = config.apply_overrides_with(|name| {
            (name == "NIGHTPLAN_SAMPLING_STEP").then(|| "ten".to_string())
        });
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[test]
    fn test_invalid_catalog_location_is_rejected() {
        let config: EngineConfig = r#"
            [[catalog.locations]]
            id = 1
            name = "Nowhere"
            latitude = 95.0
            longitude = 0.0
            timezone = "UTC"
        "#
        .parse()
        .unwrap();
        assert!(config.catalog_locations().is_err());
    }
}
