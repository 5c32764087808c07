//! Service layer: the computational core of the engine.
//!
//! Services are plain functions over typed records. They never touch storage or
//! the network; the [`crate::engine::PlanningEngine`] facade wraps them with
//! caching, and the repository layer supplies their inputs.

pub mod astronomical_night;
pub mod coordinates;
pub mod duplicates;
pub mod heatmap;
pub mod horizon;
pub mod job_tracker;
pub mod observability;
pub mod opportunities;
pub mod scoring;

pub use astronomical_night::{astronomical_night, logical_night_date, night_window};
pub use coordinates::{angular_separation, culmination_altitude, equatorial_to_horizontal};
pub use duplicates::{find_duplicates, merge_targets, DEFAULT_DUPLICATE_THRESHOLD_ARCMIN};
pub use heatmap::build_heatmap_chunk;
pub use horizon::HorizonMask;
pub use observability::{compute_observability_window, compute_position, WindowSettings};
pub use opportunities::{scan_opportunities, NightEvaluator, ScanRequest};
