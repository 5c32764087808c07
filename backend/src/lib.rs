//! # nightplan
//!
//! Observability and planning engine for astrophotography session planning.
//!
//! This crate computes, scores and caches how well astronomical targets can be
//! observed from a fixed site. It is consumed in-process by a serving layer that
//! owns HTTP, rendering and persistence; the engine only sees already-typed
//! records and returns plain serializable results.
//!
//! ## Architecture
//!
//! - [`services::coordinates`]: equatorial to horizontal transform, Sun/Moon ephemeris
//! - [`services::astronomical_night`]: dusk/dawn search (Sun at -18°)
//! - [`services::horizon`]: piecewise horizon obstruction model
//! - [`services::observability`]: per-night observability windows
//! - [`services::opportunities`]: multi-month opportunity scanner
//! - [`services::heatmap`]: chunked yearly quality grid
//! - [`services::duplicates`]: duplicate object detection and merge
//! - [`cache`]: bounded memoization shared by all of the above
//! - [`engine`]: the [`engine::PlanningEngine`] facade tying it together
//! - [`scheduler`]: background warm-up supervisor
//! - [`db`]: catalog repository trait and the in-memory implementation
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use nightplan::api::{Location, LocationId, Target, TargetId};
//! use nightplan::config::EngineConfig;
//! use nightplan::engine::PlanningEngine;
//!
//! let engine = PlanningEngine::new(EngineConfig::default());
//! let site = Location::new(LocationId(1), "Backyard", 52.0, 13.0, "Europe/Berlin", 20.0).unwrap();
//! let m42 = Target::new(TargetId(1), "M42", 5.5, 7.0).unwrap();
//! let date = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
//!
//! let window = engine.compute_observability_window(&m42, &site, date).unwrap();
//! assert!(window.observable_minutes > 0);
//! ```

#[cfg(not(feature = "local-repo"))]
compile_error!("Enable at least one repository backend feature.");

pub mod api;
pub mod cache;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod models;
pub mod scheduler;
pub mod services;

pub use engine::PlanningEngine;
pub use error::{EngineError, EngineResult};
