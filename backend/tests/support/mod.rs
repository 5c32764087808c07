#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use nightplan::api::{Location, LocationId, Target, TargetId};
use nightplan::cache::ManualClock;
use nightplan::config::EngineConfig;
use nightplan::PlanningEngine;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Runs `f` with environment variables temporarily modified.
///
/// This is panic-safe (restores variables on unwind) and also serializes access to
/// process-global env vars to avoid flaky tests when Rust runs tests in parallel.
///
/// `changes` is a list of `(key, value)` pairs:
/// - `Some(v)` sets the variable to `v`
/// - `None` removes the variable
pub fn with_scoped_env<F, R>(changes: &[(&str, Option<&str>)], f: F) -> R
where
    F: FnOnce() -> R,
{
    let _lock = ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let _guard = ScopedEnv::new(changes);
    f()
}

struct ScopedEnv {
    snapshot: Vec<(String, Option<String>)>,
}

impl ScopedEnv {
    fn new(changes: &[(&str, Option<&str>)]) -> Self {
        let keys: HashSet<&str> = changes.iter().map(|(k, _)| *k).collect();
        let snapshot = keys
            .into_iter()
            .map(|k| (k.to_string(), std::env::var(k).ok()))
            .collect::<Vec<_>>();

        for (k, v) in changes {
            match v {
                Some(val) => std::env::set_var(k, val),
                None => std::env::remove_var(k),
            }
        }

        Self { snapshot }
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (k, v) in self.snapshot.drain(..) {
            match v {
                Some(val) => std::env::set_var(&k, val),
                None => std::env::remove_var(&k),
            }
        }
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

/// Mid-latitude site near Berlin, 20° threshold, no mask.
pub fn berlin() -> Location {
    Location::new(LocationId(1), "Berlin", 52.0, 13.0, "Europe/Berlin", 20.0).unwrap()
}

/// Arctic site with polar day in June and polar night in December.
pub fn tromso() -> Location {
    Location::new(LocationId(2), "Tromsø", 69.65, 18.96, "Europe/Oslo", 15.0).unwrap()
}

pub fn target(id: i64, name: &str, ra_hours: f64, dec_degrees: f64) -> Target {
    Target::new(TargetId(id), name, ra_hours, dec_degrees).unwrap()
}

pub fn orion_nebula() -> Target {
    target(1, "M42", 5.5, 7.0)
}

/// Engine whose clock is frozen at `now`.
pub fn engine_at(now: DateTime<Utc>) -> (PlanningEngine, Arc<ManualClock>) {
    engine_with(EngineConfig::default(), now)
}

pub fn engine_with(config: EngineConfig, now: DateTime<Utc>) -> (PlanningEngine, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(now));
    (PlanningEngine::with_clock(config, clock.clone()), clock)
}
