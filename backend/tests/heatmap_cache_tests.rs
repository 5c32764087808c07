//! Chunked heatmap and cache behavior through the engine.

mod support;

use chrono::Duration;
use nightplan::api::HeatmapCursor;
use nightplan::config::EngineConfig;
use support::{berlin, date, engine_at, engine_with, orion_nebula, target, utc};

#[test]
fn test_walking_the_year_visits_every_month_once() {
    let (engine, _) = engine_at(utc(2025, 1, 1, 12, 0));
    let catalog = [orion_nebula(), target(2, "M31", 0.712, 41.27)];

    let mut cursor = Some(engine.heatmap_start_cursor(&berlin()).unwrap());
    let mut months = Vec::new();
    let mut cells = 0;
    while let Some(current) = cursor {
        let chunk = engine.build_heatmap_chunk(&catalog, &berlin(), current).unwrap();
        if months.last() != Some(&chunk.month_start) {
            months.push(chunk.month_start);
        }
        cells += chunk.cells.len();
        assert!(chunk.cells.iter().all(|c| (0.0..=100.0).contains(&c.score)));
        cursor = chunk.next_cursor;
    }

    assert_eq!(months.len(), 12);
    assert_eq!(months[0], date(2025, 1, 1));
    assert_eq!(months[11], date(2025, 12, 1));
    assert!(cells >= 12 * 4 * catalog.len());
}

#[test]
fn test_small_budget_splits_a_month() {
    let mut config = EngineConfig::default();
    config.heatmap.max_cells_per_chunk = 4;
    let (engine, _) = engine_with(config, utc(2025, 1, 1, 12, 0));
    let catalog = [orion_nebula(), target(2, "M31", 0.712, 41.27)];

    let chunk = engine
        .build_heatmap_chunk(&catalog, &berlin(), HeatmapCursor::new(date(2025, 1, 1)))
        .unwrap();
    assert_eq!(chunk.cells.len(), 4);
    assert!(chunk.budget_exceeded);
    let next = chunk.next_cursor.unwrap();
    assert_eq!((next.month_offset, next.night_index), (0, 2));

    let rest = engine.build_heatmap_chunk(&catalog, &berlin(), next).unwrap();
    assert_eq!(rest.month_start, date(2025, 1, 1));
    assert!(rest.cells.iter().all(|c| c.date >= date(2025, 1, 15)));
}

#[test]
fn test_summer_nights_score_zero_at_high_latitude() {
    let (engine, _) = engine_at(utc(2025, 1, 1, 12, 0));
    let chunk = engine
        .build_heatmap_chunk(
            &[orion_nebula()],
            &support::tromso(),
            HeatmapCursor {
                start: date(2025, 1, 1),
                month_offset: 5,
                night_index: 0,
            },
        )
        .unwrap();
    assert_eq!(chunk.month_start, date(2025, 6, 1));
    assert!(chunk.cells.iter().all(|c| c.score == 0.0 && c.observable_minutes == 0));
}

#[test]
fn test_heatmap_entries_expire_after_a_day() {
    let (engine, clock) = engine_at(utc(2025, 1, 1, 12, 0));
    let cursor = engine.heatmap_start_cursor(&berlin()).unwrap();
    engine.build_heatmap_chunk(&[orion_nebula()], &berlin(), cursor).unwrap();
    let cached = engine.cache_stats().heatmap;

    clock.advance(Duration::hours(25));
    engine.build_heatmap_chunk(&[orion_nebula()], &berlin(), cursor).unwrap();
    let after = engine.cache_stats().heatmap;
    assert_eq!(after.hits, cached.hits);
    assert_eq!(after.expirations, cached.len as u64);
}

#[test]
fn test_simulated_planning_date_moves_the_anchor() {
    let (engine, _) = engine_at(utc(2025, 1, 10, 12, 0));
    let criteria = nightplan::api::ImagingCriteria::default();
    engine
        .scan_opportunities(&[orion_nebula()], &berlin(), Some(1), &criteria, None)
        .unwrap();
    assert_eq!(engine.cache_stats().opportunities.len, 1);

    let evicted = engine.set_planning_date(Some(date(2025, 3, 1)));
    assert_eq!(evicted, 1);
    assert_eq!(engine.simulated_date(), Some(date(2025, 3, 1)));
    assert_eq!(engine.tonight(&berlin()).unwrap(), date(2025, 3, 1));

    let report = engine
        .scan_opportunities(&[orion_nebula()], &berlin(), Some(1), &criteria, None)
        .unwrap();
    assert!(report.opportunities.iter().all(|o| o.date >= date(2025, 3, 1)));

    engine.set_planning_date(None);
    assert_eq!(engine.simulated_date(), None);
    assert_eq!(engine.tonight(&berlin()).unwrap(), date(2025, 1, 10));
    assert_eq!(engine.cache_stats().opportunities.len, 0);
}

#[test]
fn test_small_hours_anchor_on_the_night_in_progress() {
    // 02:00 in Berlin still belongs to the night of the 15th
    let (engine, _) = engine_at(utc(2025, 1, 16, 1, 0));
    let site = berlin();
    assert_eq!(engine.tonight(&site).unwrap(), date(2025, 1, 15));
    assert_eq!(engine.heatmap_start_cursor(&site).unwrap().start, date(2025, 1, 15));

    let chunk = engine
        .build_heatmap_chunk(&[orion_nebula()], &site, engine.heatmap_start_cursor(&site).unwrap())
        .unwrap();
    assert_eq!(chunk.month_start, date(2025, 1, 15));
    assert_eq!(chunk.cells.first().map(|c| c.date), Some(date(2025, 1, 15)));

    let criteria = nightplan::api::ImagingCriteria {
        min_observable_minutes: 60,
        min_max_altitude: 30.0,
        max_moon_illumination: 100.0,
        min_moon_separation: 0.0,
    };
    let report = engine
        .scan_opportunities(&[orion_nebula()], &site, Some(1), &criteria, None)
        .unwrap();
    let earliest = report.opportunities.iter().map(|o| o.date).min();
    assert_eq!(earliest, Some(date(2025, 1, 15)));
}

#[test]
fn test_edited_target_misses_the_cache() {
    let (engine, _) = engine_at(utc(2024, 12, 1, 12, 0));
    let original = orion_nebula();
    let moved = nightplan::api::Target {
        dec_degrees: -5.4,
        ..orion_nebula()
    };
    let night = date(2025, 1, 15);

    let a = engine.compute_observability_window(&original, &berlin(), night).unwrap();
    let b = engine.compute_observability_window(&moved, &berlin(), night).unwrap();
    assert!(b.max_altitude < a.max_altitude);
    assert_eq!(engine.cache_stats().windows.hits, 0);
}
