//! Opportunity scanning with the real window calculator.

mod support;

use nightplan::api::{ImagingCriteria, Target, TargetId};
use nightplan::error::EngineError;
use nightplan::config::EngineConfig;
use nightplan::services::opportunities::{scan_opportunities, DirectEvaluator, ScanRequest, WorkBudget};
use support::{berlin, date, engine_at, engine_with, orion_nebula, target, utc};

fn winter_criteria() -> ImagingCriteria {
    ImagingCriteria {
        min_observable_minutes: 120,
        min_max_altitude: 30.0,
        max_moon_illumination: 100.0,
        min_moon_separation: 0.0,
    }
}

#[test]
fn test_orion_has_january_opportunities() {
    let (engine, _) = engine_at(utc(2025, 1, 1, 12, 0));
    let report = engine
        .scan_opportunities(&[orion_nebula()], &berlin(), Some(1), &winter_criteria(), None)
        .unwrap();

    assert!(report.is_complete());
    assert_eq!(report.evaluated_nights, 31);
    assert!(!report.opportunities.is_empty());
    for opportunity in &report.opportunities {
        assert!(opportunity.observable_minutes >= 120);
        assert!(opportunity.max_altitude >= 30.0);
        assert!((0.0..=100.0).contains(&opportunity.rating));
        assert!(opportunity.date >= date(2025, 1, 1) && opportunity.date < date(2025, 2, 1));
    }
    for pair in report.opportunities.windows(2) {
        assert!(pair[0].rating >= pair[1].rating);
    }
}

#[test]
fn test_moon_limit_filters_bright_nights() {
    let (engine, _) = engine_at(utc(2025, 1, 1, 12, 0));
    let all = engine
        .scan_opportunities(&[orion_nebula()], &berlin(), Some(1), &winter_criteria(), None)
        .unwrap();
    let dark_only = ImagingCriteria {
        max_moon_illumination: 25.0,
        ..winter_criteria()
    };
    let dark = engine
        .scan_opportunities(&[orion_nebula()], &berlin(), Some(1), &dark_only, None)
        .unwrap();

    assert!(dark.opportunities.len() < all.opportunities.len());
    assert!(dark.opportunities.iter().all(|o| o.moon_illumination <= 25.0));
}

#[test]
fn test_unreachable_target_costs_no_evaluations() {
    let (engine, _) = engine_at(utc(2025, 1, 1, 12, 0));
    // Dec -50 culminates at -12° from latitude 52
    let southern = target(7, "Southern", 13.4, -50.0);
    let report = engine
        .scan_opportunities(&[southern], &berlin(), Some(3), &winter_criteria(), None)
        .unwrap();

    assert!(report.opportunities.is_empty());
    assert_eq!(report.evaluated_nights, 0);
    assert_eq!(report.skipped_targets, vec![TargetId(7)]);
    assert_eq!(engine.cache_stats().windows.insertions, 0);
}

#[test]
fn test_budget_exhaustion_returns_resume_point() {
    let mut config = EngineConfig::default();
    config.scanner.max_evaluations = Some(10);
    let (engine, _) = engine_with(config, utc(2025, 1, 1, 12, 0));

    let report = engine
        .scan_opportunities(&[orion_nebula()], &berlin(), Some(1), &winter_criteria(), None)
        .unwrap();
    assert_eq!(report.evaluated_nights, 10);
    let resume = report.resume.expect("budget should run out");
    assert_eq!(resume.target_index, 0);
    assert_eq!(resume.date, date(2025, 1, 11));
    assert_eq!(engine.cache_stats().opportunities.len, 0);
}

#[test]
fn test_engine_scan_resumes_until_complete() {
    let mut config = EngineConfig::default();
    config.scanner.max_evaluations = Some(10);
    let (engine, _) = engine_with(config, utc(2025, 1, 1, 12, 0));
    let targets = [orion_nebula()];

    let first = engine
        .scan_opportunities(&targets, &berlin(), Some(1), &winter_criteria(), None)
        .unwrap();
    let mut resume = first.resume;
    let mut evaluated = first.evaluated_nights;
    let mut dates: Vec<_> = first.opportunities.iter().map(|o| o.date).collect();
    let mut calls = 1;
    while let Some(point) = resume {
        let part = engine
            .scan_opportunities_from(&targets, &berlin(), Some(1), &winter_criteria(), None, Some(point))
            .unwrap();
        assert!(part.evaluated_nights > 0);
        if let Some(next) = part.resume {
            assert!(next.date > point.date);
        }
        evaluated += part.evaluated_nights;
        dates.extend(part.opportunities.iter().map(|o| o.date));
        resume = part.resume;
        calls += 1;
    }

    assert_eq!(calls, 4);
    assert_eq!(evaluated, 31);
    dates.sort();
    let (full_engine, _) = engine_at(utc(2025, 1, 1, 12, 0));
    let full = full_engine
        .scan_opportunities(&targets, &berlin(), Some(1), &winter_criteria(), None)
        .unwrap();
    let mut expected: Vec<_> = full.opportunities.iter().map(|o| o.date).collect();
    expected.sort();
    assert_eq!(dates, expected);
}

#[test]
fn test_invalid_coordinates_rejected_by_engine() {
    let (engine, _) = engine_at(utc(2025, 1, 1, 12, 0));
    let bad = Target {
        dec_degrees: 95.0,
        ..orion_nebula()
    };
    let invalid = |err: EngineError| matches!(err, EngineError::InvalidCoordinate { field: "dec_degrees", .. });

    assert!(invalid(
        engine.compute_position(&bad, &berlin(), utc(2025, 1, 1, 22, 0)).unwrap_err()
    ));
    assert!(invalid(
        engine
            .compute_observability_window(&bad, &berlin(), date(2025, 1, 15))
            .unwrap_err()
    ));
    assert!(invalid(
        engine
            .scan_opportunities(&[orion_nebula(), bad.clone()], &berlin(), Some(1), &winter_criteria(), None)
            .unwrap_err()
    ));
    let bad_ra = Target {
        ra_hours: 24.5,
        ..orion_nebula()
    };
    assert!(matches!(
        engine.build_heatmap_chunk(&[bad_ra], &berlin(), engine.heatmap_start_cursor(&berlin()).unwrap()),
        Err(EngineError::InvalidCoordinate { field: "ra_hours", .. })
    ));

    let stats = engine.cache_stats();
    assert_eq!(stats.positions.insertions + stats.windows.insertions + stats.heatmap.insertions, 0);
}

#[test]
fn test_resumed_scan_covers_the_rest() {
    let evaluator = DirectEvaluator::default();
    let targets = [orion_nebula(), target(2, "Pleiades", 3.79, 24.1)];
    let base = ScanRequest::new(date(2025, 1, 1), 1, winter_criteria());

    let full = scan_opportunities(&evaluator, &targets, &berlin(), &base).unwrap();

    let mut evaluated = 0;
    let mut found = Vec::new();
    let mut request = base.clone().with_budget(WorkBudget::evaluations(20));
    loop {
        let part = scan_opportunities(&evaluator, &targets, &berlin(), &request).unwrap();
        evaluated += part.evaluated_nights;
        found.extend(part.opportunities);
        match part.resume {
            Some(resume) => request = request.resuming(resume),
            None => break,
        }
    }

    assert_eq!(evaluated, full.evaluated_nights);
    assert_eq!(found.len(), full.opportunities.len());
}

#[test]
fn test_inactive_location_yields_empty_report() {
    let (engine, _) = engine_at(utc(2025, 1, 1, 12, 0));
    let report = engine
        .scan_opportunities(
            &[orion_nebula()],
            &berlin().with_active(false),
            Some(1),
            &winter_criteria(),
            None,
        )
        .unwrap();
    assert_eq!(report.evaluated_nights, 0);
    assert!(report.opportunities.is_empty());
}
