//! Duplicate detection and atomic merge against the in-memory repository.

mod support;

use nightplan::api::{LocationId, ProjectId, SessionId, TargetId};
use nightplan::db::{CatalogRepository, LocalRepository, ProjectRecord, SavedFraming, SessionRecord, TargetRecord};
use nightplan::services::coordinates::{dms_to_degrees, hms_to_hours};
use nightplan::EngineError;
use support::{berlin, date, engine_at, target, utc};

fn framing(rotation: f64) -> SavedFraming {
    SavedFraming {
        center_ra_hours: 0.712,
        center_dec_degrees: 41.27,
        rotation_degrees: rotation,
        fov_width_arcmin: 180.0,
        fov_height_arcmin: 120.0,
    }
}

/// M31 twice, a session on each, a project listing both and one listing only the second.
fn andromeda_catalog() -> LocalRepository {
    let repo = LocalRepository::new();
    repo.store_target(TargetRecord::new(target(1, "M31", 0.712, 41.27)).with_notes("narrowband"));
    repo.store_target(
        TargetRecord::new(target(2, "NGC 224", 0.7123, 41.269))
            .with_notes("imported from list")
            .with_framing(framing(15.0)),
    );
    for (id, target_id) in [(1, 1), (2, 2), (3, 2)] {
        repo.store_session(SessionRecord {
            id: SessionId(id),
            target_id: TargetId(target_id),
            location_id: LocationId(1),
            date: date(2024, 10, id as u32),
            notes: String::new(),
        });
    }
    repo.store_project(ProjectRecord {
        id: ProjectId(1),
        name: "Local group".to_string(),
        target_ids: vec![TargetId(2), TargetId(5), TargetId(1)],
    });
    repo.store_project(ProjectRecord {
        id: ProjectId(2),
        name: "Autumn".to_string(),
        target_ids: vec![TargetId(2)],
    });
    repo
}

async fn linkage(repo: &LocalRepository, survivor: TargetId) -> (usize, Vec<Vec<i64>>) {
    let sessions = repo.sessions_for_target(survivor).await.unwrap().len();
    let projects = repo
        .list_projects()
        .await
        .unwrap()
        .into_iter()
        .map(|p| {
            p.target_ids
                .into_iter()
                .map(|id| if id == survivor { 0 } else { id.value() })
                .collect()
        })
        .collect();
    (sessions, projects)
}

#[test]
fn test_near_identical_coordinates_are_candidates() {
    let a = target(1, "A", hms_to_hours(10.0, 0.0, 0.0), dms_to_degrees(20.0, 0.0, 0.0));
    let b = target(2, "B", hms_to_hours(10.0, 0.0, 4.0), dms_to_degrees(20.0, 2.0, 0.0));
    let c = target(3, "C", hms_to_hours(10.0, 0.0, 0.0), dms_to_degrees(20.0, 5.0, 0.0));

    let (engine, _) = engine_at(utc(2025, 1, 1, 12, 0));
    let candidates = engine.find_duplicates(&[a, b, c], None);
    assert_eq!(candidates.len(), 1);
    assert_eq!((candidates[0].first, candidates[0].second), (TargetId(1), TargetId(2)));
}

#[tokio::test]
async fn test_merge_relinks_everything() {
    let repo = andromeda_catalog();
    let (engine, _) = engine_at(utc(2025, 1, 1, 12, 0));

    let report = engine.merge_targets(&repo, TargetId(1), TargetId(2)).await.unwrap();
    assert_eq!(report.sessions_relinked, 2);
    assert_eq!(report.projects_relinked, 2);
    assert!(report.notes_appended);
    assert!(report.framing_transferred);

    let kept = repo.get_target(TargetId(1)).await.unwrap();
    assert_eq!(kept.notes, "narrowband\n\nimported from list");
    assert_eq!(kept.framing, Some(framing(15.0)));
    assert!(!repo.has_target(TargetId(2)));

    let projects = repo.list_projects().await.unwrap();
    assert_eq!(projects[0].target_ids, vec![TargetId(1), TargetId(5)]);
    assert_eq!(projects[1].target_ids, vec![TargetId(1)]);
}

#[tokio::test]
async fn test_merge_direction_only_changes_survivor() {
    let forward = andromeda_catalog();
    let backward = andromeda_catalog();

    nightplan::services::merge_targets(&forward, TargetId(1), TargetId(2)).await.unwrap();
    nightplan::services::merge_targets(&backward, TargetId(2), TargetId(1)).await.unwrap();

    assert_eq!(
        linkage(&forward, TargetId(1)).await,
        linkage(&backward, TargetId(2)).await
    );
}

#[tokio::test]
async fn test_kept_framing_is_retained() {
    let repo = andromeda_catalog();
    let report = nightplan::services::merge_targets(&repo, TargetId(2), TargetId(1)).await.unwrap();
    assert!(!report.framing_transferred);
    assert_eq!(repo.get_target(TargetId(2)).await.unwrap().framing, Some(framing(15.0)));
}

#[tokio::test]
async fn test_failed_merge_changes_nothing() {
    let repo = andromeda_catalog();
    let before_sessions = repo.sessions_for_target(TargetId(2)).await.unwrap();
    let before_projects = repo.list_projects().await.unwrap();

    repo.fail_next_merge();
    let err = nightplan::services::merge_targets(&repo, TargetId(1), TargetId(2))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Repository(_)));

    assert!(repo.has_target(TargetId(2)));
    assert_eq!(repo.sessions_for_target(TargetId(2)).await.unwrap(), before_sessions);
    assert_eq!(repo.list_projects().await.unwrap(), before_projects);
    assert_eq!(repo.get_target(TargetId(1)).await.unwrap().notes, "narrowband");

    // The failure is one-shot
    nightplan::services::merge_targets(&repo, TargetId(1), TargetId(2)).await.unwrap();
    assert!(!repo.has_target(TargetId(2)));
}

#[tokio::test]
async fn test_merge_validation() {
    let repo = andromeda_catalog();
    let err = nightplan::services::merge_targets(&repo, TargetId(1), TargetId(1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidMerge(_)));

    let err = nightplan::services::merge_targets(&repo, TargetId(1), TargetId(42))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidMerge(_)));
}

#[tokio::test]
async fn test_engine_merge_drops_cached_windows() {
    let repo = andromeda_catalog();
    let (engine, _) = engine_at(utc(2024, 12, 1, 12, 0));
    let dropped = repo.get_target(TargetId(2)).await.unwrap().target;
    engine
        .compute_observability_window(&dropped, &berlin(), date(2025, 1, 15))
        .unwrap();
    assert_eq!(engine.cache_stats().windows.len, 1);

    engine.merge_targets(&repo, TargetId(1), TargetId(2)).await.unwrap();
    assert_eq!(engine.cache_stats().windows.len, 0);
}
