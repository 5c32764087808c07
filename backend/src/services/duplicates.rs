//! Duplicate object detection and merge.
//!
//! Catalog imports often bring the same object in twice under different names
//! (e.g. "M31" and "NGC 224"). Pairs closer than a threshold are reported as
//! merge candidates; the merge itself is applied atomically by the repository.

use crate::api::{MergeCandidate, MergeReport, Target, TargetId};
use crate::db::{CatalogRepository, RepositoryError};
use crate::error::{EngineError, EngineResult};
use crate::services::coordinates::angular_separation;

/// Separation below which two targets are considered the same object.
pub const DEFAULT_DUPLICATE_THRESHOLD_ARCMIN: f64 = 2.5;

/// Find pairs of enabled targets closer than `threshold_arcmin`.
///
/// Every pair is compared, so this is quadratic in the catalog size.
///
/// # Returns
/// Candidates with the lower id first, closest pairs first.
pub fn find_duplicates(catalog: &[Target], threshold_arcmin: f64) -> Vec<MergeCandidate> {
    let enabled: Vec<&Target> = catalog.iter().filter(|t| t.enabled).collect();

    let mut candidates = Vec::new();
    for (i, a) in enabled.iter().enumerate() {
        for b in &enabled[i + 1..] {
            if a.id == b.id {
                continue;
            }
            let separation_arcmin = angular_separation(a.ra_hours, a.dec_degrees, b.ra_hours, b.dec_degrees) * 60.0;
            if separation_arcmin < threshold_arcmin {
                let (first, second) = if a.id < b.id { (a.id, b.id) } else { (b.id, a.id) };
                candidates.push(MergeCandidate {
                    first,
                    second,
                    separation_arcmin,
                });
            }
        }
    }

    candidates.sort_by(|x, y| {
        x.separation_arcmin
            .total_cmp(&y.separation_arcmin)
            .then(x.first.cmp(&y.first))
            .then(x.second.cmp(&y.second))
    });
    log::debug!(
        "{} duplicate candidates among {} enabled targets (threshold {}')",
        candidates.len(),
        enabled.len(),
        threshold_arcmin
    );
    candidates
}

/// Merge `drop` into `keep`.
///
/// # Arguments
/// * `repo` - Catalog repository applying the merge atomically
/// * `keep` - Target that survives; its framing wins over `drop`'s
/// * `drop` - Target that is deleted
///
/// # Returns
/// * `Err(EngineError::InvalidMerge)` - If the ids are equal or either is unknown
/// * `Err(EngineError::Repository)` - If the repository failed; nothing was changed
pub async fn merge_targets(repo: &dyn CatalogRepository, keep: TargetId, drop: TargetId) -> EngineResult<MergeReport> {
    if keep == drop {
        return Err(EngineError::InvalidMerge(format!(
            "cannot merge target {} into itself",
            keep
        )));
    }

    for id in [keep, drop] {
        match repo.get_target(id).await {
            Ok(_) => {}
            Err(RepositoryError::NotFound { .. }) => {
                return Err(EngineError::InvalidMerge(format!("target {} does not exist", id)));
            }
            Err(e) => return Err(e.into()),
        }
    }

    let report = repo.merge_targets(keep, drop).await.map_err(|e| {
        log::warn!(
            "merge of target {} into {} failed during {}{}: {}",
            drop,
            keep,
            e.context().operation.as_deref().unwrap_or("merge"),
            if e.is_retryable() { " (retryable)" } else { "" },
            e
        );
        e
    })?;
    log::info!(
        "target {} merged into {} ({} sessions, {} projects)",
        drop,
        keep,
        report.sessions_relinked,
        report.projects_relinked
    );
    Ok(report)
}
