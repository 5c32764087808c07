//! In-memory local repository implementation.
//!
//! All data lives in ordered maps behind one lock, giving fast, deterministic
//! and isolated behavior for tests, local development and the worker binary
//! seeded from the config file.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::api::{Location, LocationId, MergeReport, ProjectId, SessionId, Target, TargetId};
use crate::db::models::{ProjectRecord, SessionRecord, TargetRecord};
use crate::db::repository::{CatalogRepository, ErrorContext, RepositoryError, RepositoryResult};

/// In-memory local repository.
///
/// # Example
/// ```
/// use nightplan::api::{Target, TargetId};
/// use nightplan::db::{CatalogRepository, LocalRepository, TargetRecord};
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let repo = LocalRepository::new();
/// repo.store_target(TargetRecord::new(Target::new(TargetId(1), "M31", 0.712, 41.27).unwrap()));
///
/// let targets = repo.list_targets().await.unwrap();
/// assert_eq!(targets.len(), 1);
/// # });
/// ```
#[derive(Clone)]
pub struct LocalRepository {
    data: Arc<RwLock<LocalData>>,
}

#[derive(Clone)]
struct LocalData {
    locations: BTreeMap<LocationId, Location>,
    targets: BTreeMap<TargetId, TargetRecord>,
    sessions: BTreeMap<SessionId, SessionRecord>,
    projects: BTreeMap<ProjectId, ProjectRecord>,

    // Connection health
    is_healthy: bool,
    // Abort the next merge after re-linking, before commit
    fail_next_merge: bool,
}

impl Default for LocalData {
    fn default() -> Self {
        Self {
            locations: BTreeMap::new(),
            targets: BTreeMap::new(),
            sessions: BTreeMap::new(),
            projects: BTreeMap::new(),
            is_healthy: true,
            fail_next_merge: false,
        }
    }
}

/// Changes a merge applied to the staged copy.
struct StagedMerge {
    sessions_relinked: usize,
    projects_relinked: usize,
    notes_appended: bool,
    framing_transferred: bool,
}

impl LocalRepository {
    /// Create a new empty local repository.
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(LocalData::default())),
        }
    }

    /// Insert or replace a location.
    pub fn store_location(&self, location: Location) {
        self.data.write().locations.insert(location.id, location);
    }

    /// Insert or replace a target record.
    pub fn store_target(&self, record: TargetRecord) {
        self.data.write().targets.insert(record.id(), record);
    }

    /// Insert or replace a session.
    pub fn store_session(&self, session: SessionRecord) {
        self.data.write().sessions.insert(session.id, session);
    }

    /// Insert or replace a project.
    pub fn store_project(&self, project: ProjectRecord) {
        self.data.write().projects.insert(project.id, project);
    }

    /// Set the health status for testing connection failures.
    pub fn set_healthy(&self, healthy: bool) {
        self.data.write().is_healthy = healthy;
    }

    /// Make the next merge fail after it has re-linked sessions and projects,
    /// for testing that a failed merge leaves no trace.
    pub fn fail_next_merge(&self) {
        self.data.write().fail_next_merge = true;
    }

    /// Clear all data from the repository.
    pub fn clear(&self) {
        let mut data = self.data.write();
        *data = LocalData {
            is_healthy: data.is_healthy,
            ..Default::default()
        };
    }

    /// Get the number of targets stored.
    pub fn target_count(&self) -> usize {
        self.data.read().targets.len()
    }

    /// Check if a target exists.
    pub fn has_target(&self, target_id: TargetId) -> bool {
        self.data.read().targets.contains_key(&target_id)
    }

    /// Helper to check health and return error if unhealthy.
    fn check_health(data: &LocalData) -> RepositoryResult<()> {
        if !data.is_healthy {
            return Err(RepositoryError::connection("Repository is not healthy"));
        }
        Ok(())
    }

    /// Apply a merge to `staged`; the caller commits it by swapping it in.
    fn stage_merge(staged: &mut LocalData, keep: TargetId, drop: TargetId) -> RepositoryResult<StagedMerge> {
        let dropped = staged.targets.remove(&drop).ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Target {} not found", drop),
                ErrorContext::new("merge_targets").with_entity("target").with_entity_id(drop),
            )
        })?;
        let kept = staged.targets.get_mut(&keep).ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Target {} not found", keep),
                ErrorContext::new("merge_targets").with_entity("target").with_entity_id(keep),
            )
        })?;

        let notes_appended = !dropped.notes.trim().is_empty();
        if notes_appended {
            kept.notes = if kept.notes.trim().is_empty() {
                dropped.notes.clone()
            } else {
                format!("{}\n\n{}", kept.notes, dropped.notes)
            };
        }

        // The kept target's framing wins
        let framing_transferred = kept.framing.is_none() && dropped.framing.is_some();
        if framing_transferred {
            kept.framing = dropped.framing;
        }

        let mut sessions_relinked = 0;
        for session in staged.sessions.values_mut() {
            if session.target_id == drop {
                session.target_id = keep;
                sessions_relinked += 1;
            }
        }

        let mut projects_relinked = 0;
        for project in staged.projects.values_mut() {
            if !project.target_ids.contains(&drop) {
                continue;
            }
            let mut relinked = Vec::with_capacity(project.target_ids.len());
            for id in project.target_ids.iter().map(|&id| if id == drop { keep } else { id }) {
                if !relinked.contains(&id) {
                    relinked.push(id);
                }
            }
            project.target_ids = relinked;
            projects_relinked += 1;
        }

        Ok(StagedMerge {
            sessions_relinked,
            projects_relinked,
            notes_appended,
            framing_transferred,
        })
    }
}

impl Default for LocalRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogRepository for LocalRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        Ok(self.data.read().is_healthy)
    }

    async fn list_locations(&self) -> RepositoryResult<Vec<Location>> {
        let data = self.data.read();
        Self::check_health(&data)?;
        Ok(data.locations.values().cloned().collect())
    }

    async fn get_location(&self, location_id: LocationId) -> RepositoryResult<Location> {
        let data = self.data.read();
        Self::check_health(&data)?;
        data.locations.get(&location_id).cloned().ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Location {} not found", location_id),
                ErrorContext::new("get_location")
                    .with_entity("location")
                    .with_entity_id(location_id),
            )
        })
    }

    async fn list_targets(&self) -> RepositoryResult<Vec<Target>> {
        let data = self.data.read();
        Self::check_health(&data)?;
        Ok(data.targets.values().map(|r| r.target.clone()).collect())
    }

    async fn get_target(&self, target_id: TargetId) -> RepositoryResult<TargetRecord> {
        let data = self.data.read();
        Self::check_health(&data)?;
        data.targets.get(&target_id).cloned().ok_or_else(|| {
            RepositoryError::not_found_with_context(
                format!("Target {} not found", target_id),
                ErrorContext::new("get_target").with_entity("target").with_entity_id(target_id),
            )
        })
    }

    async fn sessions_for_target(&self, target_id: TargetId) -> RepositoryResult<Vec<SessionRecord>> {
        let data = self.data.read();
        Self::check_health(&data)?;
        Ok(data
            .sessions
            .values()
            .filter(|s| s.target_id == target_id)
            .cloned()
            .collect())
    }

    async fn list_projects(&self) -> RepositoryResult<Vec<ProjectRecord>> {
        let data = self.data.read();
        Self::check_health(&data)?;
        Ok(data.projects.values().cloned().collect())
    }

    async fn merge_targets(&self, keep: TargetId, drop: TargetId) -> RepositoryResult<MergeReport> {
        if keep == drop {
            return Err(RepositoryError::validation_with_context(
                format!("cannot merge target {} into itself", keep),
                ErrorContext::new("merge_targets").with_entity("target").with_entity_id(keep),
            ));
        }

        // Hold the write lock for the whole merge so readers never see a half-applied state
        let mut data = self.data.write();
        Self::check_health(&data)?;

        let mut staged = data.clone();
        let outcome = Self::stage_merge(&mut staged, keep, drop)?;

        if data.fail_next_merge {
            data.fail_next_merge = false;
            return Err(RepositoryError::transaction_with_context(
                "merge aborted before commit",
                ErrorContext::new("merge_targets")
                    .with_entity("target")
                    .with_entity_id(drop)
                    .with_details("injected failure"),
            ));
        }

        *data = staged;
        log::info!(
            "Merged target {} into {}: {} sessions, {} projects re-linked",
            drop,
            keep,
            outcome.sessions_relinked,
            outcome.projects_relinked
        );

        Ok(MergeReport {
            kept: keep,
            dropped: drop,
            sessions_relinked: outcome.sessions_relinked,
            projects_relinked: outcome.projects_relinked,
            notes_appended: outcome.notes_appended,
            framing_transferred: outcome.framing_transferred,
        })
    }
}
