//! Catalog repository trait.
//!
//! The engine reads locations and targets through this trait and asks it to
//! apply target merges. Implementations must make [`CatalogRepository::merge_targets`]
//! all-or-nothing.

pub mod error;

use async_trait::async_trait;

pub use error::{ErrorContext, RepositoryError, RepositoryResult};

use crate::api::{Location, LocationId, MergeReport, Target, TargetId};
use crate::db::models::{ProjectRecord, SessionRecord, TargetRecord};

/// Storage collaborator for the planning engine.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Check if the backing store is reachable.
    ///
    /// # Returns
    /// - `Ok(true)` if the store is healthy
    /// - `Ok(false)` if it is unhealthy but no error occurred
    async fn health_check(&self) -> RepositoryResult<bool>;

    /// All configured observing locations, including inactive ones.
    async fn list_locations(&self) -> RepositoryResult<Vec<Location>>;

    /// Retrieve one location.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If the location doesn't exist
    async fn get_location(&self, location_id: LocationId) -> RepositoryResult<Location>;

    /// All targets, enabled or not.
    async fn list_targets(&self) -> RepositoryResult<Vec<Target>>;

    /// Retrieve one target with its notes and saved framing.
    ///
    /// # Returns
    /// * `Err(RepositoryError::NotFound)` - If the target doesn't exist
    async fn get_target(&self, target_id: TargetId) -> RepositoryResult<TargetRecord>;

    /// Imaging sessions linked to a target.
    async fn sessions_for_target(&self, target_id: TargetId) -> RepositoryResult<Vec<SessionRecord>>;

    /// All projects.
    async fn list_projects(&self) -> RepositoryResult<Vec<ProjectRecord>>;

    /// Fold `drop` into `keep` and delete `drop`.
    ///
    /// Sessions and projects pointing at `drop` are re-linked to `keep`,
    /// `drop`'s notes are appended to `keep`'s and its framing moves over when
    /// `keep` has none. Either every change is applied or none is.
    ///
    /// # Arguments
    /// * `keep` - Target that survives
    /// * `drop` - Target that is removed
    async fn merge_targets(&self, keep: TargetId, drop: TargetId) -> RepositoryResult<MergeReport>;
}
