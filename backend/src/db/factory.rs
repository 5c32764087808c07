//! Repository factory for dependency injection.
//!
//! Builds repository instances from runtime configuration.

use std::str::FromStr;
use std::sync::Arc;

use super::models::TargetRecord;
use super::repositories::LocalRepository;
use super::repository::CatalogRepository;
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};

/// Repository type configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryType {
    /// In-memory local repository
    Local,
}

impl FromStr for RepositoryType {
    type Err = String;

    /// Parse repository type from string.
    ///
    /// # Arguments
    /// * `s` - String representation ("local", "memory")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" | "memory" => Ok(Self::Local),
            _ => Err(format!("Unknown repository type: {}", s)),
        }
    }
}

impl RepositoryType {
    /// Get repository type from the `NIGHTPLAN_REPOSITORY` environment variable.
    ///
    /// Defaults to Local.
    pub fn from_env() -> Self {
        std::env::var("NIGHTPLAN_REPOSITORY")
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(Self::Local)
    }
}

/// Repository factory for creating repository instances.
pub struct RepositoryFactory;

impl RepositoryFactory {
    /// Create a repository instance based on type, seeded from the config's catalog.
    pub fn create(repo_type: RepositoryType, config: &EngineConfig) -> EngineResult<Arc<dyn CatalogRepository>> {
        match repo_type {
            RepositoryType::Local => Ok(Self::create_seeded(config)? as Arc<dyn CatalogRepository>),
        }
    }

    /// Create an empty in-memory local repository.
    pub fn create_local() -> Arc<dyn CatalogRepository> {
        Arc::new(LocalRepository::new())
    }

    /// Create an in-memory repository holding the catalog section of `config`.
    ///
    /// # Returns
    /// * `Err(EngineError)` - If a catalog location or target fails validation
    pub fn create_seeded(config: &EngineConfig) -> EngineResult<Arc<LocalRepository>> {
        let repo = LocalRepository::new();
        let locations = config.catalog_locations()?;
        let targets = config.catalog_targets()?;

        let mut seen = std::collections::HashSet::new();
        for target in &targets {
            if !seen.insert(target.id) {
                return Err(EngineError::Configuration(format!(
                    "duplicate catalog target id {}",
                    target.id
                )));
            }
        }

        log::info!(
            "Seeding local repository with {} locations and {} targets",
            locations.len(),
            targets.len()
        );
        for location in locations {
            repo.store_location(location);
        }
        for target in targets {
            repo.store_target(TargetRecord::new(target));
        }
        Ok(Arc::new(repo))
    }
}
