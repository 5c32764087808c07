//! Error types for engine operations.
//!
//! Every public engine operation returns [`EngineResult`]. Lower-level failures
//! (repository, timezone resolution, configuration parsing) are wrapped into one
//! of the variants below before they reach the caller.

use crate::db::RepositoryError;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by the planning engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Right ascension, declination, latitude or longitude outside its valid range.
    #[error("Invalid coordinate: {field}={value} ({message})")]
    InvalidCoordinate {
        field: &'static str,
        value: f64,
        message: String,
    },

    /// Location record that cannot be used for computation.
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    /// Unknown or unresolvable IANA timezone identifier.
    #[error("Timezone error: {0}")]
    Timezone(String),

    /// Configuration value rejected at the boundary.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Merge request that can never succeed (same id twice, unknown id).
    #[error("Invalid merge: {0}")]
    InvalidMerge(String),

    /// Failure reported by the catalog repository.
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    /// Unexpected internal failure (e.g. a worker task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Create an invalid coordinate error.
    pub fn invalid_coordinate(field: &'static str, value: f64, message: impl Into<String>) -> Self {
        Self::InvalidCoordinate {
            field,
            value,
            message: message.into(),
        }
    }

    /// True if the error was caused by caller input rather than the engine.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidCoordinate { .. }
                | Self::InvalidLocation(_)
                | Self::Timezone(_)
                | Self::InvalidMerge(_)
        )
    }
}
