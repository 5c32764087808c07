//! Catalog storage.
//!
//! The engine never talks to a database directly. It reads locations and
//! targets through the [`CatalogRepository`] trait and delegates the atomic
//! part of a target merge to it.
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  PlanningEngine / Supervisor                 │
//! └───────────────────┬─────────────────────────┘
//!                     │
//! ┌───────────────────▼─────────────────────────┐
//! │  Repository Trait (repository) - Interface   │
//! └───────────────────┬─────────────────────────┘
//!                     │
//!     ┌───────────────▼──────────────────┐
//!     │        Local Repository           │
//!     │          (in-memory)              │
//!     └──────────────────────────────────┘
//! ```

pub mod factory;
pub mod models;
pub mod repositories;
pub mod repository;

pub use factory::{RepositoryFactory, RepositoryType};
pub use models::{ProjectRecord, SavedFraming, SessionRecord, TargetRecord};
pub use repositories::LocalRepository;
pub use repository::{CatalogRepository, ErrorContext, RepositoryError, RepositoryResult};
