//! Repository implementations module.
//!
//! - `local`: in-memory implementation for tests, local development and the worker
pub mod local;

pub use local::LocalRepository;
