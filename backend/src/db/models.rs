//! Records owned by the catalog repository.
//!
//! The engine computes on [`Target`] and [`Location`](crate::api::Location);
//! the records below carry the user data a merge has to preserve.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::api::{LocationId, ProjectId, SessionId, Target, TargetId};

/// Target as stored, with the user's annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub target: Target,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub framing: Option<SavedFraming>,
}

impl TargetRecord {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            notes: String::new(),
            framing: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_framing(mut self, framing: SavedFraming) -> Self {
        self.framing = Some(framing);
        self
    }

    pub fn id(&self) -> TargetId {
        self.target.id
    }
}

/// Camera framing saved for a target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SavedFraming {
    pub center_ra_hours: f64,
    pub center_dec_degrees: f64,
    pub rotation_degrees: f64,
    pub fov_width_arcmin: f64,
    pub fov_height_arcmin: f64,
}

/// Imaging session on one night.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub id: SessionId,
    pub target_id: TargetId,
    pub location_id: LocationId,
    pub date: NaiveDate,
    #[serde(default)]
    pub notes: String,
}

/// Project grouping several targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub id: ProjectId,
    pub name: String,
    /// Ordered, without duplicates
    pub target_ids: Vec<TargetId>,
}
