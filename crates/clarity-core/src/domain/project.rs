//! Project read-model.
//!
//! Projects are owned by an external collaborator; this core only reads them
//! to make the lock decision. The lock toggle ("officialization") happens
//! outside and can flip between any two calls, which is why the permission
//! gate never caches its answer.

use serde::{Deserialize, Serialize};

use super::ids::ProjectId;

/// Project category. Strategic projects are subject to mandatory approval
/// for sensitive-field edits once locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectType {
    Operational,
    Strategic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub project_type: ProjectType,

    /// Whether the project has been officialized. Direct edits to protected
    /// task fields are disabled while this is set (Strategic projects only).
    pub locked: bool,
}

impl Project {
    pub fn new(id: ProjectId, name: impl Into<String>, project_type: ProjectType) -> Self {
        Self {
            id,
            name: name.into(),
            project_type,
            locked: false,
        }
    }
}
