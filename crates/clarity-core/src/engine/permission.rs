//! PermissionGate - decides whether a sensitive field may be edited directly.
//!
//! The rule is project-scoped: only strategic projects govern edits, and only
//! once the project is locked or the individual task has been officialized.
//! Operational projects never require approval regardless of flags.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::{GovernanceError, ProjectType, TaskId};
use crate::ports::GovernanceStore;

/// Answer to "may this user edit the task's sensitive fields right now?".
///
/// `can_edit_directly` and `requires_approval` are always complementary; both
/// are carried so the JSON boundary can render the decision without callers
/// re-deriving one from the other.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PermissionDecision {
    pub can_edit_directly: bool,
    pub requires_approval: bool,
    pub project_type: ProjectType,
}

#[derive(Clone)]
pub struct PermissionGate {
    store: Arc<dyn GovernanceStore>,
}

impl PermissionGate {
    pub fn new(store: Arc<dyn GovernanceStore>) -> Self {
        Self { store }
    }

    /// Evaluate the gate for a task.
    ///
    /// Fails NotFound when the task or its project is missing; a dangling
    /// project reference is a data problem, not an implicit "allow".
    pub async fn evaluate(&self, task_id: TaskId) -> Result<PermissionDecision, GovernanceError> {
        let task = self
            .store
            .get_task(task_id)
            .await
            .ok_or_else(|| GovernanceError::not_found("task", task_id))?;
        let project = self
            .store
            .get_project(task.project_id)
            .await
            .ok_or_else(|| GovernanceError::not_found("project", task.project_id))?;

        let governed = project.project_type == ProjectType::Strategic
            && (project.locked || task.officialized);

        Ok(PermissionDecision {
            can_edit_directly: !governed,
            requires_approval: governed,
            project_type: project.project_type,
        })
    }
}
