//! PhaseGroupManager - splitting a task into sequential phases.
//!
//! A group is an ordinary task whose group id points at itself. Phases are
//! ordinary tasks attached underneath, numbered in attachment order starting
//! at 1. The group task itself carries no part number and never appears in
//! its own phase list.

use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::domain::{GovernanceError, Task, TaskId, TaskStatus};
use crate::ports::{Clock, GovernanceStore};

/// Read-only rollup over a group's phases.
#[derive(Debug, Clone, Serialize)]
pub struct GroupProgress {
    pub group_id: TaskId,
    pub phase_count: usize,
    pub completed_phases: usize,
    /// Mean of the phases' completion percentages; 0 for an empty group.
    pub average_completion: f64,
}

#[derive(Clone)]
pub struct PhaseGroupManager {
    store: Arc<dyn GovernanceStore>,
    clock: Arc<dyn Clock>,
}

impl PhaseGroupManager {
    pub fn new(store: Arc<dyn GovernanceStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Turn a task into a phase container. Idempotent.
    pub async fn convert_to_group(&self, task_id: TaskId) -> Result<Task, GovernanceError> {
        let group = self.store.ensure_group(task_id, self.clock.now_utc()).await?;
        info!(group_id = %group.id, "task converted to phase group");
        Ok(group)
    }

    /// Attach a task as the next phase of a group.
    ///
    /// Attaching to a plain task converts it into a group first, so callers
    /// can build a group by attaching alone.
    pub async fn attach_phase(
        &self,
        group_id: TaskId,
        child_id: TaskId,
    ) -> Result<Task, GovernanceError> {
        if group_id == child_id {
            return Err(GovernanceError::validation(
                "a task cannot be attached as a phase of itself",
            ));
        }
        let child = self
            .store
            .attach_phase(group_id, child_id, self.clock.now_utc())
            .await?;
        info!(
            group_id = %group_id,
            child_id = %child_id,
            part_number = child.part_number,
            "phase attached"
        );
        Ok(child)
    }

    /// Phases of a group ordered by part number. Empty for a task that is
    /// not (yet) a group.
    pub async fn list_phases(&self, group_id: TaskId) -> Result<Vec<Task>, GovernanceError> {
        self.store
            .get_task(group_id)
            .await
            .ok_or_else(|| GovernanceError::not_found("task", group_id))?;
        Ok(self.store.list_phases(group_id).await)
    }

    /// Aggregate completion over the group's phases.
    pub async fn group_progress(&self, group_id: TaskId) -> Result<GroupProgress, GovernanceError> {
        let phases = self.list_phases(group_id).await?;
        let phase_count = phases.len();
        let completed_phases = phases
            .iter()
            .filter(|t| t.status == TaskStatus::Done)
            .count();
        let average_completion = if phases.is_empty() {
            0.0
        } else {
            phases.iter().map(|t| f64::from(t.completion)).sum::<f64>() / phase_count as f64
        };
        Ok(GroupProgress {
            group_id,
            phase_count,
            completed_phases,
            average_completion,
        })
    }
}
