//! ChangeRequestManager - the approval workflow around sensitive edits.
//!
//! Two write paths into a task's sensitive fields, mutually exclusive per the
//! gate's decision:
//! - direct edit, when the gate allows it;
//! - change request -> approval, when the gate does not.
//! Taking the wrong path is a Conflict, so a client that raced a project lock
//! learns to re-fetch and switch paths instead of silently writing.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::{
    ChangeRequest, GovernanceError, RequestId, ResolveAction, Resolution, Task, TaskField, TaskId,
};
use crate::ports::{Clock, GovernanceStore};

use super::permission::PermissionGate;

#[derive(Clone)]
pub struct ChangeRequestManager {
    store: Arc<dyn GovernanceStore>,
    clock: Arc<dyn Clock>,
    gate: PermissionGate,
}

impl ChangeRequestManager {
    pub fn new(store: Arc<dyn GovernanceStore>, clock: Arc<dyn Clock>) -> Self {
        let gate = PermissionGate::new(Arc::clone(&store));
        Self { store, clock, gate }
    }

    /// Direct edit of a sensitive field.
    ///
    /// Conflict when the gate requires approval for this task: the caller
    /// must open a change request instead.
    pub async fn edit_direct(
        &self,
        task_id: TaskId,
        field: TaskField,
        value: &str,
    ) -> Result<Task, GovernanceError> {
        let value = field.validate_value(value)?;
        let decision = self.gate.evaluate(task_id).await?;
        if decision.requires_approval {
            return Err(GovernanceError::conflict(format!(
                "field {field} of task {task_id} is under approval governance; open a change request"
            )));
        }
        self.store
            .apply_task_field(task_id, field, &value, self.clock.now_utc())
            .await
    }

    /// Open a change request proposing a new value for a sensitive field.
    ///
    /// Requires a non-empty reason. Conflict when the gate allows a direct
    /// edit: a request would add an approval step nobody is going to perform.
    pub async fn create_request(
        &self,
        task_id: TaskId,
        field: TaskField,
        proposed_value: &str,
        reason: &str,
        requesting_user: &str,
    ) -> Result<ChangeRequest, GovernanceError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(GovernanceError::validation(
                "a change request needs a non-empty reason",
            ));
        }
        if requesting_user.trim().is_empty() {
            return Err(GovernanceError::validation("requesting user must be set"));
        }
        let proposed = field.validate_value(proposed_value)?;

        let decision = self.gate.evaluate(task_id).await?;
        if decision.can_edit_directly {
            return Err(GovernanceError::conflict(format!(
                "task {task_id} is not governed; edit the field directly"
            )));
        }

        let request = self
            .store
            .create_request(
                task_id,
                field,
                proposed,
                reason.to_string(),
                requesting_user.trim().to_string(),
                self.clock.now_utc(),
            )
            .await?;
        info!(
            request_id = %request.id,
            task_id = %task_id,
            field = %field,
            "change request opened"
        );
        Ok(request)
    }

    /// Approve or reject a pending request.
    ///
    /// Approval writes the proposed value into the task atomically with the
    /// status flip; last approval wins even when the base value drifted, but
    /// such resolutions are flagged `stale_base` and logged.
    pub async fn resolve(
        &self,
        request_id: RequestId,
        action: ResolveAction,
        resolver: &str,
        comment: Option<String>,
    ) -> Result<Resolution, GovernanceError> {
        if resolver.trim().is_empty() {
            return Err(GovernanceError::validation("resolver must be set"));
        }
        let resolution = self
            .store
            .resolve_request(
                request_id,
                action,
                resolver.trim().to_string(),
                comment,
                self.clock.now_utc(),
            )
            .await?;
        if resolution.stale_base {
            warn!(
                request_id = %request_id,
                task_id = %resolution.request.task_id,
                field = %resolution.request.field,
                "approved over a stale base value"
            );
        }
        Ok(resolution)
    }

    pub async fn get(&self, request_id: RequestId) -> Result<ChangeRequest, GovernanceError> {
        self.store
            .get_request(request_id)
            .await
            .ok_or_else(|| GovernanceError::not_found("change request", request_id))
    }

    /// Pending requests, oldest first.
    pub async fn list_pending(&self) -> Vec<ChangeRequest> {
        self.store.list_pending_requests().await
    }
}
