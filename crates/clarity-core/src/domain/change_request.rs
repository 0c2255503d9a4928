//! Change request record: a proposed field mutation awaiting approval.
//!
//! Lifecycle: created Pending, transitions exactly once to Approved (which
//! atomically writes the proposed value into the task) or Rejected (terminal,
//! no task mutation). A Pending request never mutates the task.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ids::{RequestId, TaskId};
use super::task::TaskField;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Approved | RequestStatus::Rejected)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        };
        name.fmt(f)
    }
}

/// Requested action when resolving a change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResolveAction {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub id: RequestId,
    pub task_id: TaskId,
    pub requesting_user: String,
    pub field: TaskField,

    /// Value of `field` at creation time, captured for audit/diff purposes.
    /// Resolution does not re-read it.
    pub previous_value: Option<String>,
    pub proposed_value: String,

    /// Why the change is needed. Required, non-empty.
    pub reason: String,

    pub status: RequestStatus,
    pub requested_at: DateTime<Utc>,

    pub resolved_by: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolution_comment: Option<String>,
}

/// Outcome of a resolution, including the staleness flag for approvals whose
/// base value diverged while the request was open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub request: ChangeRequest,

    /// True when the task's field no longer matched the captured
    /// `previous_value` at resolution time. The approval still applies
    /// (last-approval-wins) but callers may want to audit.
    pub stale_base: bool,
}
