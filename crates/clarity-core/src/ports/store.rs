//! GovernanceStore port - the persistence seam.
//!
//! Design principles:
//! - The store is the single source of truth for tasks, projects, change
//!   requests, recurrence rows and monthly entries.
//! - Every mutating method is one atomic transaction: the state-dependent
//!   re-checks (request still Pending, child not already parented, current
//!   max part number) run under the same lock/transaction that performs the
//!   write, so a partial write can never be observed.
//! - Idempotent upserts are keyed by the schema-level uniqueness invariants
//!   (task+date, task+year+month), not by check-then-insert logic.
//!
//! Engines do the pure input validation before calling in; the store owns the
//! concurrent-state checks.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::{
    ChangeRequest, GovernanceError, InstanceState, MonthlyHistory, Project, ProjectId,
    ProjectType, RecurrenceInstance, RecurrencePattern, RequestId, ResolveAction, Resolution,
    Task, TaskBehavior, TaskField, TaskId,
};

/// Seed data for creating a task (ordinary creation is a thin CRUD concern;
/// this exists so the CLI and tests can populate the read-model).
#[derive(Debug, Clone)]
pub struct TaskSeed {
    pub project_id: ProjectId,
    pub title: String,
    pub behavior: TaskBehavior,
    pub planned_start_date: Option<NaiveDate>,
    pub target_date: Option<NaiveDate>,
    pub officialized: bool,
}

impl TaskSeed {
    pub fn new(project_id: ProjectId, title: impl Into<String>, behavior: TaskBehavior) -> Self {
        Self {
            project_id,
            title: title.into(),
            behavior,
            planned_start_date: None,
            target_date: None,
            officialized: false,
        }
    }
}

#[async_trait]
pub trait GovernanceStore: Send + Sync {
    // ---- read model / seeding ----

    async fn insert_project(&self, name: &str, project_type: ProjectType, locked: bool)
    -> Project;

    async fn insert_task(&self, seed: TaskSeed, now: DateTime<Utc>) -> Task;

    async fn get_project(&self, id: ProjectId) -> Option<Project>;

    async fn get_task(&self, id: TaskId) -> Option<Task>;

    /// External collaborator action: toggle the project lock.
    async fn set_project_locked(&self, id: ProjectId, locked: bool)
    -> Result<(), GovernanceError>;

    // ---- direct edits & change requests ----

    /// Write a validated value into a task field (the direct-edit path; the
    /// engine has already consulted the permission gate).
    async fn apply_task_field(
        &self,
        task_id: TaskId,
        field: TaskField,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<Task, GovernanceError>;

    /// Create a Pending change request, capturing the field's current value
    /// as `previous_value` inside the same transaction.
    async fn create_request(
        &self,
        task_id: TaskId,
        field: TaskField,
        proposed_value: String,
        reason: String,
        requesting_user: String,
        now: DateTime<Utc>,
    ) -> Result<ChangeRequest, GovernanceError>;

    async fn get_request(&self, id: RequestId) -> Option<ChangeRequest>;

    /// Pending requests, oldest first.
    async fn list_pending_requests(&self) -> Vec<ChangeRequest>;

    /// Resolve a Pending request. Approval re-checks the Pending state and
    /// writes the proposed value into the task in the same transaction;
    /// rejection never touches the task. Terminal requests fail with
    /// `ApprovalState`.
    async fn resolve_request(
        &self,
        id: RequestId,
        action: ResolveAction,
        resolver: String,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Resolution, GovernanceError>;

    // ---- recurrence ----

    /// Create or replace the single pattern row for a task.
    async fn upsert_pattern(&self, pattern: RecurrencePattern) -> RecurrencePattern;

    async fn get_pattern(&self, task_id: TaskId) -> Option<RecurrencePattern>;

    /// Upsert the (task, date) instance row; last write wins.
    async fn upsert_instance(
        &self,
        task_id: TaskId,
        scheduled_date: NaiveDate,
        state: InstanceState,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> RecurrenceInstance;

    /// Persisted instances only (the engine synthesizes Pending rows).
    async fn list_instances(&self, task_id: TaskId) -> Vec<RecurrenceInstance>;

    // ---- monthly progress ----

    /// Upsert the (task, year, month) entry, recompute every accumulated
    /// value, and mirror the cumulative into the task's completion (flipping
    /// the task to Done when it reaches 100) - all in one transaction.
    async fn upsert_month(
        &self,
        task_id: TaskId,
        year: i32,
        month: u32,
        percentage: f64,
        comment: Option<String>,
        recorded_by: String,
        now: DateTime<Utc>,
    ) -> Result<MonthlyHistory, GovernanceError>;

    /// Entries ordered (year, month) ascending plus the current cumulative.
    async fn monthly_history(&self, task_id: TaskId) -> MonthlyHistory;

    // ---- phase groups ----

    /// Mark a task as a phase container (self-referencing group id).
    /// Idempotent: converting an existing group is a no-op success.
    async fn ensure_group(&self, task_id: TaskId, now: DateTime<Utc>)
    -> Result<Task, GovernanceError>;

    /// Attach an existing task as the next phase of a group. The part number
    /// is `max(existing) + 1`, computed against a serialized read of the
    /// current children inside the same transaction.
    async fn attach_phase(
        &self,
        group_id: TaskId,
        child_id: TaskId,
        now: DateTime<Utc>,
    ) -> Result<Task, GovernanceError>;

    /// Children of a group ordered by part number ascending (the group task
    /// itself is not listed).
    async fn list_phases(&self, group_id: TaskId) -> Vec<Task>;
}
