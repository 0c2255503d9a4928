//! Task record: the unit every workflow component operates on.
//!
//! Design:
//! - This is the single source of truth for task state.
//! - State transitions happen via methods, not direct field pokes, so the
//!   side-channel timestamps (started_at / completed_at) stay consistent.
//! - `behavior` is a closed tagged variant. Each engine validates the tag
//!   before acting instead of inferring behavior from which sidecar rows
//!   happen to exist.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::errors::GovernanceError;
use super::ids::{ProjectId, TaskId};

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Pending,
    InProgress,
    Blocked,
    InReview,
    Done,
    Discarded,
}

impl TaskStatus {
    /// Terminal states accept no further lifecycle work.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Discarded)
    }
}

/// Which sub-engine applies to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskBehavior {
    /// Plain task: single progress bar, ordinary edits.
    Simple,
    /// Work recurs on a weekly weekday pattern, tracked via dated instances.
    Recurring,
    /// Completion is reported as monthly percentage contributions.
    LongRunning,
}

/// Sensitive fields that can be routed through a change request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskField {
    Title,
    Description,
    StartDate,
    TargetDate,
}

impl TaskField {
    /// Validate and normalize a proposed value for this field.
    ///
    /// Date fields must parse as ISO `YYYY-MM-DD`; the title must be
    /// non-empty. Returns the trimmed value.
    pub fn validate_value(self, raw: &str) -> Result<String, GovernanceError> {
        let value = raw.trim();
        match self {
            TaskField::StartDate | TaskField::TargetDate => {
                NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
                    GovernanceError::validation(format!("invalid date for {self}: '{value}'"))
                })?;
            }
            TaskField::Title => {
                if value.is_empty() {
                    return Err(GovernanceError::validation("title must not be empty"));
                }
            }
            TaskField::Description => {}
        }
        Ok(value.to_string())
    }
}

impl fmt::Display for TaskField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskField::Title => "title",
            TaskField::Description => "description",
            TaskField::StartDate => "start_date",
            TaskField::TargetDate => "target_date",
        };
        name.fmt(f)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,

    /// Completion percentage 0-100. For LongRunning tasks this mirrors the
    /// latest accumulated monthly value; for phase groups it is display-only.
    pub completion: u8,

    pub planned_start_date: Option<NaiveDate>,
    pub target_date: Option<NaiveDate>,
    pub behavior: TaskBehavior,

    /// Group this task belongs to, if any. A group task references itself.
    pub group_id: Option<TaskId>,

    /// Position within the group, assigned in attachment order. The group
    /// task itself carries no part number.
    pub part_number: Option<u32>,

    /// Task-level lock: edits to sensitive fields require approval even if
    /// the project is not (yet) locked.
    pub officialized: bool,

    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(
        id: TaskId,
        project_id: ProjectId,
        title: impl Into<String>,
        behavior: TaskBehavior,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            project_id,
            title: title.into(),
            description: None,
            status: TaskStatus::Pending,
            completion: 0,
            planned_start_date: None,
            target_date: None,
            behavior,
            group_id: None,
            part_number: None,
            officialized: false,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this task acts as a phase container.
    pub fn is_group(&self) -> bool {
        self.group_id == Some(self.id)
    }

    /// Read the current value of a sensitive field as its wire string.
    pub fn field_value(&self, field: TaskField) -> Option<String> {
        match field {
            TaskField::Title => Some(self.title.clone()),
            TaskField::Description => self.description.clone(),
            TaskField::StartDate => self.planned_start_date.map(|d| d.to_string()),
            TaskField::TargetDate => self.target_date.map(|d| d.to_string()),
        }
    }

    /// Write a validated value into a sensitive field.
    ///
    /// The value must already have passed [`TaskField::validate_value`]; date
    /// parsing here is infallible by construction, but we keep the Result so
    /// a corrupted stored request surfaces as Validation instead of a panic.
    pub fn apply_field(
        &mut self,
        field: TaskField,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<(), GovernanceError> {
        match field {
            TaskField::Title => self.title = value.to_string(),
            TaskField::Description => self.description = Some(value.to_string()),
            TaskField::StartDate => {
                self.planned_start_date = Some(parse_iso_date(field, value)?);
            }
            TaskField::TargetDate => {
                self.target_date = Some(parse_iso_date(field, value)?);
            }
        }
        self.updated_at = now;
        Ok(())
    }

    /// Transition the lifecycle state, stamping side-channel timestamps.
    pub fn set_status(&mut self, status: TaskStatus, now: DateTime<Utc>) {
        if status == self.status {
            return;
        }
        self.status = status;
        if status == TaskStatus::InProgress && self.started_at.is_none() {
            self.started_at = Some(now);
        }
        if status == TaskStatus::Done {
            self.completed_at = Some(now);
        }
        self.updated_at = now;
    }

    /// Update the displayed completion percentage (clamped to 100).
    pub fn set_completion(&mut self, completion: u8, now: DateTime<Utc>) {
        self.completion = completion.min(100);
        self.updated_at = now;
    }
}

fn parse_iso_date(field: TaskField, value: &str) -> Result<NaiveDate, GovernanceError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| GovernanceError::validation(format!("invalid date for {field}: '{value}'")))
}
