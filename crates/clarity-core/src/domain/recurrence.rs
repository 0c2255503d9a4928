//! Weekly recurrence: pattern + dated instances.
//!
//! Instances are materialized lazily. Asking "what happened on date D" either
//! returns a persisted row or implies Pending; rows are only written when a
//! date is explicitly marked, so the instance table grows with check-ins, not
//! with calendar span.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use super::errors::GovernanceError;
use super::ids::TaskId;

/// Non-empty set of ISO weekdays (1 = Monday .. 7 = Sunday).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdaySet(BTreeSet<u8>);

impl WeekdaySet {
    /// Build from raw integers, rejecting empty sets and out-of-range values.
    pub fn from_numbers(days: &[u32]) -> Result<Self, GovernanceError> {
        if days.is_empty() {
            return Err(GovernanceError::validation("weekday set must not be empty"));
        }
        let mut set = BTreeSet::new();
        for &day in days {
            if !(1..=7).contains(&day) {
                return Err(GovernanceError::validation(format!(
                    "weekday out of range 1-7: {day}"
                )));
            }
            set.insert(day as u8);
        }
        Ok(Self(set))
    }

    /// Does the pattern fire on this date?
    pub fn matches(&self, date: NaiveDate) -> bool {
        self.0.contains(&(date.weekday().number_from_monday() as u8))
    }

    pub fn as_numbers(&self) -> Vec<u8> {
        self.0.iter().copied().collect()
    }
}

/// Weekly recurrence pattern, at most one per task.
///
/// Defining a pattern twice overwrites in place; there is never a second row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrencePattern {
    pub task_id: TaskId,
    pub weekdays: WeekdaySet,
    pub effective_from: NaiveDate,
}

/// State of a single dated occurrence.
///
/// Pending is the implied state of any unmarked pattern date; it is
/// synthesized for display and never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceState {
    Pending,
    Done,
    Skipped,
}

/// A dated occurrence of a recurring task, unique per (task, scheduled date).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrenceInstance {
    pub task_id: TaskId,
    pub scheduled_date: NaiveDate,
    pub state: InstanceState,
    pub comment: Option<String>,

    /// When the instance was last marked; None for synthesized Pending rows.
    pub marked_at: Option<DateTime<Utc>>,
}

impl RecurrenceInstance {
    /// Synthesized Pending occurrence for an unmarked pattern date.
    pub fn pending(task_id: TaskId, scheduled_date: NaiveDate) -> Self {
        Self {
            task_id,
            scheduled_date,
            state: InstanceState::Pending,
            comment: None,
            marked_at: None,
        }
    }
}
