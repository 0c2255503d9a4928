//! RecurrenceEngine - weekly patterns and lazily materialized instances.
//!
//! The instance table only holds dates someone explicitly marked. Listing
//! walks the calendar backwards from today to the pattern's effective date
//! and fills the gaps with synthesized Pending rows, so redefining a pattern
//! or never checking in costs no storage.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Days, NaiveDate};
use tracing::debug;

use crate::domain::{
    GovernanceError, InstanceState, RecurrenceInstance, RecurrencePattern, TaskBehavior, TaskId,
    WeekdaySet,
};
use crate::ports::{Clock, GovernanceStore};

/// Default window for [`RecurrenceEngine::list_recent`].
pub const DEFAULT_INSTANCE_LIMIT: usize = 30;

#[derive(Clone)]
pub struct RecurrenceEngine {
    store: Arc<dyn GovernanceStore>,
    clock: Arc<dyn Clock>,
}

impl RecurrenceEngine {
    pub fn new(store: Arc<dyn GovernanceStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create or replace the weekly pattern of a recurring task.
    pub async fn define_pattern(
        &self,
        task_id: TaskId,
        weekdays: &[u32],
        effective_from: NaiveDate,
    ) -> Result<RecurrencePattern, GovernanceError> {
        let weekdays = WeekdaySet::from_numbers(weekdays)?;
        let task = self
            .store
            .get_task(task_id)
            .await
            .ok_or_else(|| GovernanceError::not_found("task", task_id))?;
        if task.behavior != TaskBehavior::Recurring {
            return Err(GovernanceError::validation(format!(
                "task {task_id} is not a recurring task"
            )));
        }
        let pattern = RecurrencePattern {
            task_id,
            weekdays,
            effective_from,
        };
        Ok(self.store.upsert_pattern(pattern).await)
    }

    /// Recent occurrences, newest first, at most `limit`.
    ///
    /// Walks from today back to `effective_from`; pattern dates without a
    /// persisted row come back as synthesized Pending instances. Every
    /// persisted mark is listed even when its date no longer matches the
    /// pattern (off-pattern check-ins, patterns redefined after the fact).
    pub async fn list_recent(
        &self,
        task_id: TaskId,
        limit: usize,
    ) -> Result<Vec<RecurrenceInstance>, GovernanceError> {
        let pattern = self.pattern(task_id).await?;

        let mut by_date: BTreeMap<NaiveDate, RecurrenceInstance> = self
            .store
            .list_instances(task_id)
            .await
            .into_iter()
            .map(|i| (i.scheduled_date, i))
            .collect();

        let mut date = self.clock.today();
        let mut pattern_dates = 0usize;
        while date >= pattern.effective_from && pattern_dates < limit {
            if pattern.weekdays.matches(date) {
                by_date
                    .entry(date)
                    .or_insert_with(|| RecurrenceInstance::pending(task_id, date));
                pattern_dates += 1;
            }
            let Some(previous) = date.checked_sub_days(Days::new(1)) else {
                break;
            };
            date = previous;
        }

        let out: Vec<RecurrenceInstance> = by_date.into_values().rev().take(limit).collect();
        debug!(task_id = %task_id, count = out.len(), "listed recurrence window");
        Ok(out)
    }

    /// Mark one occurrence Done or Skipped.
    ///
    /// Marking the same date again overwrites the earlier mark. Pending is
    /// the implied default and cannot be written explicitly.
    pub async fn mark_instance(
        &self,
        task_id: TaskId,
        scheduled_date: NaiveDate,
        state: InstanceState,
        comment: Option<String>,
    ) -> Result<RecurrenceInstance, GovernanceError> {
        if state == InstanceState::Pending {
            return Err(GovernanceError::validation(
                "pending is the implied state; mark an occurrence done or skipped",
            ));
        }
        let pattern = self.pattern(task_id).await?;
        if scheduled_date < pattern.effective_from {
            return Err(GovernanceError::validation(format!(
                "date {scheduled_date} predates the pattern's effective date {}",
                pattern.effective_from
            )));
        }
        Ok(self
            .store
            .upsert_instance(task_id, scheduled_date, state, comment, self.clock.now_utc())
            .await)
    }

    async fn pattern(&self, task_id: TaskId) -> Result<RecurrencePattern, GovernanceError> {
        self.store
            .get_pattern(task_id)
            .await
            .ok_or_else(|| GovernanceError::not_found("recurrence pattern", task_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProjectType;
    use crate::ports::{FixedClock, TaskSeed};
    use crate::store::InMemoryStore;
    use chrono::{DateTime, Utc};

    // 2025-03-10 is a Monday.
    const TODAY: &str = "2025-03-10T09:00:00Z";

    async fn engine() -> (RecurrenceEngine, TaskId) {
        let store = Arc::new(InMemoryStore::new());
        let project = store
            .insert_project("ops", ProjectType::Operational, false)
            .await;
        let task = store
            .insert_task(
                TaskSeed::new(project.id, "standup notes", TaskBehavior::Recurring),
                Utc::now(),
            )
            .await;
        let clock = FixedClock(TODAY.parse::<DateTime<Utc>>().unwrap());
        let engine = RecurrenceEngine::new(
            Arc::clone(&store) as Arc<dyn GovernanceStore>,
            Arc::new(clock),
        );
        (engine, task.id)
    }

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn pattern_requires_recurring_behavior() {
        let store = Arc::new(InMemoryStore::new());
        let project = store
            .insert_project("ops", ProjectType::Operational, false)
            .await;
        let task = store
            .insert_task(
                TaskSeed::new(project.id, "one-off", TaskBehavior::Simple),
                Utc::now(),
            )
            .await;
        let engine = RecurrenceEngine::new(
            Arc::clone(&store) as Arc<dyn GovernanceStore>,
            Arc::new(FixedClock(TODAY.parse().unwrap())),
        );

        let err = engine
            .define_pattern(task.id, &[1], date("2025-03-03"))
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Validation(_)));
    }

    #[tokio::test]
    async fn listing_synthesizes_pending_for_unmarked_dates() {
        let (engine, task_id) = engine().await;
        // Mondays and Fridays since 2025-03-03; today is Monday 2025-03-10.
        engine
            .define_pattern(task_id, &[1, 5], date("2025-03-03"))
            .await
            .unwrap();

        engine
            .mark_instance(task_id, date("2025-03-07"), InstanceState::Done, None)
            .await
            .unwrap();

        let recent = engine.list_recent(task_id, 10).await.unwrap();
        let dates: Vec<String> = recent.iter().map(|i| i.scheduled_date.to_string()).collect();
        assert_eq!(dates, vec!["2025-03-10", "2025-03-07", "2025-03-03"]);
        assert_eq!(recent[0].state, InstanceState::Pending);
        assert_eq!(recent[1].state, InstanceState::Done);
        assert_eq!(recent[2].state, InstanceState::Pending);
        assert!(recent[0].marked_at.is_none());
        assert!(recent[1].marked_at.is_some());
    }

    #[tokio::test]
    async fn listing_honors_the_limit_newest_first() {
        let (engine, task_id) = engine().await;
        engine
            .define_pattern(task_id, &[1, 2, 3, 4, 5], date("2025-01-01"))
            .await
            .unwrap();

        let recent = engine.list_recent(task_id, 3).await.unwrap();
        let dates: Vec<String> = recent.iter().map(|i| i.scheduled_date.to_string()).collect();
        // Mon 10th, Fri 7th, Thu 6th.
        assert_eq!(dates, vec!["2025-03-10", "2025-03-07", "2025-03-06"]);
    }

    #[tokio::test]
    async fn remarking_a_date_overwrites() {
        let (engine, task_id) = engine().await;
        engine
            .define_pattern(task_id, &[1], date("2025-03-03"))
            .await
            .unwrap();

        engine
            .mark_instance(task_id, date("2025-03-03"), InstanceState::Done, None)
            .await
            .unwrap();
        let marked = engine
            .mark_instance(
                task_id,
                date("2025-03-03"),
                InstanceState::Skipped,
                Some("holiday".into()),
            )
            .await
            .unwrap();
        assert_eq!(marked.state, InstanceState::Skipped);

        let recent = engine.list_recent(task_id, 10).await.unwrap();
        let row = recent
            .iter()
            .find(|i| i.scheduled_date == date("2025-03-03"))
            .unwrap();
        assert_eq!(row.state, InstanceState::Skipped);
        assert_eq!(row.comment.as_deref(), Some("holiday"));
    }

    #[tokio::test]
    async fn marking_without_pattern_is_not_found() {
        let (engine, task_id) = engine().await;
        let err = engine
            .mark_instance(task_id, date("2025-03-03"), InstanceState::Done, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn marking_before_effective_date_is_rejected() {
        let (engine, task_id) = engine().await;
        engine
            .define_pattern(task_id, &[1], date("2025-03-03"))
            .await
            .unwrap();

        let err = engine
            .mark_instance(task_id, date("2025-02-24"), InstanceState::Done, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Validation(_)));
    }

    #[tokio::test]
    async fn explicit_pending_mark_is_rejected() {
        let (engine, task_id) = engine().await;
        engine
            .define_pattern(task_id, &[1], date("2025-03-03"))
            .await
            .unwrap();

        let err = engine
            .mark_instance(task_id, date("2025-03-03"), InstanceState::Pending, None)
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Validation(_)));
    }

    #[tokio::test]
    async fn off_pattern_marks_stay_listed() {
        let (engine, task_id) = engine().await;
        // Mondays only; a check-in lands on Tuesday the 4th anyway.
        engine
            .define_pattern(task_id, &[1], date("2025-03-03"))
            .await
            .unwrap();
        engine
            .mark_instance(task_id, date("2025-03-04"), InstanceState::Done, None)
            .await
            .unwrap();

        let recent = engine.list_recent(task_id, 10).await.unwrap();
        let dates: Vec<String> = recent.iter().map(|i| i.scheduled_date.to_string()).collect();
        assert_eq!(dates, vec!["2025-03-10", "2025-03-04", "2025-03-03"]);
        let tuesday = recent
            .iter()
            .find(|i| i.scheduled_date == date("2025-03-04"))
            .unwrap();
        assert_eq!(tuesday.state, InstanceState::Done);
    }

    #[tokio::test]
    async fn redefinition_keeps_existing_marks_visible() {
        let (engine, task_id) = engine().await;
        engine
            .define_pattern(task_id, &[1, 5], date("2025-03-03"))
            .await
            .unwrap();
        engine
            .mark_instance(task_id, date("2025-03-07"), InstanceState::Done, None)
            .await
            .unwrap();

        // Fridays drop out of the pattern; the Friday mark must not.
        engine
            .define_pattern(task_id, &[1], date("2025-03-03"))
            .await
            .unwrap();

        let recent = engine.list_recent(task_id, 10).await.unwrap();
        let dates: Vec<String> = recent.iter().map(|i| i.scheduled_date.to_string()).collect();
        assert_eq!(dates, vec!["2025-03-10", "2025-03-07", "2025-03-03"]);
        assert_eq!(recent[1].state, InstanceState::Done);
    }

    #[tokio::test]
    async fn redefining_a_pattern_replaces_it() {
        let (engine, task_id) = engine().await;
        engine
            .define_pattern(task_id, &[1, 5], date("2025-03-03"))
            .await
            .unwrap();
        let replaced = engine
            .define_pattern(task_id, &[3], date("2025-03-05"))
            .await
            .unwrap();
        assert_eq!(replaced.weekdays.as_numbers(), vec![3]);

        // Only Wednesdays are listed now.
        let recent = engine.list_recent(task_id, 10).await.unwrap();
        let dates: Vec<String> = recent.iter().map(|i| i.scheduled_date.to_string()).collect();
        assert_eq!(dates, vec!["2025-03-05"]);
    }
}
