//! MonthlyProgressAggregator - percent-per-month reporting for long-running
//! tasks, with the cumulative fold mirrored into the task record.

use std::sync::Arc;

use tracing::info;

use crate::domain::{GovernanceError, MonthlyHistory, TaskBehavior, TaskId};
use crate::ports::{Clock, GovernanceStore};

/// Accepted calendar range for reported months.
const YEAR_RANGE: std::ops::RangeInclusive<i32> = 2000..=2100;

#[derive(Clone)]
pub struct MonthlyProgressAggregator {
    store: Arc<dyn GovernanceStore>,
    clock: Arc<dyn Clock>,
}

impl MonthlyProgressAggregator {
    pub fn new(store: Arc<dyn GovernanceStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Record (or correct) one month's contribution.
    ///
    /// Upserts the (task, year, month) entry, recomputes every accumulated
    /// value, and mirrors the new cumulative into the task's completion;
    /// reaching 100 flips the task to Done.
    pub async fn record_month(
        &self,
        task_id: TaskId,
        year: i32,
        month: u32,
        percentage: f64,
        comment: Option<String>,
        recorded_by: &str,
    ) -> Result<MonthlyHistory, GovernanceError> {
        if !(1..=12).contains(&month) {
            return Err(GovernanceError::validation(format!(
                "month out of range 1-12: {month}"
            )));
        }
        if !YEAR_RANGE.contains(&year) {
            return Err(GovernanceError::validation(format!(
                "year out of range {}-{}: {year}",
                YEAR_RANGE.start(),
                YEAR_RANGE.end()
            )));
        }
        if !percentage.is_finite() || !(0.0..=100.0).contains(&percentage) {
            return Err(GovernanceError::validation(format!(
                "monthly percentage out of range 0-100: {percentage}"
            )));
        }
        if recorded_by.trim().is_empty() {
            return Err(GovernanceError::validation("recorded_by must be set"));
        }

        let task = self
            .store
            .get_task(task_id)
            .await
            .ok_or_else(|| GovernanceError::not_found("task", task_id))?;
        if task.behavior != TaskBehavior::LongRunning {
            return Err(GovernanceError::validation(format!(
                "task {task_id} does not track monthly progress"
            )));
        }

        let history = self
            .store
            .upsert_month(
                task_id,
                year,
                month,
                percentage,
                comment,
                recorded_by.trim().to_string(),
                self.clock.now_utc(),
            )
            .await?;
        info!(
            task_id = %task_id,
            year,
            month,
            cumulative = history.cumulative,
            "monthly progress recorded"
        );
        Ok(history)
    }

    /// Full history, entries chronological, plus the headline cumulative.
    pub async fn history(&self, task_id: TaskId) -> Result<MonthlyHistory, GovernanceError> {
        self.store
            .get_task(task_id)
            .await
            .ok_or_else(|| GovernanceError::not_found("task", task_id))?;
        Ok(self.store.monthly_history(task_id).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProjectType, TaskStatus};
    use crate::ports::{SystemClock, TaskSeed};
    use crate::store::InMemoryStore;
    use chrono::Utc;
    use rstest::rstest;

    async fn aggregator() -> (MonthlyProgressAggregator, Arc<InMemoryStore>, TaskId) {
        let store = Arc::new(InMemoryStore::new());
        let project = store
            .insert_project("platform", ProjectType::Operational, false)
            .await;
        let task = store
            .insert_task(
                TaskSeed::new(project.id, "data migration", TaskBehavior::LongRunning),
                Utc::now(),
            )
            .await;
        let aggregator = MonthlyProgressAggregator::new(
            Arc::clone(&store) as Arc<dyn GovernanceStore>,
            Arc::new(SystemClock),
        );
        (aggregator, store, task.id)
    }

    #[rstest]
    #[case::month_zero(2025, 0, 10.0)]
    #[case::month_thirteen(2025, 13, 10.0)]
    #[case::year_too_small(1999, 6, 10.0)]
    #[case::year_too_large(2101, 6, 10.0)]
    #[case::negative_percentage(2025, 6, -1.0)]
    #[case::percentage_above_100(2025, 6, 100.5)]
    #[case::nan_percentage(2025, 6, f64::NAN)]
    #[tokio::test]
    async fn rejects_out_of_range_input(
        #[case] year: i32,
        #[case] month: u32,
        #[case] percentage: f64,
    ) {
        let (aggregator, _store, task_id) = aggregator().await;
        let err = aggregator
            .record_month(task_id, year, month, percentage, None, "ana")
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Validation(_)));
    }

    #[tokio::test]
    async fn rejects_tasks_without_monthly_tracking() {
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
        let aggregator = MonthlyProgressAggregator::new(
            Arc::clone(&store) as Arc<dyn GovernanceStore>,
            Arc::new(SystemClock),
        );

        let err = aggregator
            .record_month(task.id, 2025, 3, 10.0, None, "ana")
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::Validation(_)));
    }

    #[tokio::test]
    async fn cumulative_folds_and_caps_at_100() {
        let (aggregator, store, task_id) = aggregator().await;

        aggregator
            .record_month(task_id, 2025, 1, 40.0, None, "ana")
            .await
            .unwrap();
        aggregator
            .record_month(task_id, 2025, 2, 70.0, None, "ana")
            .await
            .unwrap();
        let history = aggregator
            .record_month(task_id, 2025, 3, 30.0, None, "ana")
            .await
            .unwrap();

        let accumulated: Vec<f64> = history.entries.iter().map(|e| e.accumulated).collect();
        assert_eq!(accumulated, vec![40.0, 100.0, 100.0]);
        assert_eq!(history.cumulative, 100.0);

        // Reaching 100 completes the task.
        let task = store.get_task(task_id).await.unwrap();
        assert_eq!(task.completion, 100);
        assert_eq!(task.status, TaskStatus::Done);
        assert!(task.completed_at.is_some());
    }

    #[tokio::test]
    async fn correcting_a_month_recomputes_downstream() {
        let (aggregator, store, task_id) = aggregator().await;
        aggregator
            .record_month(task_id, 2025, 1, 40.0, None, "ana")
            .await
            .unwrap();
        aggregator
            .record_month(task_id, 2025, 2, 30.0, None, "ana")
            .await
            .unwrap();

        // January was really 10.
        let history = aggregator
            .record_month(task_id, 2025, 1, 10.0, Some("correction".into()), "ana")
            .await
            .unwrap();

        let accumulated: Vec<f64> = history.entries.iter().map(|e| e.accumulated).collect();
        assert_eq!(accumulated, vec![10.0, 40.0]);
        assert_eq!(history.cumulative, 40.0);
        assert_eq!(store.get_task(task_id).await.unwrap().completion, 40);
    }

    #[tokio::test]
    async fn entries_sort_by_year_then_month() {
        let (aggregator, _store, task_id) = aggregator().await;
        // Reported out of order, across a year boundary.
        aggregator
            .record_month(task_id, 2025, 1, 20.0, None, "ana")
            .await
            .unwrap();
        aggregator
            .record_month(task_id, 2024, 12, 30.0, None, "ana")
            .await
            .unwrap();

        let history = aggregator.history(task_id).await.unwrap();
        let months: Vec<(i32, u32)> = history.entries.iter().map(|e| (e.year, e.month)).collect();
        assert_eq!(months, vec![(2024, 12), (2025, 1)]);
        assert_eq!(history.entries[0].accumulated, 30.0);
        assert_eq!(history.entries[1].accumulated, 50.0);
    }

    #[tokio::test]
    async fn history_of_unreported_task_is_empty() {
        let (aggregator, _store, task_id) = aggregator().await;
        let history = aggregator.history(task_id).await.unwrap();
        assert_eq!(history.cumulative, 0.0);
        assert!(history.entries.is_empty());
    }
}
