//! In-memory store implementation.
//!
//! Development/test adapter for the `GovernanceStore` port. A single
//! `tokio::sync::Mutex` guards the whole state, so every port method is
//! naturally one atomic transaction: the state-dependent checks and the
//! writes happen under the same guard.
//!
//! The uniqueness invariants live in the map keys themselves:
//! - instances:   keyed by (task, scheduled date)
//! - monthly:     keyed by (task, year, month)
//! so concurrent writers collapse into last-write-wins upserts instead of
//! duplicated rows.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;

use crate::domain::monthly::recompute_accumulated;
use crate::domain::{
    ChangeRequest, GovernanceError, InstanceState, MonthlyEntry, MonthlyHistory, Project,
    ProjectId, ProjectType, RecurrenceInstance, RecurrencePattern, RequestId, RequestStatus,
    ResolveAction, Resolution, Task, TaskField, TaskId, TaskStatus,
};
use crate::ports::store::{GovernanceStore, TaskSeed};

/// In-memory state. All rows plus the id counters.
struct InMemoryState {
    projects: HashMap<ProjectId, Project>,
    tasks: HashMap<TaskId, Task>,

    /// BTreeMap so iteration follows id allocation order, which is creation
    /// order ("pending requests, oldest first").
    requests: BTreeMap<RequestId, ChangeRequest>,

    /// At most one pattern per task; defining twice overwrites.
    patterns: HashMap<TaskId, RecurrencePattern>,

    /// Unique per (task, scheduled date).
    instances: BTreeMap<(TaskId, NaiveDate), RecurrenceInstance>,

    /// Unique per (task, year, month); key order is chronological order.
    monthly: BTreeMap<(TaskId, i32, u32), MonthlyEntry>,

    next_project_id: u64,
    next_task_id: u64,
    next_request_id: u64,
}

impl InMemoryState {
    fn new() -> Self {
        Self {
            projects: HashMap::new(),
            tasks: HashMap::new(),
            requests: BTreeMap::new(),
            patterns: HashMap::new(),
            instances: BTreeMap::new(),
            monthly: BTreeMap::new(),
            next_project_id: 1,
            next_task_id: 1,
            next_request_id: 1,
        }
    }

    fn allocate_project_id(&mut self) -> ProjectId {
        let id = ProjectId::new(self.next_project_id);
        self.next_project_id += 1;
        id
    }

    fn allocate_task_id(&mut self) -> TaskId {
        let id = TaskId::new(self.next_task_id);
        self.next_task_id += 1;
        id
    }

    fn allocate_request_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }

    fn task(&self, id: TaskId) -> Result<&Task, GovernanceError> {
        self.tasks
            .get(&id)
            .ok_or_else(|| GovernanceError::not_found("task", id))
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task, GovernanceError> {
        self.tasks
            .get_mut(&id)
            .ok_or_else(|| GovernanceError::not_found("task", id))
    }

    /// Children of a group, ordered by part number.
    fn phases_of(&self, group_id: TaskId) -> Vec<Task> {
        let mut children: Vec<Task> = self
            .tasks
            .values()
            .filter(|t| t.group_id == Some(group_id) && t.id != group_id)
            .cloned()
            .collect();
        children.sort_by_key(|t| t.part_number);
        children
    }

    /// Recompute a task's monthly fold and mirror it into the task record.
    /// Returns the full history; NotFound when the task row is gone.
    fn refold_monthly(
        &mut self,
        task_id: TaskId,
        now: DateTime<Utc>,
    ) -> Result<MonthlyHistory, GovernanceError> {
        let keys: Vec<(TaskId, i32, u32)> = self
            .monthly
            .range((task_id, i32::MIN, u32::MIN)..=(task_id, i32::MAX, u32::MAX))
            .map(|(k, _)| *k)
            .collect();

        let mut entries: Vec<MonthlyEntry> = keys
            .iter()
            .map(|k| self.monthly[k].clone())
            .collect();
        let cumulative = recompute_accumulated(&mut entries);

        for entry in &entries {
            self.monthly
                .insert((entry.task_id, entry.year, entry.month), entry.clone());
        }

        let task = self.task_mut(task_id)?;
        task.set_completion(cumulative.round() as u8, now);
        if cumulative >= 100.0 {
            task.set_status(TaskStatus::Done, now);
        }

        Ok(MonthlyHistory { cumulative, entries })
    }
}

/// In-memory `GovernanceStore`.
pub struct InMemoryStore {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryState::new())),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GovernanceStore for InMemoryStore {
    async fn insert_project(
        &self,
        name: &str,
        project_type: ProjectType,
        locked: bool,
    ) -> Project {
        let mut state = self.state.lock().await;
        let id = state.allocate_project_id();
        let mut project = Project::new(id, name, project_type);
        project.locked = locked;
        state.projects.insert(id, project.clone());
        project
    }

    async fn insert_task(&self, seed: TaskSeed, now: DateTime<Utc>) -> Task {
        let mut state = self.state.lock().await;
        let id = state.allocate_task_id();
        let mut task = Task::new(id, seed.project_id, seed.title, seed.behavior, now);
        task.planned_start_date = seed.planned_start_date;
        task.target_date = seed.target_date;
        task.officialized = seed.officialized;
        state.tasks.insert(id, task.clone());
        task
    }

    async fn get_project(&self, id: ProjectId) -> Option<Project> {
        let state = self.state.lock().await;
        state.projects.get(&id).cloned()
    }

    async fn get_task(&self, id: TaskId) -> Option<Task> {
        let state = self.state.lock().await;
        state.tasks.get(&id).cloned()
    }

    async fn set_project_locked(
        &self,
        id: ProjectId,
        locked: bool,
    ) -> Result<(), GovernanceError> {
        let mut state = self.state.lock().await;
        let project = state
            .projects
            .get_mut(&id)
            .ok_or_else(|| GovernanceError::not_found("project", id))?;
        project.locked = locked;
        Ok(())
    }

    async fn apply_task_field(
        &self,
        task_id: TaskId,
        field: TaskField,
        value: &str,
        now: DateTime<Utc>,
    ) -> Result<Task, GovernanceError> {
        let mut state = self.state.lock().await;
        let task = state.task_mut(task_id)?;
        task.apply_field(field, value, now)?;
        Ok(task.clone())
    }

    async fn create_request(
        &self,
        task_id: TaskId,
        field: TaskField,
        proposed_value: String,
        reason: String,
        requesting_user: String,
        now: DateTime<Utc>,
    ) -> Result<ChangeRequest, GovernanceError> {
        let mut state = self.state.lock().await;
        // Capture previous_value under the same guard that inserts the row.
        let previous_value = state.task(task_id)?.field_value(field);
        let id = state.allocate_request_id();
        let request = ChangeRequest {
            id,
            task_id,
            requesting_user,
            field,
            previous_value,
            proposed_value,
            reason,
            status: RequestStatus::Pending,
            requested_at: now,
            resolved_by: None,
            resolved_at: None,
            resolution_comment: None,
        };
        state.requests.insert(id, request.clone());
        Ok(request)
    }

    async fn get_request(&self, id: RequestId) -> Option<ChangeRequest> {
        let state = self.state.lock().await;
        state.requests.get(&id).cloned()
    }

    async fn list_pending_requests(&self) -> Vec<ChangeRequest> {
        let state = self.state.lock().await;
        state
            .requests
            .values()
            .filter(|r| r.status == RequestStatus::Pending)
            .cloned()
            .collect()
    }

    async fn resolve_request(
        &self,
        id: RequestId,
        action: ResolveAction,
        resolver: String,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Resolution, GovernanceError> {
        let mut state = self.state.lock().await;

        let request = state
            .requests
            .get(&id)
            .cloned()
            .ok_or_else(|| GovernanceError::not_found("change request", id))?;

        if request.status != RequestStatus::Pending {
            return Err(GovernanceError::ApprovalState {
                request_id: id,
                status: request.status,
            });
        }

        let mut stale_base = false;
        let status = match action {
            ResolveAction::Reject => RequestStatus::Rejected,
            ResolveAction::Approve => {
                // Apply on a copy first so a bad stored value leaves no
                // half-state (request resolved but task unchanged, or the
                // reverse).
                let mut task = state.task(request.task_id)?.clone();
                stale_base = task.field_value(request.field) != request.previous_value;
                task.apply_field(request.field, &request.proposed_value, now)?;
                state.tasks.insert(task.id, task);
                RequestStatus::Approved
            }
        };

        let request = state
            .requests
            .get_mut(&id)
            .ok_or_else(|| GovernanceError::not_found("change request", id))?;
        request.status = status;
        request.resolved_by = Some(resolver);
        request.resolved_at = Some(now);
        request.resolution_comment = comment;

        Ok(Resolution {
            request: request.clone(),
            stale_base,
        })
    }

    async fn upsert_pattern(&self, pattern: RecurrencePattern) -> RecurrencePattern {
        let mut state = self.state.lock().await;
        state.patterns.insert(pattern.task_id, pattern.clone());
        pattern
    }

    async fn get_pattern(&self, task_id: TaskId) -> Option<RecurrencePattern> {
        let state = self.state.lock().await;
        state.patterns.get(&task_id).cloned()
    }

    async fn upsert_instance(
        &self,
        task_id: TaskId,
        scheduled_date: NaiveDate,
        state_value: InstanceState,
        comment: Option<String>,
        now: DateTime<Utc>,
    ) -> RecurrenceInstance {
        let mut state = self.state.lock().await;
        let instance = RecurrenceInstance {
            task_id,
            scheduled_date,
            state: state_value,
            comment,
            marked_at: Some(now),
        };
        state
            .instances
            .insert((task_id, scheduled_date), instance.clone());
        instance
    }

    async fn list_instances(&self, task_id: TaskId) -> Vec<RecurrenceInstance> {
        let state = self.state.lock().await;
        state
            .instances
            .range((task_id, NaiveDate::MIN)..=(task_id, NaiveDate::MAX))
            .map(|(_, v)| v.clone())
            .collect()
    }

    async fn upsert_month(
        &self,
        task_id: TaskId,
        year: i32,
        month: u32,
        percentage: f64,
        comment: Option<String>,
        recorded_by: String,
        now: DateTime<Utc>,
    ) -> Result<MonthlyHistory, GovernanceError> {
        let mut state = self.state.lock().await;
        state.task(task_id)?;

        let entry = MonthlyEntry {
            task_id,
            year,
            month,
            monthly_percentage: percentage,
            accumulated: 0.0, // filled by the refold below
            comment,
            recorded_by,
            updated_at: now,
        };
        state.monthly.insert((task_id, year, month), entry);

        state.refold_monthly(task_id, now)
    }

    async fn monthly_history(&self, task_id: TaskId) -> MonthlyHistory {
        let state = self.state.lock().await;
        let entries: Vec<MonthlyEntry> = state
            .monthly
            .range((task_id, i32::MIN, u32::MIN)..=(task_id, i32::MAX, u32::MAX))
            .map(|(_, v)| v.clone())
            .collect();
        let cumulative = entries.last().map_or(0.0, |e| e.accumulated);
        MonthlyHistory { cumulative, entries }
    }

    async fn ensure_group(
        &self,
        task_id: TaskId,
        now: DateTime<Utc>,
    ) -> Result<Task, GovernanceError> {
        let mut state = self.state.lock().await;
        let task = state.task_mut(task_id)?;
        if task.is_group() {
            return Ok(task.clone());
        }
        if task.group_id.is_some() {
            return Err(GovernanceError::validation(format!(
                "task {task_id} is already a phase of another group and cannot become a group"
            )));
        }
        task.group_id = Some(task_id);
        task.updated_at = now;
        Ok(task.clone())
    }

    async fn attach_phase(
        &self,
        group_id: TaskId,
        child_id: TaskId,
        now: DateTime<Utc>,
    ) -> Result<Task, GovernanceError> {
        let mut state = self.state.lock().await;

        let group = state.task(group_id)?.clone();
        let child = state.task(child_id)?.clone();

        match child.group_id {
            Some(existing) if existing == group_id => {
                // Re-attaching to the same group: upsert discipline, no-op.
                return Ok(child);
            }
            Some(existing) => {
                return Err(GovernanceError::validation(format!(
                    "task {child_id} already belongs to group {existing}"
                )));
            }
            None => {}
        }
        if child.is_group() {
            return Err(GovernanceError::validation(format!(
                "task {child_id} is itself a group and cannot be attached as a phase"
            )));
        }

        // First attachment converts the parent into a group.
        if !group.is_group() {
            if group.group_id.is_some() {
                return Err(GovernanceError::validation(format!(
                    "task {group_id} is a phase of another group and cannot act as one"
                )));
            }
            let group = state.task_mut(group_id)?;
            group.group_id = Some(group_id);
            group.updated_at = now;
        }

        // Serialized read of the current max; same guard as the write below.
        let next_part = state
            .phases_of(group_id)
            .iter()
            .filter_map(|t| t.part_number)
            .max()
            .map_or(1, |max| max + 1);

        let child = state.task_mut(child_id)?;
        child.group_id = Some(group_id);
        child.part_number = Some(next_part);
        child.updated_at = now;
        Ok(child.clone())
    }

    async fn list_phases(&self, group_id: TaskId) -> Vec<Task> {
        let state = self.state.lock().await;
        state.phases_of(group_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskBehavior;

    async fn seed_task(store: &InMemoryStore) -> Task {
        let project = store
            .insert_project("ops", ProjectType::Operational, false)
            .await;
        store
            .insert_task(
                TaskSeed::new(project.id, "demo", TaskBehavior::Recurring),
                Utc::now(),
            )
            .await
    }

    #[tokio::test]
    async fn instance_upsert_keeps_one_row_per_date() {
        let store = InMemoryStore::new();
        let task = seed_task(&store).await;
        let date = "2025-03-10".parse::<NaiveDate>().unwrap();

        store
            .upsert_instance(task.id, date, InstanceState::Done, None, Utc::now())
            .await;
        store
            .upsert_instance(task.id, date, InstanceState::Skipped, None, Utc::now())
            .await;

        let rows = store.list_instances(task.id).await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].state, InstanceState::Skipped);
    }

    #[tokio::test]
    async fn monthly_upsert_keeps_one_row_per_month() {
        let store = InMemoryStore::new();
        let task = seed_task(&store).await;

        store
            .upsert_month(task.id, 2025, 3, 40.0, None, "ana".into(), Utc::now())
            .await
            .unwrap();
        let history = store
            .upsert_month(task.id, 2025, 3, 70.0, None, "ana".into(), Utc::now())
            .await
            .unwrap();

        assert_eq!(history.entries.len(), 1);
        assert_eq!(history.entries[0].monthly_percentage, 70.0);
        assert_eq!(history.cumulative, 70.0);
    }

    #[tokio::test]
    async fn monthly_upsert_for_missing_task_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .upsert_month(TaskId::new(404), 2025, 3, 40.0, None, "ana".into(), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn attach_phase_assigns_sequential_part_numbers() {
        let store = InMemoryStore::new();
        let group = seed_task(&store).await;
        let c1 = seed_task(&store).await;
        let c2 = seed_task(&store).await;

        let a1 = store.attach_phase(group.id, c1.id, Utc::now()).await.unwrap();
        let a2 = store.attach_phase(group.id, c2.id, Utc::now()).await.unwrap();

        assert_eq!(a1.part_number, Some(1));
        assert_eq!(a2.part_number, Some(2));

        let phases = store.list_phases(group.id).await;
        assert_eq!(phases.len(), 2);
        assert_eq!(phases[0].id, c1.id);
        assert_eq!(phases[1].id, c2.id);
    }

    #[tokio::test]
    async fn group_task_is_not_listed_among_its_phases() {
        let store = InMemoryStore::new();
        let group = seed_task(&store).await;
        let child = seed_task(&store).await;

        store.ensure_group(group.id, Utc::now()).await.unwrap();
        store.attach_phase(group.id, child.id, Utc::now()).await.unwrap();

        let phases = store.list_phases(group.id).await;
        assert_eq!(phases.len(), 1);
        assert_eq!(phases[0].id, child.id);
        assert_eq!(phases[0].part_number, Some(1));
    }

    #[tokio::test]
    async fn resolve_after_terminal_state_fails() {
        let store = InMemoryStore::new();
        let task = seed_task(&store).await;
        let request = store
            .create_request(
                task.id,
                TaskField::Title,
                "new title".into(),
                "why".into(),
                "ana".into(),
                Utc::now(),
            )
            .await
            .unwrap();

        store
            .resolve_request(request.id, ResolveAction::Reject, "boss".into(), None, Utc::now())
            .await
            .unwrap();

        let err = store
            .resolve_request(request.id, ResolveAction::Approve, "boss".into(), None, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, GovernanceError::ApprovalState { .. }));
    }
}
