//! JSON request/response boundary.
//!
//! One tagged request enum, one dispatch function. The caller supplies the
//! acting principal separately (it fills audit fields, it is not part of the
//! payload). Errors serialize to `{ "error": { "kind", "message" } }` so
//! every failure is a structured response scoped to its request; nothing
//! here aborts the process.

use serde::Deserialize;
use serde_json::{json, Value};

use chrono::NaiveDate;

use crate::domain::{
    GovernanceError, InstanceState, RequestId, ResolveAction, TaskField, TaskId,
};
use crate::engine::{Governance, DEFAULT_INSTANCE_LIMIT};

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ApiRequest {
    CheckPermission {
        task_id: TaskId,
    },
    /// Direct write to a sensitive field; conflicts when the gate requires
    /// approval for the task.
    EditField {
        task_id: TaskId,
        field: TaskField,
        value: String,
    },
    CreateChangeRequest {
        task_id: TaskId,
        field: TaskField,
        proposed_value: String,
        reason: String,
    },
    ListPendingRequests,
    ResolveRequest {
        request_id: RequestId,
        action: ResolveAction,
        comment: Option<String>,
    },
    DefineRecurrence {
        task_id: TaskId,
        weekdays: Vec<u32>,
        effective_from: NaiveDate,
    },
    ListRecentInstances {
        task_id: TaskId,
        limit: Option<usize>,
    },
    MarkInstance {
        task_id: TaskId,
        scheduled_date: NaiveDate,
        state: InstanceState,
        comment: Option<String>,
    },
    RecordMonth {
        task_id: TaskId,
        year: i32,
        month: u32,
        percentage: f64,
        comment: Option<String>,
    },
    GetMonthlyHistory {
        task_id: TaskId,
    },
    EnsureGroup {
        task_id: TaskId,
    },
    AttachPhase {
        group_task_id: TaskId,
        child_task_id: TaskId,
    },
    ListPhases {
        group_task_id: TaskId,
    },
}

/// Route a request to its engine. `principal` fills the audit fields
/// (requesting user, resolver, recorded-by).
pub async fn dispatch(
    app: &Governance,
    principal: &str,
    request: ApiRequest,
) -> Result<Value, GovernanceError> {
    match request {
        ApiRequest::CheckPermission { task_id } => {
            to_body(&app.permissions().evaluate(task_id).await?)
        }
        ApiRequest::EditField {
            task_id,
            field,
            value,
        } => to_body(&app.requests().edit_direct(task_id, field, &value).await?),
        ApiRequest::CreateChangeRequest {
            task_id,
            field,
            proposed_value,
            reason,
        } => to_body(
            &app.requests()
                .create_request(task_id, field, &proposed_value, &reason, principal)
                .await?,
        ),
        ApiRequest::ListPendingRequests => to_body(&app.requests().list_pending().await),
        ApiRequest::ResolveRequest {
            request_id,
            action,
            comment,
        } => {
            let resolution = app
                .requests()
                .resolve(request_id, action, principal, comment)
                .await?;
            to_body(&resolution)
        }
        ApiRequest::DefineRecurrence {
            task_id,
            weekdays,
            effective_from,
        } => to_body(
            &app.recurrence()
                .define_pattern(task_id, &weekdays, effective_from)
                .await?,
        ),
        ApiRequest::ListRecentInstances { task_id, limit } => to_body(
            &app.recurrence()
                .list_recent(task_id, limit.unwrap_or(DEFAULT_INSTANCE_LIMIT))
                .await?,
        ),
        ApiRequest::MarkInstance {
            task_id,
            scheduled_date,
            state,
            comment,
        } => to_body(
            &app.recurrence()
                .mark_instance(task_id, scheduled_date, state, comment)
                .await?,
        ),
        ApiRequest::RecordMonth {
            task_id,
            year,
            month,
            percentage,
            comment,
        } => {
            let history = app
                .monthly()
                .record_month(task_id, year, month, percentage, comment, principal)
                .await?;
            let entry = history
                .entries
                .iter()
                .find(|e| e.year == year && e.month == month)
                .cloned();
            Ok(json!({
                "cumulative": history.cumulative,
                "entry": to_body(&entry)?,
            }))
        }
        ApiRequest::GetMonthlyHistory { task_id } => {
            to_body(&app.monthly().history(task_id).await?)
        }
        ApiRequest::EnsureGroup { task_id } => {
            to_body(&app.phases().convert_to_group(task_id).await?)
        }
        ApiRequest::AttachPhase {
            group_task_id,
            child_task_id,
        } => to_body(&app.phases().attach_phase(group_task_id, child_task_id).await?),
        ApiRequest::ListPhases { group_task_id } => {
            to_body(&app.phases().list_phases(group_task_id).await?)
        }
    }
}

/// Dispatch and fold errors into their wire shape.
pub async fn handle(app: &Governance, principal: &str, request: ApiRequest) -> Value {
    match dispatch(app, principal, request).await {
        Ok(body) => body,
        Err(err) => error_body(&err),
    }
}

/// `{ "error": { "kind", "message" } }`
pub fn error_body(err: &GovernanceError) -> Value {
    json!({
        "error": {
            "kind": err.kind(),
            "message": err.to_string(),
        }
    })
}

fn to_body<T: serde::Serialize>(value: &T) -> Result<Value, GovernanceError> {
    serde_json::to_value(value)
        .map_err(|e| GovernanceError::internal(format!("response encoding failed: {e}")))
}
