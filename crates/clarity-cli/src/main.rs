use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Value};

use clarity_core::api::{handle, ApiRequest};
use clarity_core::domain::{ProjectType, TaskBehavior};
use clarity_core::ports::{GovernanceStore, TaskSeed};
use clarity_core::Governance;

async fn call(app: &Governance, principal: &str, body: Value) -> Value {
    let request: ApiRequest = serde_json::from_value(body).expect("well-formed demo request");
    handle(app, principal, request).await
}

fn show(label: &str, body: &Value) {
    println!("--- {label}");
    println!(
        "{}",
        serde_json::to_string_pretty(body).expect("serializable body")
    );
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // (A) Assemble the app: in-memory store, system clock.
    let app = Governance::builder().build();
    let store = Arc::clone(app.store());

    // (B) Seed a locked strategic project and a few tasks.
    let strategic = store
        .insert_project("Q3 launch", ProjectType::Strategic, true)
        .await;
    let brief = store
        .insert_task(
            TaskSeed::new(strategic.id, "press brief", TaskBehavior::Simple),
            Utc::now(),
        )
        .await;

    let ops = store
        .insert_project("platform ops", ProjectType::Operational, false)
        .await;
    let standup = store
        .insert_task(
            TaskSeed::new(ops.id, "standup notes", TaskBehavior::Recurring),
            Utc::now(),
        )
        .await;
    let migration = store
        .insert_task(
            TaskSeed::new(ops.id, "data migration", TaskBehavior::LongRunning),
            Utc::now(),
        )
        .await;

    // (C) The gate blocks a direct edit on the governed task...
    let body = call(
        &app,
        "ana",
        json!({ "op": "check_permission", "task_id": brief.id }),
    )
    .await;
    show("check_permission (strategic, locked)", &body);

    let body = call(
        &app,
        "ana",
        json!({
            "op": "edit_field",
            "task_id": brief.id,
            "field": "target_date",
            "value": "2025-06-01",
        }),
    )
    .await;
    show("direct edit bounces", &body);

    // ...so the change goes through a request instead.
    let request = call(
        &app,
        "ana",
        json!({
            "op": "create_change_request",
            "task_id": brief.id,
            "field": "target_date",
            "proposed_value": "2025-06-01",
            "reason": "client delay",
        }),
    )
    .await;
    show("change request opened", &request);

    let body = call(
        &app,
        "lead",
        json!({
            "op": "resolve_request",
            "request_id": request["id"].clone(),
            "action": "Approve",
            "comment": "agreed with client",
        }),
    )
    .await;
    show("request approved, value applied", &body);

    // (D) Weekly recurrence: define a pattern, mark one occurrence.
    let body = call(
        &app,
        "ana",
        json!({
            "op": "define_recurrence",
            "task_id": standup.id,
            "weekdays": [1, 3, 5],
            "effective_from": "2025-03-03",
        }),
    )
    .await;
    show("recurrence defined", &body);

    let body = call(
        &app,
        "ana",
        json!({
            "op": "mark_instance",
            "task_id": standup.id,
            "scheduled_date": "2025-03-05",
            "state": "Done",
        }),
    )
    .await;
    show("occurrence marked done", &body);

    let body = call(
        &app,
        "ana",
        json!({
            "op": "list_recent_instances",
            "task_id": standup.id,
            "limit": 5,
        }),
    )
    .await;
    show("recent occurrences (pending synthesized)", &body);

    // (E) Monthly progress folds into one cumulative and completes at 100.
    for (month, pct) in [(1, 40.0), (2, 70.0)] {
        let body = call(
            &app,
            "ana",
            json!({
                "op": "record_month",
                "task_id": migration.id,
                "year": 2025,
                "month": month,
                "percentage": pct,
            }),
        )
        .await;
        show(&format!("month 2025-{month:02} recorded"), &body);
    }
    let body = call(
        &app,
        "ana",
        json!({ "op": "get_monthly_history", "task_id": migration.id }),
    )
    .await;
    show("monthly history", &body);

    // (F) Phase groups: split the migration into numbered parts.
    let part_one = store
        .insert_task(
            TaskSeed::new(ops.id, "migrate accounts", TaskBehavior::Simple),
            Utc::now(),
        )
        .await;
    let part_two = store
        .insert_task(
            TaskSeed::new(ops.id, "migrate billing", TaskBehavior::Simple),
            Utc::now(),
        )
        .await;
    for child in [part_one.id, part_two.id] {
        call(
            &app,
            "ana",
            json!({
                "op": "attach_phase",
                "group_task_id": migration.id,
                "child_task_id": child,
            }),
        )
        .await;
    }
    let body = call(
        &app,
        "ana",
        json!({ "op": "list_phases", "group_task_id": migration.id }),
    )
    .await;
    show("phases in attachment order", &body);
}
