mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde_json::json;

use ticket_engine::{
    entities::{prelude::Tickets, tickets},
    services::sla,
};

use crate::common::{hours_between, spawn_app, Caller};

/// Move a ticket's current window so it started `started_hours_ago` and ends in
/// `due_in_hours` (negative for the past).
async fn shift_window(db: &DatabaseConnection, id: i64, started_hours_ago: i64, due_in_hours: i64) {
    let now = Utc::now().fixed_offset();
    tickets::ActiveModel {
        id: Set(id as i32),
        node_entered_at: Set(now - Duration::hours(started_hours_ago)),
        sla_due_at: Set(Some(now + Duration::hours(due_in_hours))),
        ..Default::default()
    }
    .update(db)
    .await
    .expect("Failed to shift SLA window");
}

async fn stored(db: &DatabaseConnection, id: i64) -> tickets::Model {
    Tickets::find_by_id(id as i32)
        .one(db)
        .await
        .unwrap()
        .expect("ticket exists")
}

#[tokio::test]
async fn test_breach_is_counted_once_across_reads() {
    let app = spawn_app().await;
    let staff = Caller::staff();
    let id = app.create_ticket(json!({ "ticket_type": "inquiry" })).await;
    shift_window(&app.db, id, 30, -6).await;

    let uri = format!("/tickets/{}", id);
    let (status, first) = app.get(&uri, &staff).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["sla_status"], "breached");
    assert_eq!(first["breach_counter"], 1);
    assert_eq!(first["sla_remaining_hours"], 0.0);
    assert_eq!(first["sla_remaining_percent"], 0.0);

    let (_, second) = app.get(&uri, &staff).await;
    assert_eq!(second["breach_counter"], 1);

    let (_, list) = app.get("/tickets?sla_status=breached", &staff).await;
    assert_eq!(list["pagination"]["total"], 1);
    assert_eq!(list["tickets"][0]["breach_counter"], 1);

    assert_eq!(stored(&app.db, id).await.breach_counter, 1);
}

#[tokio::test]
async fn test_stale_observers_do_not_double_count() {
    let app = spawn_app().await;
    let id = app.create_ticket(json!({ "ticket_type": "rma" })).await;
    shift_window(&app.db, id, 10, -1).await;

    let stale = stored(&app.db, id).await;
    let now = Utc::now().fixed_offset();

    let (first, check) = sla::observe(&app.db, stale.clone(), now).await.unwrap();
    assert_eq!(check.sla_status.as_str(), "breached");
    assert_eq!(first.breach_counter, 1);

    // A second reader still holding the pre-breach row loses the compare-and-set
    let (second, _) = sla::observe(&app.db, stale, now).await.unwrap();
    assert_eq!(second.breach_counter, 0);

    let row = stored(&app.db, id).await;
    assert_eq!(row.breach_counter, 1);
    assert_eq!(row.sla_status, "breached");
}

#[tokio::test]
async fn test_at_risk_is_reported_and_persisted() {
    let app = spawn_app().await;
    let staff = Caller::staff();
    let id = app.create_ticket(json!({ "ticket_type": "svc", "priority": "P1" })).await;
    // 4 of 24 hours left
    shift_window(&app.db, id, 20, 4).await;

    let (_, detail) = app.get(&format!("/tickets/{}", id), &staff).await;
    assert_eq!(detail["sla_status"], "at_risk");
    assert_eq!(detail["breach_counter"], 0);
    let remaining = detail["sla_remaining_hours"].as_f64().unwrap();
    assert!(remaining > 3.9 && remaining <= 4.0, "remaining {}", remaining);
    assert_eq!(detail["sla_remaining_percent"], 0.17);

    assert_eq!(stored(&app.db, id).await.sla_status, "at_risk");

    let (_, stats) = app.get("/tickets/stats/summary", &staff).await;
    assert_eq!(stats["by_sla_status"]["at_risk"], 1);
}

#[tokio::test]
async fn test_transition_opens_a_fresh_window() {
    let app = spawn_app().await;
    let staff = Caller::staff();
    let id = app.create_ticket(json!({ "ticket_type": "inquiry", "priority": "P1" })).await;
    let uri = format!("/tickets/{}", id);
    shift_window(&app.db, id, 10, -2).await;

    // Observe the breach, then move on
    let (_, detail) = app.get(&uri, &staff).await;
    assert_eq!(detail["sla_status"], "breached");

    let (status, _) = app
        .patch(&uri, &staff, json!({ "current_node": "in_progress" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, detail) = app.get(&uri, &staff).await;
    assert_eq!(detail["sla_status"], "normal");
    assert_eq!(detail["breach_counter"], 1);
    // P1 solution commitment from the new node entry
    assert_eq!(hours_between(&detail["node_entered_at"], &detail["sla_due_at"]), 24);
}

#[tokio::test]
async fn test_unobserved_breach_is_counted_when_window_closes() {
    let app = spawn_app().await;
    let staff = Caller::staff();
    let id = app.create_ticket(json!({ "ticket_type": "rma" })).await;
    shift_window(&app.db, id, 30, -6).await;

    // No read in between: the breach has never been observed
    let (status, _) = app
        .patch(
            &format!("/tickets/{}", id),
            &staff,
            json!({ "current_node": "ms_review" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let row = stored(&app.db, id).await;
    assert_eq!(row.breach_counter, 1);
    assert_eq!(row.sla_status, "normal");
    assert_eq!(row.current_node, "ms_review");
}

#[tokio::test]
async fn test_priority_change_reprices_from_node_entry() {
    let app = spawn_app().await;
    let staff = Caller::staff();
    let id = app.create_ticket(json!({ "ticket_type": "inquiry", "priority": "P3" })).await;
    shift_window(&app.db, id, 3, 21).await;
    let entered = stored(&app.db, id).await.node_entered_at;

    // P0 first response is 2h, and the window started 3h ago
    let (status, _) = app
        .patch(&format!("/tickets/{}", id), &staff, json!({ "priority": "P0" }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let row = stored(&app.db, id).await;
    assert_eq!(row.node_entered_at, entered);
    assert_eq!(row.sla_due_at, Some(entered + Duration::hours(2)));
    assert_eq!(row.priority, "P0");

    let (_, detail) = app.get(&format!("/tickets/{}", id), &staff).await;
    assert_eq!(detail["sla_status"], "breached");
    assert_eq!(detail["breach_counter"], 1);
}

#[tokio::test]
async fn test_priority_flips_do_not_recount_a_breach() {
    let app = spawn_app().await;
    let staff = Caller::staff();
    let id = app.create_ticket(json!({ "ticket_type": "inquiry", "priority": "P1" })).await;
    let uri = format!("/tickets/{}", id);
    // 10h into an 8h first response window
    shift_window(&app.db, id, 10, -2).await;

    let (_, detail) = app.get(&uri, &staff).await;
    assert_eq!(detail["breach_counter"], 1);

    // P2 moves the deadline back into the future, P1 puts it in the past again
    for priority in ["P2", "P1", "P2", "P1"] {
        let (status, _) = app.patch(&uri, &staff, json!({ "priority": priority })).await;
        assert_eq!(status, StatusCode::OK);
        let (_, detail) = app.get(&uri, &staff).await;
        assert_eq!(detail["breach_counter"], 1, "after {}", priority);
        assert_eq!(detail["sla_status"], "breached");
    }

    // The next node starts a clean residency
    app.patch(&uri, &staff, json!({ "current_node": "in_progress" }))
        .await;
    let row = stored(&app.db, id).await;
    assert_eq!(row.breach_counter, 1);
    assert_eq!(row.sla_status, "normal");
}

#[tokio::test]
async fn test_priority_change_counts_an_unobserved_breach_once() {
    let app = spawn_app().await;
    let staff = Caller::staff();
    let id = app.create_ticket(json!({ "ticket_type": "inquiry", "priority": "P1" })).await;
    let uri = format!("/tickets/{}", id);
    // 10h into an 8h window that nobody has read
    shift_window(&app.db, id, 10, -2).await;

    app.patch(&uri, &staff, json!({ "priority": "P2" })).await;
    let row = stored(&app.db, id).await;
    assert_eq!(row.breach_counter, 1);
    assert_eq!(row.sla_status, "breached");
    assert_eq!(row.sla_due_at, Some(row.node_entered_at + Duration::hours(24)));

    app.patch(&uri, &staff, json!({ "priority": "P0" })).await;
    let (_, detail) = app.get(&uri, &staff).await;
    assert_eq!(detail["breach_counter"], 1);
}

#[tokio::test]
async fn test_nodes_without_commitment_carry_no_sla() {
    let app = spawn_app().await;
    let staff = Caller::staff();
    let id = app.create_ticket(json!({ "ticket_type": "inquiry" })).await;
    let uri = format!("/tickets/{}", id);

    app.patch(&uri, &staff, json!({ "current_node": "waiting_customer" }))
        .await;

    let (_, detail) = app.get(&uri, &staff).await;
    assert_eq!(detail["status"], "waiting");
    assert!(detail["sla_due_at"].is_null());
    assert!(detail["sla_remaining_percent"].is_null());
    assert_eq!(detail["sla_status"], "normal");

    // Priority changes on such a node still leave it without a deadline
    app.patch(&uri, &staff, json!({ "priority": "P0" })).await;
    let (_, detail) = app.get(&uri, &staff).await;
    assert!(detail["sla_due_at"].is_null());
}
