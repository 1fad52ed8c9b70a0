//! Ticket timeline handlers
//!
//! Activities are append-only, so there are no update or delete routes.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use chrono::Utc;
use tracing::info;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::handlers::{malformed, reject};
use crate::models::activity::{
    ActivityListQuery, ActivityListResponse, ActivityResponse, CreateActivityRequest,
};
use crate::services::{activity_log, tickets};
use crate::AppState;

/// GET /tickets/{id}/activities
///
/// # Query Parameters
/// - `activity_type`: status_change, priority_change, assignment_change, ticket_linked,
///   comment, mention
/// - `visibility`: all | internal (staff only; dealers always get `all`)
/// - `page` (default: 1), `page_size` (default: 50, max: 100)
pub async fn list_activities(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<i32>, PathRejection>,
    query: Result<Query<ActivityListQuery>, QueryRejection>,
) -> Result<Json<ActivityListResponse>, ApiError> {
    let Path(id) = id.map_err(|e| malformed("list_activities", e.body_text()))?;
    let Query(query) = query.map_err(|e| malformed("list_activities", e.body_text()))?;
    info!(ticket_id = id, user_id = user.id, "Listing ticket activities");

    let ticket = tickets::load_for(&state.db, id, &user)
        .await
        .map_err(|e| reject("list_activities", e))?;

    let response = activity_log::list_for_ticket(&state.db, ticket.id, &query, &user)
        .await
        .map_err(|e| reject("list_activities", e))?;

    Ok(Json(response))
}

/// POST /tickets/{id}/activities
///
/// Adds a comment. `@[name](user_id)` mentions add the user to the ticket's participants.
///
/// # Response
/// - 200: The stored comment
/// - 400: Missing content
/// - 403: Dealer caller does not own the ticket
/// - 404: Ticket not found
pub async fn create_activity(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<CreateActivityRequest>, JsonRejection>,
) -> Result<Json<ActivityResponse>, ApiError> {
    let Path(id) = id.map_err(|e| malformed("create_activity", e.body_text()))?;
    let Json(req) = payload.map_err(|e| malformed("create_activity", e.body_text()))?;
    info!(ticket_id = id, user_id = user.id, "Adding comment");

    let activity =
        activity_log::add_comment(&state.db, id, req, &user, Utc::now().fixed_offset())
            .await
            .map_err(|e| reject("create_activity", e))?;

    Ok(Json(activity))
}
