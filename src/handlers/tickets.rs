//! Ticket handlers
//!
//! - GET /tickets
//! - POST /tickets
//! - GET /tickets/{id}
//! - PATCH /tickets/{id}
//! - POST /tickets/{id}/convert
//! - GET /tickets/stats/summary

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
use crate::models::ticket::{
    ConvertTicketRequest, ConvertTicketResponse, CreateTicketRequest, CreateTicketResponse,
    TicketDetail, TicketListQuery, TicketListResponse, TicketStatsQuery, TicketStatsResponse,
    UpdateTicketRequest, UpdateTicketResponse,
};
use crate::services::{conversion, tickets};
use crate::AppState;

/// GET /tickets
///
/// # Query Parameters
/// - `ticket_type`, `status`, `current_node`, `priority`, `sla_status`
/// - `account_id`, `dealer_id`, `assigned_to`, `submitted_by`
/// - `serial_number`, `keyword` (substring)
/// - `created_from`, `created_to` (RFC 3339 or YYYY-MM-DD)
/// - `page` (default: 1), `page_size` (default: 20, max: 100)
/// - `sort_by`, `sort_order` (default: created_at desc)
///
/// # Response
/// - 200: Tickets and pagination
/// - 400: Invalid filter, sort or pagination
/// - 500: Database error
pub async fn list_tickets(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<TicketListQuery>, QueryRejection>,
) -> Result<Json<TicketListResponse>, ApiError> {
    let Query(query) = query.map_err(|e| malformed("list_tickets", e.body_text()))?;
    info!(user_id = user.id, query = ?query, "Listing tickets");

    let response = tickets::list_tickets(&state.db, &query, &user, Utc::now().fixed_offset())
        .await
        .map_err(|e| reject("list_tickets", e))?;

    info!(
        total = response.pagination.total,
        returned = response.tickets.len(),
        "Ticket list completed"
    );
    Ok(Json(response))
}

/// POST /tickets
///
/// # Response
/// - 200: `{id, ticket_number, ticket_type, current_node, priority, sla_due_at}`
/// - 400: Missing or invalid ticket_type, channel_code, severity or parent_ticket_id
pub async fn create_ticket(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CreateTicketRequest>, JsonRejection>,
) -> Result<Json<CreateTicketResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| malformed("create_ticket", e.body_text()))?;
    info!(
        user_id = user.id,
        ticket_type = ?req.ticket_type,
        priority = ?req.priority,
        "Creating ticket"
    );

    let response = tickets::create_ticket(
        &state.db,
        &state.default_channel_code,
        req,
        &user,
        Utc::now().fixed_offset(),
    )
    .await
    .map_err(|e| reject("create_ticket", e))?;

    Ok(Json(response))
}

/// GET /tickets/{id}
///
/// # Response
/// - 200: Ticket detail including SLA remaining time
/// - 403: Dealer caller does not own the ticket
/// - 404: Ticket not found
pub async fn get_ticket(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<i32>, PathRejection>,
) -> Result<Json<TicketDetail>, ApiError> {
    let Path(id) = id.map_err(|e| malformed("get_ticket", e.body_text()))?;
    info!(ticket_id = id, user_id = user.id, "Fetching ticket");

    let detail = tickets::get_ticket(
        &state.db,
        state.directory.as_ref(),
        id,
        &user,
        Utc::now().fixed_offset(),
    )
    .await
    .map_err(|e| reject("get_ticket", e))?;

    Ok(Json(detail))
}

/// PATCH /tickets/{id}
///
/// Accepts any subset of the writable fields; unknown fields are ignored.
///
/// # Response
/// - 200: `{updated, message}`; `updated = false` with "no update" when nothing changed
/// - 400: Invalid node or field value
/// - 403: Dealer caller does not own the ticket
/// - 404: Ticket not found
/// - 409: Node move refused by the transition policy
pub async fn update_ticket(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<UpdateTicketRequest>, JsonRejection>,
) -> Result<Json<UpdateTicketResponse>, ApiError> {
    let Path(id) = id.map_err(|e| malformed("update_ticket", e.body_text()))?;
    let Json(req) = payload.map_err(|e| malformed("update_ticket", e.body_text()))?;
    info!(
        ticket_id = id,
        user_id = user.id,
        current_node = ?req.current_node,
        priority = ?req.priority,
        "Updating ticket"
    );

    let response = tickets::update_ticket(
        &state.db,
        &state.state_machine,
        id,
        req,
        &user,
        Utc::now().fixed_offset(),
    )
    .await
    .map_err(|e| reject("update_ticket", e))?;

    Ok(Json(response))
}

/// POST /tickets/{id}/convert
///
/// # Response
/// - 200: New ticket id/number and the original ticket id/number
/// - 400: Source is not an unconverted inquiry, or target_type is not rma/svc
/// - 403: Dealer caller does not own the ticket
/// - 404: Ticket not found
pub async fn convert_ticket(
    State(state): State<AppState>,
    user: AuthUser,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<ConvertTicketRequest>, JsonRejection>,
) -> Result<Json<ConvertTicketResponse>, ApiError> {
    let Path(id) = id.map_err(|e| malformed("convert_ticket", e.body_text()))?;
    let Json(req) = payload.map_err(|e| malformed("convert_ticket", e.body_text()))?;
    info!(
        ticket_id = id,
        user_id = user.id,
        target_type = ?req.target_type,
        "Converting ticket"
    );

    let response = conversion::convert_ticket(
        &state.db,
        &state.state_machine,
        &state.default_channel_code,
        id,
        req,
        &user,
        Utc::now().fixed_offset(),
    )
    .await
    .map_err(|e| reject("convert_ticket", e))?;

    Ok(Json(response))
}

/// GET /tickets/stats/summary
///
/// # Query Parameters
/// - `ticket_type`
/// - `created_from`, `created_to` (RFC 3339 or YYYY-MM-DD)
///
/// # Response
/// - 200: Total and counts by status, priority, SLA status and type
pub async fn ticket_stats(
    State(state): State<AppState>,
    user: AuthUser,
    query: Result<Query<TicketStatsQuery>, QueryRejection>,
) -> Result<Json<TicketStatsResponse>, ApiError> {
    let Query(query) = query.map_err(|e| malformed("ticket_stats", e.body_text()))?;
    info!(user_id = user.id, query = ?query, "Computing ticket stats");

    let stats = tickets::ticket_stats(&state.db, &query, &user)
        .await
        .map_err(|e| reject("ticket_stats", e))?;

    Ok(Json(stats))
}
