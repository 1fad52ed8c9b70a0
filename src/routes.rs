//! Router assembly

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{activities, sla, tickets};
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/tickets",
            get(tickets::list_tickets).post(tickets::create_ticket),
        )
        .route("/tickets/stats/summary", get(tickets::ticket_stats))
        .route("/tickets/sla/matrix", get(sla::get_sla_matrix))
        .route(
            "/tickets/{id}",
            get(tickets::get_ticket).patch(tickets::update_ticket),
        )
        .route("/tickets/{id}/convert", post(tickets::convert_ticket))
        .route(
            "/tickets/{id}/activities",
            get(activities::list_activities).post(activities::create_activity),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
