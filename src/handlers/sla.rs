//! SLA reference data
//!
//! GET /tickets/sla/matrix

use axum::Json;
use tracing::debug;

use crate::auth::AuthUser;
use crate::models::sla::SlaMatrixResponse;
use crate::services::sla;

/// GET /tickets/sla/matrix
///
/// Returns the commitment hours per priority and phase, plus the at-risk threshold.
pub async fn get_sla_matrix(user: AuthUser) -> Json<SlaMatrixResponse> {
    debug!(user_id = user.id, "Fetching SLA matrix");
    Json(sla::matrix())
}
