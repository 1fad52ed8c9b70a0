//! HTTP handlers for the ticket engine
//!
//! Handlers extract and validate input, call into `services`, and turn every failure
//! into a `(StatusCode, Json<ErrorResponse>)` pair.

use tracing::warn;

use crate::error::{ApiError, TicketError};

pub mod activities;
pub mod sla;
pub mod tickets;

/// Convert a service error, logging client-side failures (datastore failures are logged
/// by the conversion itself).
pub(crate) fn reject(operation: &'static str, err: TicketError) -> ApiError {
    if !matches!(err, TicketError::Database(_)) {
        warn!(operation, code = err.code(), error = %err, "Request rejected");
    }
    err.into()
}

/// Malformed path, query or body
pub(crate) fn malformed(operation: &'static str, message: String) -> ApiError {
    reject(operation, TicketError::Validation(message))
}
