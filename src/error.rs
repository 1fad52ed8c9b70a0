//! Error taxonomy shared by the ticket services and handlers

use axum::{http::StatusCode, Json};
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use tracing::error;

/// Error types for ticket operations
#[derive(Debug)]
pub enum TicketError {
    /// Missing or invalid input; detected before any mutation
    Validation(String),
    /// No usable caller identity
    Unauthorized(String),
    NotFound(String),
    /// Dealer caller touching another dealer's ticket
    Forbidden(String),
    /// Conversion attempted on a non-inquiry or already converted ticket
    InvalidSourceType(String),
    /// Refused by the installed transition policy
    InvalidTransition(String),
    Database(DbErr),
}

impl TicketError {
    pub fn code(&self) -> &'static str {
        match self {
            TicketError::Validation(_) => "VALIDATION_ERROR",
            TicketError::Unauthorized(_) => "UNAUTHORIZED",
            TicketError::NotFound(_) => "NOT_FOUND",
            TicketError::Forbidden(_) => "FORBIDDEN",
            TicketError::InvalidSourceType(_) => "INVALID_SOURCE_TYPE",
            TicketError::InvalidTransition(_) => "INVALID_TRANSITION",
            TicketError::Database(_) => "SERVER_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            TicketError::Validation(_) => StatusCode::BAD_REQUEST,
            TicketError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            TicketError::NotFound(_) => StatusCode::NOT_FOUND,
            TicketError::Forbidden(_) => StatusCode::FORBIDDEN,
            TicketError::InvalidSourceType(_) => StatusCode::BAD_REQUEST,
            TicketError::InvalidTransition(_) => StatusCode::CONFLICT,
            TicketError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn ticket_not_found(id: i32) -> Self {
        TicketError::NotFound(format!("Ticket {} not found", id))
    }
}

impl std::fmt::Display for TicketError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketError::Validation(msg) => write!(f, "Validation error: {}", msg),
            TicketError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            TicketError::NotFound(msg) => write!(f, "Not found: {}", msg),
            TicketError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            TicketError::InvalidSourceType(msg) => write!(f, "Invalid source type: {}", msg),
            TicketError::InvalidTransition(msg) => write!(f, "Invalid transition: {}", msg),
            TicketError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for TicketError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TicketError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DbErr> for TicketError {
    fn from(e: DbErr) -> Self {
        TicketError::Database(e)
    }
}

/// JSON error body returned by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub error: String,
}

/// Handler error type
pub type ApiError = (StatusCode, Json<ErrorResponse>);

impl From<TicketError> for (StatusCode, Json<ErrorResponse>) {
    fn from(e: TicketError) -> Self {
        if let TicketError::Database(ref db_err) = e {
            error!(error = %db_err, "Datastore failure");
        }
        (
            e.status_code(),
            Json(ErrorResponse {
                code: e.code().to_string(),
                error: e.to_string(),
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_statuses() {
        let cases = [
            (TicketError::Validation("x".into()), "VALIDATION_ERROR", 400),
            (TicketError::Unauthorized("x".into()), "UNAUTHORIZED", 401),
            (TicketError::Forbidden("x".into()), "FORBIDDEN", 403),
            (TicketError::ticket_not_found(1), "NOT_FOUND", 404),
            (TicketError::InvalidSourceType("x".into()), "INVALID_SOURCE_TYPE", 400),
            (TicketError::InvalidTransition("x".into()), "INVALID_TRANSITION", 409),
            (TicketError::Database(DbErr::Custom("boom".into())), "SERVER_ERROR", 500),
        ];
        for (err, code, status) in cases {
            assert_eq!(err.code(), code);
            assert_eq!(err.status_code().as_u16(), status);
        }
    }

    #[test]
    fn test_into_api_error_carries_code() {
        let (status, Json(body)): ApiError = TicketError::ticket_not_found(42).into();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, "NOT_FOUND");
        assert!(body.error.contains("42"));
    }
}
