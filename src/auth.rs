//! Authenticated caller context
//!
//! Authentication happens upstream; the gateway forwards the verified identity as
//! `x-user-*` headers. This module only turns those headers into an [`AuthUser`] and
//! answers dealer-scoping questions.

use axum::{extract::FromRequestParts, http::request::Parts, http::HeaderMap};

use crate::entities::tickets;
use crate::error::{ApiError, TicketError};

pub const HEADER_USER_ID: &str = "x-user-id";
pub const HEADER_USER_NAME: &str = "x-user-name";
pub const HEADER_USER_ROLE: &str = "x-user-role";
pub const HEADER_USER_DEPARTMENT: &str = "x-user-department";
pub const HEADER_DEALER_ID: &str = "x-dealer-id";

const DEALER_ROLE: &str = "dealer";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: i32,
    pub name: String,
    pub role: Option<String>,
    pub department: Option<String>,
    pub dealer_id: Option<i32>,
}

impl AuthUser {
    pub fn staff(id: i32, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            role: Some("Staff".to_string()),
            department: None,
            dealer_id: None,
        }
    }

    pub fn dealer(id: i32, name: &str, dealer_id: i32) -> Self {
        Self {
            id,
            name: name.to_string(),
            role: Some("Dealer".to_string()),
            department: None,
            dealer_id: Some(dealer_id),
        }
    }

    pub fn is_dealer(&self) -> bool {
        self.role
            .as_deref()
            .map(|r| r.eq_ignore_ascii_case(DEALER_ROLE))
            .unwrap_or(false)
    }

    /// Team code recorded on activities
    pub fn actor_role(&self) -> &'static str {
        if self.is_dealer() {
            return "DL";
        }
        match self.department.as_deref().map(str::to_lowercase).as_deref() {
            Some("production") => "OP",
            Some("rd") => "RD",
            Some("finance") => "GE",
            _ => "MS",
        }
    }

    /// Dealer callers only reach tickets of their own dealer; a dealer without a
    /// dealer id reaches nothing.
    pub fn can_access(&self, ticket: &tickets::Model) -> bool {
        if !self.is_dealer() {
            return true;
        }
        self.dealer_id.is_some() && ticket.dealer_id == self.dealer_id
    }

    pub fn ensure_access(&self, ticket: &tickets::Model) -> Result<(), TicketError> {
        if self.can_access(ticket) {
            Ok(())
        } else {
            Err(TicketError::Forbidden(format!(
                "No access to ticket {}",
                ticket.ticket_number
            )))
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Result<Self, TicketError> {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let id = text(HEADER_USER_ID)
            .ok_or_else(|| TicketError::Unauthorized("Missing x-user-id header".to_string()))?
            .parse::<i32>()
            .map_err(|_| TicketError::Unauthorized("Malformed x-user-id header".to_string()))?;

        let dealer_id = match text(HEADER_DEALER_ID) {
            Some(raw) => Some(raw.parse::<i32>().map_err(|_| {
                TicketError::Unauthorized("Malformed x-dealer-id header".to_string())
            })?),
            None => None,
        };

        Ok(Self {
            id,
            name: text(HEADER_USER_NAME).unwrap_or_else(|| format!("user-{}", id)),
            role: text(HEADER_USER_ROLE),
            department: text(HEADER_USER_DEPARTMENT),
            dealer_id,
        })
    }
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        AuthUser::from_headers(&parts.headers).map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_missing_user_id_is_unauthorized() {
        let err = AuthUser::from_headers(&headers(&[(HEADER_USER_NAME, "x")])).unwrap_err();
        assert_eq!(err.code(), "UNAUTHORIZED");
    }

    #[test]
    fn test_dealer_context_from_headers() {
        let user = AuthUser::from_headers(&headers(&[
            (HEADER_USER_ID, "12"),
            (HEADER_USER_NAME, "Ann"),
            (HEADER_USER_ROLE, "Dealer"),
            (HEADER_DEALER_ID, "5"),
        ]))
        .unwrap();
        assert!(user.is_dealer());
        assert_eq!(user.dealer_id, Some(5));
        assert_eq!(user.actor_role(), "DL");
    }

    #[test]
    fn test_actor_role_from_department() {
        let mut user = AuthUser::staff(1, "Op");
        user.department = Some("Production".to_string());
        assert_eq!(user.actor_role(), "OP");
        user.department = Some("finance".to_string());
        assert_eq!(user.actor_role(), "GE");
        user.department = None;
        assert_eq!(user.actor_role(), "MS");
    }
}
