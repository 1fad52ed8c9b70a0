//! Display-name lookups for the parties a ticket references
//!
//! Accounts, contacts, dealers, products and users live in other services. The ticket
//! detail view asks a [`PartyDirectory`] for their names; a missing name is never an error.

use async_trait::async_trait;

use crate::entities::tickets;
use crate::models::ticket::DisplayNames;

#[async_trait]
pub trait PartyDirectory: Send + Sync {
    async fn display_names(&self, ticket: &tickets::Model) -> DisplayNames;
}

/// Resolves nothing; used when no directory is wired in
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDirectory;

#[async_trait]
impl PartyDirectory for NullDirectory {
    async fn display_names(&self, _ticket: &tickets::Model) -> DisplayNames {
        DisplayNames::default()
    }
}
