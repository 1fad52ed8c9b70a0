//! `SeaORM` Entity prelude

pub use super::ticket_activities::Entity as TicketActivities;
pub use super::ticket_sequences::Entity as TicketSequences;
pub use super::tickets::Entity as Tickets;
