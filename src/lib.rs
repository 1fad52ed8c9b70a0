// src/lib.rs

use sea_orm::DatabaseConnection;
use services::{
    directory::{NullDirectory, PartyDirectory},
    state_machine::TicketStateMachine,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub state_machine: TicketStateMachine,
    pub directory: Arc<dyn PartyDirectory>,
    /// Channel used for rma numbers when the request names none
    pub default_channel_code: String,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        state_machine: TicketStateMachine,
        default_channel_code: impl Into<String>,
    ) -> Self {
        Self {
            db,
            state_machine,
            directory: Arc::new(NullDirectory),
            default_channel_code: default_channel_code.into(),
        }
    }

    pub fn with_directory(mut self, directory: Arc<dyn PartyDirectory>) -> Self {
        self.directory = directory;
        self
    }
}

pub mod entities {
    pub mod prelude;
    pub mod ticket_activities;
    pub mod ticket_sequences;
    pub mod tickets;
}

pub mod services {
    pub mod activity_log;
    pub mod conversion;
    pub mod directory;
    pub mod sequence;
    pub mod sla;
    pub mod state_machine;
    pub mod tickets;
}

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
