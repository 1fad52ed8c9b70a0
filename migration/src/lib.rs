pub use sea_orm_migration::prelude::*;

mod m20261019_000001_create_tickets;
mod m20261019_000002_create_ticket_sequences;
mod m20261019_000003_create_ticket_activities;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261019_000001_create_tickets::Migration),
            Box::new(m20261019_000002_create_ticket_sequences::Migration),
            Box::new(m20261019_000003_create_ticket_activities::Migration),
        ]
    }
}
