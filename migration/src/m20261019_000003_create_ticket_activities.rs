//! Migration to create the append-only ticket activity timeline

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TicketActivities::Table)
                    .if_not_exists()
                    .col(pk_auto(TicketActivities::Id))
                    .col(integer(TicketActivities::TicketId))
                    .col(string_len(TicketActivities::ActivityType, 32))
                    .col(text_null(TicketActivities::Content))
                    .col(json_null(TicketActivities::Metadata))
                    .col(integer_null(TicketActivities::ActorId))
                    .col(string_null(TicketActivities::ActorName))
                    .col(string_len_null(TicketActivities::ActorRole, 8))
                    .col(string_len(TicketActivities::Visibility, 16).default("all"))
                    .col(timestamp_with_time_zone(TicketActivities::CreatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_ticket_activities_ticket_id")
                            .from(TicketActivities::Table, TicketActivities::TicketId)
                            .to(Tickets::Table, Tickets::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_ticket_activities_ticket_id")
                    .table(TicketActivities::Table)
                    .col(TicketActivities::TicketId)
                    .col(TicketActivities::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TicketActivities::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TicketActivities {
    Table,
    Id,
    TicketId,
    ActivityType,
    Content,
    Metadata,
    ActorId,
    ActorName,
    ActorRole,
    Visibility,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Tickets {
    Table,
    Id,
}
