//! Migration to create the ticket number sequence counters
//!
//! One row per (ticket_type, channel_code, year_month). Types without a channel store an
//! empty channel code so the unique key stays usable as an upsert conflict target.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TicketSequences::Table)
                    .if_not_exists()
                    .col(pk_auto(TicketSequences::Id))
                    .col(string_len(TicketSequences::TicketType, 16))
                    .col(string_len(TicketSequences::ChannelCode, 8).default(""))
                    .col(string_len(TicketSequences::YearMonth, 4))
                    .col(integer(TicketSequences::LastSequence))
                    .col(timestamp_with_time_zone(TicketSequences::UpdatedAt))
                    .to_owned(),
            )
            .await?;

        // Conflict target for the atomic increment
        manager
            .create_index(
                Index::create()
                    .name("idx_ticket_sequences_partition")
                    .table(TicketSequences::Table)
                    .col(TicketSequences::TicketType)
                    .col(TicketSequences::ChannelCode)
                    .col(TicketSequences::YearMonth)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TicketSequences::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum TicketSequences {
    Table,
    Id,
    TicketType,
    ChannelCode,
    YearMonth,
    LastSequence,
    UpdatedAt,
}
