//! Migration to create the unified tickets table (inquiry / rma / svc)

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Tickets::Table)
                    .if_not_exists()
                    .col(pk_auto(Tickets::Id))
                    .col(string_uniq(Tickets::TicketNumber))
                    .col(string_len(Tickets::TicketType, 16))
                    .col(string_len_null(Tickets::ChannelCode, 8))
                    // Classification
                    .col(string_null(Tickets::IssueType))
                    .col(string_null(Tickets::IssueCategory))
                    .col(string_null(Tickets::IssueSubcategory))
                    .col(integer(Tickets::Severity).default(3))
                    .col(boolean(Tickets::IsWarranty).default(true))
                    // Lifecycle
                    .col(string_len(Tickets::CurrentNode, 32))
                    .col(string_len(Tickets::Status, 16))
                    .col(timestamp_with_time_zone_null(Tickets::StatusChangedAt))
                    .col(timestamp_with_time_zone(Tickets::NodeEnteredAt))
                    // SLA
                    .col(string_len(Tickets::Priority, 2))
                    .col(timestamp_with_time_zone_null(Tickets::SlaDueAt))
                    .col(string_len(Tickets::SlaStatus, 16).default("normal"))
                    .col(integer(Tickets::BreachCounter).default(0))
                    // Parties
                    .col(integer_null(Tickets::AccountId))
                    .col(integer_null(Tickets::ContactId))
                    .col(integer_null(Tickets::DealerId))
                    .col(string_null(Tickets::ReporterName))
                    .col(string_null(Tickets::ReporterType))
                    .col(string_null(Tickets::Region))
                    .col(integer_null(Tickets::AssignedTo))
                    .col(integer_null(Tickets::SubmittedBy))
                    .col(integer_null(Tickets::CreatedBy))
                    // Product
                    .col(integer_null(Tickets::ProductId))
                    .col(string_null(Tickets::SerialNumber))
                    .col(string_null(Tickets::FirmwareVersion))
                    .col(string_null(Tickets::HardwareVersion))
                    // Content
                    .col(string_null(Tickets::ServiceType))
                    .col(string_null(Tickets::Channel))
                    .col(text_null(Tickets::ProblemSummary))
                    .col(text_null(Tickets::CommunicationLog))
                    .col(text_null(Tickets::ProblemDescription))
                    .col(text_null(Tickets::SolutionForCustomer))
                    .col(text_null(Tickets::RepairContent))
                    .col(text_null(Tickets::ProblemAnalysis))
                    .col(text_null(Tickets::Resolution))
                    // Payment
                    .col(string_null(Tickets::PaymentChannel))
                    .col(double_null(Tickets::PaymentAmount))
                    .col(date_null(Tickets::PaymentDate))
                    // Date checkpoints
                    .col(date_null(Tickets::FeedbackDate))
                    .col(date_null(Tickets::ShipDate))
                    .col(date_null(Tickets::ReceivedDate))
                    .col(date_null(Tickets::CompletedDate))
                    .col(timestamp_with_time_zone_null(Tickets::FirstResponseAt))
                    // Collaboration
                    .col(json_null(Tickets::Participants))
                    .col(timestamp_with_time_zone_null(Tickets::SnoozeUntil))
                    // Lineage
                    .col(integer_null(Tickets::ParentTicketId))
                    .col(string_null(Tickets::ExternalLink))
                    // Approval
                    .col(string_null(Tickets::ApprovalStatus))
                    .col(integer_null(Tickets::ApprovedBy))
                    .col(timestamp_with_time_zone_null(Tickets::ApprovedAt))
                    .col(timestamp_with_time_zone(Tickets::CreatedAt))
                    .col(timestamp_with_time_zone(Tickets::UpdatedAt))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tickets_parent_ticket_id")
                            .from(Tickets::Table, Tickets::ParentTicketId)
                            .to(Tickets::Table, Tickets::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        for (name, column) in [
            ("idx_tickets_ticket_type", Tickets::TicketType),
            ("idx_tickets_status", Tickets::Status),
            ("idx_tickets_dealer_id", Tickets::DealerId),
            ("idx_tickets_created_at", Tickets::CreatedAt),
        ] {
            manager
                .create_index(
                    Index::create()
                        .name(name)
                        .table(Tickets::Table)
                        .col(column)
                        .to_owned(),
                )
                .await?;
        }

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Tickets::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Tickets {
    Table,
    Id,
    TicketNumber,
    TicketType,
    ChannelCode,
    IssueType,
    IssueCategory,
    IssueSubcategory,
    Severity,
    IsWarranty,
    CurrentNode,
    Status,
    StatusChangedAt,
    NodeEnteredAt,
    Priority,
    SlaDueAt,
    SlaStatus,
    BreachCounter,
    AccountId,
    ContactId,
    DealerId,
    ReporterName,
    ReporterType,
    Region,
    AssignedTo,
    SubmittedBy,
    CreatedBy,
    ProductId,
    SerialNumber,
    FirmwareVersion,
    HardwareVersion,
    ServiceType,
    Channel,
    ProblemSummary,
    CommunicationLog,
    ProblemDescription,
    SolutionForCustomer,
    RepairContent,
    ProblemAnalysis,
    Resolution,
    PaymentChannel,
    PaymentAmount,
    PaymentDate,
    FeedbackDate,
    ShipDate,
    ReceivedDate,
    CompletedDate,
    FirstResponseAt,
    Participants,
    SnoozeUntil,
    ParentTicketId,
    ExternalLink,
    ApprovalStatus,
    ApprovedBy,
    ApprovedAt,
    CreatedAt,
    UpdatedAt,
}
