//! Inquiry promotion into rma / svc tickets
//!
//! Conversion creates a new linked ticket and closes the source as `converted` in one
//! transaction. It is one-way: a converted inquiry can never be converted again.

use chrono::{DateTime, FixedOffset, Local};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use tracing::info;

use crate::auth::AuthUser;
use crate::entities::{prelude::Tickets, tickets};
use crate::error::TicketError;
use crate::models::activity::{ActivityMetadata, ActivityType};
use crate::models::node::{InquiryNode, Node};
use crate::models::sla::SlaStatus;
use crate::models::ticket::{ConvertTicketRequest, ConvertTicketResponse, Priority, TicketType};
use crate::services::activity_log::{self, ActivityEntry};
use crate::services::sequence::{self, PartitionKey};
use crate::services::state_machine::{ticket_type_of, TicketStateMachine};
use crate::services::{sla, tickets as ticket_store};

/// Parse and check the requested target; only rma and svc can be conversion targets
pub fn parse_target(raw: Option<&str>) -> Result<TicketType, TicketError> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| TicketError::Validation("target_type is required".to_string()))?;

    match raw.parse::<TicketType>().map_err(TicketError::Validation)? {
        TicketType::Inquiry => Err(TicketError::Validation(
            "target_type must be rma or svc".to_string(),
        )),
        target => Ok(target),
    }
}

/// Fields carried from the inquiry onto the new ticket
fn child_from_source(
    source: &tickets::Model,
    target: TicketType,
    key: &PartitionKey,
    ticket_number: String,
    caller: &AuthUser,
    now: DateTime<FixedOffset>,
) -> tickets::ActiveModel {
    let node = Node::initial(target);
    let priority = source.priority.parse::<Priority>().unwrap_or_default();

    tickets::ActiveModel {
        ticket_number: Set(ticket_number),
        ticket_type: Set(target.as_str().to_string()),
        channel_code: Set(key.channel_code.clone()),

        issue_type: Set(source.issue_type.clone()),
        issue_category: Set(source.issue_category.clone()),
        issue_subcategory: Set(source.issue_subcategory.clone()),
        severity: Set(source.severity),
        is_warranty: Set(source.is_warranty),

        current_node: Set(node.as_str().to_string()),
        status: Set(node.status().as_str().to_string()),
        status_changed_at: Set(Some(now)),
        node_entered_at: Set(now),

        priority: Set(priority.as_str().to_string()),
        sla_due_at: Set(sla::calculate_due(priority, node, now)),
        sla_status: Set(SlaStatus::Normal.as_str().to_string()),
        breach_counter: Set(0),

        account_id: Set(source.account_id),
        contact_id: Set(source.contact_id),
        dealer_id: Set(source.dealer_id),
        reporter_name: Set(source.reporter_name.clone()),
        reporter_type: Set(source.reporter_type.clone()),
        region: Set(source.region.clone()),
        submitted_by: Set(Some(caller.id)),
        created_by: Set(Some(caller.id)),

        product_id: Set(source.product_id),
        serial_number: Set(source.serial_number.clone()),
        firmware_version: Set(source.firmware_version.clone()),
        hardware_version: Set(source.hardware_version.clone()),

        service_type: Set(source.service_type.clone()),
        channel: Set(source.channel.clone()),
        problem_description: Set(source
            .problem_description
            .clone()
            .or_else(|| source.problem_summary.clone())),
        feedback_date: Set(source.feedback_date),

        parent_ticket_id: Set(Some(source.id)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
}

pub async fn convert_ticket(
    db: &DatabaseConnection,
    state_machine: &TicketStateMachine,
    default_channel_code: &str,
    id: i32,
    req: ConvertTicketRequest,
    caller: &AuthUser,
    now: DateTime<FixedOffset>,
) -> Result<ConvertTicketResponse, TicketError> {
    let target = parse_target(req.target_type.as_deref())?;
    let key = PartitionKey::for_creation(
        target,
        req.channel_code.as_deref(),
        default_channel_code,
        &now.with_timezone(&Local),
    )
    .map_err(TicketError::Validation)?;

    let txn = db.begin().await?;
    let source = ticket_store::load_for_update(&txn, id, caller).await?;

    if ticket_type_of(&source)? != TicketType::Inquiry {
        return Err(TicketError::InvalidSourceType(format!(
            "{} is a {} ticket; only inquiries can be converted",
            source.ticket_number, source.ticket_type
        )));
    }
    let converted = Node::Inquiry(InquiryNode::Converted);
    if source.current_node == converted.as_str() {
        return Err(TicketError::InvalidSourceType(format!(
            "{} has already been converted",
            source.ticket_number
        )));
    }

    // Close the source first, conditioned on the node we read: of two concurrent
    // conversions only one matches.
    let priority = source.priority.parse::<Priority>().unwrap_or_default();
    let mut closing: tickets::ActiveModel = source.clone().into();
    state_machine.apply(&source, &mut closing, converted, priority, now);
    closing.updated_at = Set(now);

    let closed = Tickets::update_many()
        .set(closing)
        .filter(tickets::Column::Id.eq(source.id))
        .filter(tickets::Column::CurrentNode.eq(source.current_node.clone()))
        .exec(&txn)
        .await?;
    if closed.rows_affected != 1 {
        return Err(TicketError::InvalidSourceType(format!(
            "{} has already been converted",
            source.ticket_number
        )));
    }

    let ticket_number = sequence::allocate_ticket_number(&txn, &key).await?;
    let child = child_from_source(&source, target, &key, ticket_number, caller, now)
        .insert(&txn)
        .await?;

    activity_log::append(
        &txn,
        ActivityEntry::new(source.id, ActivityType::TicketLinked)
            .content(format!("Converted to {}", child.ticket_number))
            .metadata(ActivityMetadata::TicketLinked {
                linked_ticket_id: child.id,
                linked_ticket_number: child.ticket_number.clone(),
                target_type: target,
            })
            .actor(caller),
        now,
    )
    .await?;

    activity_log::append(
        &txn,
        ActivityEntry::new(child.id, ActivityType::StatusChange)
            .content(format!("Created from {}", source.ticket_number))
            .metadata(ActivityMetadata::StatusChange {
                from_node: None,
                to_node: child.current_node.clone(),
                from_ticket_id: Some(source.id),
                from_ticket_number: Some(source.ticket_number.clone()),
            })
            .actor(caller),
        now,
    )
    .await?;

    txn.commit().await?;

    info!(
        source_id = source.id,
        source_number = %source.ticket_number,
        new_id = child.id,
        new_number = %child.ticket_number,
        target_type = %target,
        actor_id = caller.id,
        "Inquiry converted"
    );

    Ok(ConvertTicketResponse {
        new_ticket_id: child.id,
        new_ticket_number: child.ticket_number,
        target_type: target,
        original_ticket_id: source.id,
        original_ticket_number: source.ticket_number,
    })
}
