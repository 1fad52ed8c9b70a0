//! Ticket store operations behind the /tickets endpoints
//!
//! Every mutation runs in one database transaction together with the activities it
//! produces; returning early drops the transaction and rolls everything back.

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::auth::AuthUser;
use crate::entities::{prelude::Tickets, tickets};
use crate::error::TicketError;
use crate::models::activity::{ActivityMetadata, ActivityType};
use crate::models::node::Node;
use crate::models::sla::SlaStatus;
use crate::models::ticket::{
    CreateTicketRequest, CreateTicketResponse, Pagination, Priority, TicketDetail,
    TicketListQuery, TicketListResponse, TicketStatsQuery, TicketStatsResponse,
    TicketStatus, TicketSummary, TicketType, UpdateTicketRequest, UpdateTicketResponse,
    SORTABLE_COLUMNS,
};
use crate::services::activity_log::{self, ActivityEntry};
use crate::services::directory::PartyDirectory;
use crate::services::sequence::{self, PartitionKey};
use crate::services::sla;
use crate::services::state_machine::TicketStateMachine;

pub const DEFAULT_SEVERITY: i32 = 3;

fn validate_severity(severity: i32) -> Result<i32, TicketError> {
    if (1..=5).contains(&severity) {
        Ok(severity)
    } else {
        Err(TicketError::Validation(format!(
            "severity must be between 1 and 5, got {}",
            severity
        )))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub async fn find_ticket<C>(db: &C, id: i32) -> Result<tickets::Model, TicketError>
where
    C: ConnectionTrait,
{
    Tickets::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| TicketError::ticket_not_found(id))
}

/// Load a ticket and check that `caller` may touch it
pub async fn load_for<C>(db: &C, id: i32, caller: &AuthUser) -> Result<tickets::Model, TicketError>
where
    C: ConnectionTrait,
{
    let ticket = find_ticket(db, id).await?;
    caller.ensure_access(&ticket)?;
    Ok(ticket)
}

/// [`load_for`] under a row lock held until `txn` ends, so concurrent writers of the same
/// ticket queue up instead of overwriting each other
pub async fn load_for_update<C>(
    txn: &C,
    id: i32,
    caller: &AuthUser,
) -> Result<tickets::Model, TicketError>
where
    C: ConnectionTrait,
{
    let ticket = Tickets::find_by_id(id)
        .lock_exclusive()
        .one(txn)
        .await?
        .ok_or_else(|| TicketError::ticket_not_found(id))?;
    caller.ensure_access(&ticket)?;
    Ok(ticket)
}

/// Restrict a query to what `caller` may see; `None` when that is nothing at all
fn scoped(condition: Condition, caller: &AuthUser) -> Option<Condition> {
    if !caller.is_dealer() {
        return Some(condition);
    }
    caller
        .dealer_id
        .map(|dealer_id| condition.add(tickets::Column::DealerId.eq(dealer_id)))
}

pub async fn create_ticket(
    db: &DatabaseConnection,
    default_channel_code: &str,
    req: CreateTicketRequest,
    caller: &AuthUser,
    now: DateTime<FixedOffset>,
) -> Result<CreateTicketResponse, TicketError> {
    let ticket_type = non_empty(&req.ticket_type)
        .ok_or_else(|| TicketError::Validation("ticket_type is required".to_string()))?
        .parse::<TicketType>()
        .map_err(TicketError::Validation)?;
    let priority = req.priority.unwrap_or_default();
    let severity = validate_severity(req.severity.unwrap_or(DEFAULT_SEVERITY))?;
    let key = PartitionKey::for_creation(
        ticket_type,
        req.channel_code.as_deref(),
        default_channel_code,
        &now.with_timezone(&Local),
    )
    .map_err(TicketError::Validation)?;

    // Dealers always file under their own dealer
    let dealer_id = if caller.is_dealer() {
        caller.dealer_id
    } else {
        req.dealer_id
    };

    let txn = db.begin().await?;

    if let Some(parent_id) = req.parent_ticket_id {
        if Tickets::find_by_id(parent_id).one(&txn).await?.is_none() {
            return Err(TicketError::Validation(format!(
                "parent ticket {} not found",
                parent_id
            )));
        }
    }

    let ticket_number = sequence::allocate_ticket_number(&txn, &key).await?;
    let node = Node::initial(ticket_type);

    let ticket = tickets::ActiveModel {
        ticket_number: Set(ticket_number),
        ticket_type: Set(ticket_type.as_str().to_string()),
        channel_code: Set(key.channel_code.clone()),
        issue_type: Set(req.issue_type),
        issue_category: Set(req.issue_category),
        issue_subcategory: Set(req.issue_subcategory),
        severity: Set(severity),
        is_warranty: Set(req.is_warranty.unwrap_or(true)),
        current_node: Set(node.as_str().to_string()),
        status: Set(node.status().as_str().to_string()),
        status_changed_at: Set(Some(now)),
        node_entered_at: Set(now),
        priority: Set(priority.as_str().to_string()),
        sla_due_at: Set(sla::calculate_due(priority, node, now)),
        sla_status: Set(SlaStatus::Normal.as_str().to_string()),
        breach_counter: Set(0),
        account_id: Set(req.account_id),
        contact_id: Set(req.contact_id),
        dealer_id: Set(dealer_id),
        reporter_name: Set(req.reporter_name),
        reporter_type: Set(req.reporter_type),
        region: Set(req.region),
        assigned_to: Set(req.assigned_to),
        submitted_by: Set(Some(caller.id)),
        created_by: Set(Some(caller.id)),
        product_id: Set(req.product_id),
        serial_number: Set(req.serial_number),
        firmware_version: Set(req.firmware_version),
        hardware_version: Set(req.hardware_version),
        service_type: Set(req.service_type),
        channel: Set(req.channel),
        problem_summary: Set(req.problem_summary),
        communication_log: Set(req.communication_log),
        problem_description: Set(req.problem_description),
        solution_for_customer: Set(req.solution_for_customer),
        feedback_date: Set(req.feedback_date),
        parent_ticket_id: Set(req.parent_ticket_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    activity_log::append(
        &txn,
        ActivityEntry::new(ticket.id, ActivityType::StatusChange)
            .metadata(ActivityMetadata::StatusChange {
                from_node: None,
                to_node: ticket.current_node.clone(),
                from_ticket_id: None,
                from_ticket_number: None,
            })
            .actor(caller),
        now,
    )
    .await?;

    txn.commit().await?;

    info!(
        ticket_id = ticket.id,
        ticket_number = %ticket.ticket_number,
        ticket_type = %ticket.ticket_type,
        priority = %ticket.priority,
        actor_id = caller.id,
        "Ticket created"
    );

    Ok(CreateTicketResponse {
        id: ticket.id,
        ticket_number: ticket.ticket_number,
        ticket_type,
        current_node: ticket.current_node,
        priority,
        sla_due_at: ticket.sla_due_at,
    })
}

/// Ticket detail with live SLA figures, lineage and display names
pub async fn get_ticket(
    db: &DatabaseConnection,
    directory: &dyn PartyDirectory,
    id: i32,
    caller: &AuthUser,
    now: DateTime<FixedOffset>,
) -> Result<TicketDetail, TicketError> {
    let ticket = load_for(db, id, caller).await?;
    let (ticket, check) = sla::observe(db, ticket, now).await?;

    let parent_ticket_number = match ticket.parent_ticket_id {
        Some(parent_id) => Tickets::find_by_id(parent_id)
            .one(db)
            .await?
            .map(|parent| parent.ticket_number),
        None => None,
    };

    let names = directory.display_names(&ticket).await;

    let mut detail = TicketDetail::new(&ticket, names);
    detail.sla_remaining_hours = check.remaining_hours;
    detail.sla_remaining_percent = check.remaining_percent;
    detail.parent_ticket_number = parent_ticket_number;
    Ok(detail)
}

enum TimeBound {
    Instant(DateTime<FixedOffset>),
    Day(NaiveDate),
}

fn parse_time_bound(field: &str, raw: &str) -> Result<TimeBound, TicketError> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(raw) {
        return Ok(TimeBound::Instant(instant));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(TimeBound::Day)
        .map_err(|_| {
            TicketError::Validation(format!(
                "{} must be an RFC 3339 timestamp or YYYY-MM-DD, got {}",
                field, raw
            ))
        })
}

/// Midnight of `date` in the service's local calendar, expressed in UTC so it compares
/// like the stored timestamps.
fn start_of_local_day(date: NaiveDate) -> DateTime<FixedOffset> {
    let naive = date.and_time(NaiveTime::MIN);
    let instant = Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive));
    instant.fixed_offset()
}

fn with_created_range(
    mut condition: Condition,
    created_from: &Option<String>,
    created_to: &Option<String>,
) -> Result<Condition, TicketError> {
    if let Some(raw) = non_empty(created_from) {
        let from = match parse_time_bound("created_from", raw)? {
            TimeBound::Instant(t) => t.with_timezone(&Utc).fixed_offset(),
            TimeBound::Day(d) => start_of_local_day(d),
        };
        condition = condition.add(tickets::Column::CreatedAt.gte(from));
    }

    if let Some(raw) = non_empty(created_to) {
        condition = match parse_time_bound("created_to", raw)? {
            TimeBound::Instant(t) => {
                condition.add(tickets::Column::CreatedAt.lte(t.with_timezone(&Utc).fixed_offset()))
            }
            // A bare date includes the whole day
            TimeBound::Day(d) => {
                let next = d.succ_opt().unwrap_or(NaiveDate::MAX);
                condition.add(tickets::Column::CreatedAt.lt(start_of_local_day(next)))
            }
        };
    }

    Ok(condition)
}

fn list_condition(query: &TicketListQuery) -> Result<Condition, TicketError> {
    let mut condition = Condition::all();

    if let Some(raw) = non_empty(&query.ticket_type) {
        let ticket_type = raw.parse::<TicketType>().map_err(TicketError::Validation)?;
        condition = condition.add(tickets::Column::TicketType.eq(ticket_type.as_str()));
    }
    if let Some(raw) = non_empty(&query.status) {
        let status = raw.parse::<TicketStatus>().map_err(TicketError::Validation)?;
        condition = condition.add(tickets::Column::Status.eq(status.as_str()));
    }
    if let Some(node) = non_empty(&query.current_node) {
        condition = condition.add(tickets::Column::CurrentNode.eq(node));
    }
    if let Some(raw) = non_empty(&query.priority) {
        let priority = raw.parse::<Priority>().map_err(TicketError::Validation)?;
        condition = condition.add(tickets::Column::Priority.eq(priority.as_str()));
    }
    if let Some(raw) = non_empty(&query.sla_status) {
        let sla_status = raw.parse::<SlaStatus>().map_err(TicketError::Validation)?;
        condition = condition.add(tickets::Column::SlaStatus.eq(sla_status.as_str()));
    }

    if let Some(account_id) = query.account_id {
        condition = condition.add(tickets::Column::AccountId.eq(account_id));
    }
    if let Some(dealer_id) = query.dealer_id {
        condition = condition.add(tickets::Column::DealerId.eq(dealer_id));
    }
    if let Some(assigned_to) = query.assigned_to {
        condition = condition.add(tickets::Column::AssignedTo.eq(assigned_to));
    }
    if let Some(submitted_by) = query.submitted_by {
        condition = condition.add(tickets::Column::SubmittedBy.eq(submitted_by));
    }
    if let Some(serial) = non_empty(&query.serial_number) {
        condition = condition.add(tickets::Column::SerialNumber.contains(serial));
    }

    if let Some(keyword) = non_empty(&query.keyword) {
        condition = condition.add(
            Condition::any()
                .add(tickets::Column::TicketNumber.contains(keyword))
                .add(tickets::Column::ProblemSummary.contains(keyword))
                .add(tickets::Column::ProblemDescription.contains(keyword))
                .add(tickets::Column::SerialNumber.contains(keyword)),
        );
    }

    with_created_range(condition, &query.created_from, &query.created_to)
}

fn sort_spec(query: &TicketListQuery) -> Result<(tickets::Column, Order), TicketError> {
    let column = match non_empty(&query.sort_by).unwrap_or("created_at") {
        "created_at" => tickets::Column::CreatedAt,
        "updated_at" => tickets::Column::UpdatedAt,
        "priority" => tickets::Column::Priority,
        "sla_due_at" => tickets::Column::SlaDueAt,
        "ticket_number" => tickets::Column::TicketNumber,
        other => {
            return Err(TicketError::Validation(format!(
                "sort_by must be one of {}, got {}",
                SORTABLE_COLUMNS.join(", "),
                other
            )));
        }
    };

    let order = match non_empty(&query.sort_order).map(str::to_lowercase).as_deref() {
        None | Some("desc") => Order::Desc,
        Some("asc") => Order::Asc,
        Some(other) => {
            return Err(TicketError::Validation(format!(
                "sort_order must be asc or desc, got {}",
                other
            )));
        }
    };

    Ok((column, order))
}

/// Filtered, sorted page of tickets. SLA status is refreshed for every returned row.
pub async fn list_tickets(
    db: &DatabaseConnection,
    query: &TicketListQuery,
    caller: &AuthUser,
    now: DateTime<FixedOffset>,
) -> Result<TicketListResponse, TicketError> {
    query.validate().map_err(TicketError::Validation)?;
    let (sort_column, order) = sort_spec(query)?;
    let page = query.page();
    let page_size = query.page_size();

    let Some(condition) = scoped(list_condition(query)?, caller) else {
        return Ok(TicketListResponse {
            tickets: Vec::new(),
            pagination: Pagination::new(page, page_size, 0),
        });
    };

    let select = Tickets::find().filter(condition);
    let total = select.clone().count(db).await?;

    let rows = select
        .order_by(sort_column, order.clone())
        .order_by(tickets::Column::Id, order)
        .offset((page - 1) * page_size)
        .limit(page_size)
        .all(db)
        .await?;

    let mut tickets = Vec::with_capacity(rows.len());
    for row in rows {
        let (row, _) = sla::observe(db, row, now).await?;
        tickets.push(TicketSummary::from(&row));
    }

    debug!(total, page, page_size, returned = tickets.len(), "Tickets listed");

    Ok(TicketListResponse {
        tickets,
        pagination: Pagination::new(page, page_size, total),
    })
}

/// Apply a whitelisted partial update.
///
/// Node changes go through the state machine; priority changes re-run the current SLA
/// window; node, priority and assignment changes each leave an activity.
pub async fn update_ticket(
    db: &DatabaseConnection,
    state_machine: &TicketStateMachine,
    id: i32,
    req: UpdateTicketRequest,
    caller: &AuthUser,
    now: DateTime<FixedOffset>,
) -> Result<UpdateTicketResponse, TicketError> {
    if let Some(severity) = req.severity {
        validate_severity(severity)?;
    }
    if caller.is_dealer() {
        if let Some(dealer_id) = req.dealer_id {
            if dealer_id != caller.dealer_id {
                return Err(TicketError::Forbidden(
                    "Dealers cannot move tickets to another dealer".to_string(),
                ));
            }
        }
    }

    let txn = db.begin().await?;
    let ticket = load_for_update(&txn, id, caller).await?;

    let mut active: tickets::ActiveModel = ticket.clone().into();
    let mut changed: Vec<&'static str> = Vec::new();

    macro_rules! patch {
        ($($field:ident),+ $(,)?) => {
            $(
                if let Some(value) = req.$field {
                    if ticket.$field != value {
                        active.$field = Set(value);
                        changed.push(stringify!($field));
                    }
                }
            )+
        };
    }

    patch!(
        account_id,
        contact_id,
        dealer_id,
        reporter_name,
        reporter_type,
        region,
        product_id,
        serial_number,
        firmware_version,
        hardware_version,
        issue_type,
        issue_category,
        issue_subcategory,
        severity,
        service_type,
        channel,
        problem_summary,
        communication_log,
        problem_description,
        solution_for_customer,
        is_warranty,
        repair_content,
        problem_analysis,
        resolution,
        payment_channel,
        payment_amount,
        payment_date,
        feedback_date,
        ship_date,
        received_date,
        completed_date,
        snooze_until,
        external_link,
    );

    let assignment = match req.assigned_to {
        Some(assigned_to) if assigned_to != ticket.assigned_to => {
            active.assigned_to = Set(assigned_to);
            Some((ticket.assigned_to, assigned_to))
        }
        _ => None,
    };

    let current_priority = ticket.priority.parse::<Priority>().unwrap_or_default();
    let new_priority = req.priority.filter(|p| *p != current_priority);
    if let Some(priority) = new_priority {
        active.priority = Set(priority.as_str().to_string());
    }
    let effective_priority = new_priority.unwrap_or(current_priority);

    let transition = match req.current_node.as_deref() {
        Some(node) => {
            state_machine
                .transition(&txn, &ticket, &mut active, node, effective_priority, caller, now)
                .await?
        }
        None => None,
    };

    if let Some(priority) = new_priority {
        // A node change already opened a window under the new priority
        if transition.is_none() {
            sla::reprice(&ticket, &mut active, priority, now);
        }
        activity_log::append(
            &txn,
            ActivityEntry::new(ticket.id, ActivityType::PriorityChange)
                .content(format!(
                    "Priority changed from {} to {}",
                    current_priority, priority
                ))
                .metadata(ActivityMetadata::PriorityChange {
                    from_priority: current_priority,
                    to_priority: priority,
                })
                .actor(caller),
            now,
        )
        .await?;
    }

    if let Some((from_user_id, to_user_id)) = assignment {
        activity_log::append(
            &txn,
            ActivityEntry::new(ticket.id, ActivityType::AssignmentChange)
                .metadata(ActivityMetadata::AssignmentChange {
                    from_user_id,
                    to_user_id,
                })
                .actor(caller),
            now,
        )
        .await?;
    }

    if changed.is_empty() && transition.is_none() && new_priority.is_none() && assignment.is_none()
    {
        debug!(ticket_id = id, "PATCH carried no changes");
        return Ok(UpdateTicketResponse {
            updated: false,
            message: "no update".to_string(),
        });
    }

    active.updated_at = Set(now);
    active.update(&txn).await?;
    txn.commit().await?;

    info!(
        ticket_id = id,
        ticket_number = %ticket.ticket_number,
        fields = ?changed,
        node = ?transition.as_ref().map(|t| t.to.as_str()),
        priority = ?new_priority.map(|p| p.as_str()),
        assigned = assignment.is_some(),
        actor_id = caller.id,
        "Ticket updated"
    );

    Ok(UpdateTicketResponse {
        updated: true,
        message: "Ticket updated".to_string(),
    })
}

async fn count_by(
    db: &DatabaseConnection,
    column: tickets::Column,
    condition: Condition,
) -> Result<BTreeMap<String, i64>, DbErr> {
    let rows: Vec<(String, i64)> = Tickets::find()
        .select_only()
        .column(column)
        .column_as(Expr::col(tickets::Column::Id).count(), "count")
        .filter(condition)
        .group_by(column)
        .into_tuple()
        .all(db)
        .await?;

    Ok(rows.into_iter().collect())
}

/// Grouped counts over the tickets `caller` can see
pub async fn ticket_stats(
    db: &DatabaseConnection,
    query: &TicketStatsQuery,
    caller: &AuthUser,
) -> Result<TicketStatsResponse, TicketError> {
    let mut condition = Condition::all();
    if let Some(raw) = non_empty(&query.ticket_type) {
        let ticket_type = raw.parse::<TicketType>().map_err(TicketError::Validation)?;
        condition = condition.add(tickets::Column::TicketType.eq(ticket_type.as_str()));
    }
    let condition = with_created_range(condition, &query.created_from, &query.created_to)?;

    let Some(condition) = scoped(condition, caller) else {
        return Ok(TicketStatsResponse::default());
    };

    let by_type = count_by(db, tickets::Column::TicketType, condition.clone()).await?;
    let stats = TicketStatsResponse {
        total: by_type.values().sum(),
        by_status: count_by(db, tickets::Column::Status, condition.clone()).await?,
        by_priority: count_by(db, tickets::Column::Priority, condition.clone()).await?,
        by_sla_status: count_by(db, tickets::Column::SlaStatus, condition).await?,
        by_type,
    };

    debug!(total = stats.total, "Ticket stats computed");
    Ok(stats)
}
