//! SLA deadline engine
//!
//! A ticket's SLA window opens when it enters a node that carries a commitment phase and is
//! measured from `node_entered_at`. Breach detection is lazy: reads call [`observe`], which
//! persists status changes. A breach is counted once per node residency and `breached`
//! sticks until the ticket moves to another node.

use chrono::{DateTime, Duration, FixedOffset};
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::entities::{prelude::Tickets, tickets};
use crate::models::node::Node;
use crate::models::sla::{SlaCheck, SlaMatrixResponse, SlaPhase, SlaStatus};
use crate::models::ticket::{Priority, TicketType};

/// Remaining fraction of the window at or below which a ticket is at risk
pub const AT_RISK_THRESHOLD: f64 = 0.25;

/// Commitment length in hours for a priority and phase
pub fn sla_hours(priority: Priority, phase: SlaPhase) -> i64 {
    match (priority, phase) {
        (Priority::P0, SlaPhase::FirstResponse) => 2,
        (Priority::P0, SlaPhase::Solution) => 4,
        (Priority::P0, SlaPhase::Quote) => 24,
        (Priority::P0, SlaPhase::Close) => 36,

        (Priority::P1, SlaPhase::FirstResponse) => 8,
        (Priority::P1, SlaPhase::Solution) => 24,
        (Priority::P1, SlaPhase::Quote) => 48,
        (Priority::P1, SlaPhase::Close) => 72,

        // P3 has no table of its own and shares P2's commitments
        (Priority::P2 | Priority::P3, SlaPhase::FirstResponse) => 24,
        (Priority::P2 | Priority::P3, SlaPhase::Solution) => 48,
        (Priority::P2 | Priority::P3, SlaPhase::Quote) => 120,
        (Priority::P2 | Priority::P3, SlaPhase::Close) => 168,
    }
}

/// Due instant for a ticket that entered `node` at `entered_at`, or `None` when the node
/// carries no commitment.
pub fn calculate_due(
    priority: Priority,
    node: Node,
    entered_at: DateTime<FixedOffset>,
) -> Option<DateTime<FixedOffset>> {
    node.sla_phase()
        .map(|phase| entered_at + Duration::hours(sla_hours(priority, phase)))
}

/// Position of `now` within the window `[started, due]`
pub fn evaluate(
    started: DateTime<FixedOffset>,
    due: DateTime<FixedOffset>,
    now: DateTime<FixedOffset>,
) -> SlaCheck {
    let window_secs = (due - started).num_seconds() as f64;
    let remaining_secs = (due - now).num_seconds() as f64;

    let remaining_percent = if window_secs > 0.0 {
        (remaining_secs / window_secs).clamp(0.0, 1.0)
    } else {
        0.0
    };

    let sla_status = if remaining_secs <= 0.0 {
        SlaStatus::Breached
    } else if remaining_percent <= AT_RISK_THRESHOLD {
        SlaStatus::AtRisk
    } else {
        SlaStatus::Normal
    };

    SlaCheck {
        sla_status,
        remaining_hours: Some(round2(remaining_secs.max(0.0) / 3600.0)),
        remaining_percent: Some(round2(remaining_percent)),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Check a stored ticket against its current window
pub fn check_status(ticket: &tickets::Model, now: DateTime<FixedOffset>) -> SlaCheck {
    match ticket.sla_due_at {
        Some(due) => evaluate(ticket.node_entered_at, due, now),
        None => SlaCheck::no_sla(),
    }
}

/// Check the ticket and persist an observed status change.
///
/// The update is conditioned on the previously stored status, so when several readers
/// observe the same breach only one of them increments `breach_counter`.
pub async fn observe<C>(
    db: &C,
    mut ticket: tickets::Model,
    now: DateTime<FixedOffset>,
) -> Result<(tickets::Model, SlaCheck), DbErr>
where
    C: ConnectionTrait,
{
    let check = check_status(&ticket, now);
    if !check.has_sla()
        || ticket.sla_status == check.sla_status.as_str()
        || ticket.sla_status == SlaStatus::Breached.as_str()
    {
        return Ok((ticket, check));
    }

    let breached = check.sla_status == SlaStatus::Breached;
    let mut update = Tickets::update_many()
        .col_expr(
            tickets::Column::SlaStatus,
            Expr::value(check.sla_status.as_str()),
        )
        .filter(tickets::Column::Id.eq(ticket.id))
        .filter(tickets::Column::SlaStatus.eq(ticket.sla_status.clone()));
    if breached {
        update = update.col_expr(
            tickets::Column::BreachCounter,
            Expr::col(tickets::Column::BreachCounter).add(1),
        );
    }

    let result = update.exec(db).await?;
    if result.rows_affected == 1 {
        if breached {
            ticket.breach_counter += 1;
            warn!(
                ticket_id = ticket.id,
                ticket_number = %ticket.ticket_number,
                breach_counter = ticket.breach_counter,
                "SLA breach recorded"
            );
        } else {
            debug!(
                ticket_id = ticket.id,
                from = %ticket.sla_status,
                to = %check.sla_status,
                "SLA status changed"
            );
        }
        ticket.sla_status = check.sla_status.as_str().to_string();
    }

    Ok((ticket, check))
}

/// Account for the window that is about to be replaced: a breach nobody observed on read
/// is still counted once.
pub fn close_window(
    ticket: &tickets::Model,
    active: &mut tickets::ActiveModel,
    now: DateTime<FixedOffset>,
) {
    record_unobserved_breach(ticket, active, now);
}

/// Count an overdue window whose breach has not been stored yet
fn record_unobserved_breach(
    ticket: &tickets::Model,
    active: &mut tickets::ActiveModel,
    now: DateTime<FixedOffset>,
) -> bool {
    let overdue = ticket.sla_due_at.is_some_and(|due| now > due);
    if !overdue || ticket.sla_status == SlaStatus::Breached.as_str() {
        return false;
    }

    active.breach_counter = Set(ticket.breach_counter + 1);
    warn!(
        ticket_id = ticket.id,
        ticket_number = %ticket.ticket_number,
        "Unobserved SLA breach recorded"
    );
    true
}

/// Start a fresh window for `node` measured from `entered_at`
pub fn open_window(
    active: &mut tickets::ActiveModel,
    priority: Priority,
    node: Option<Node>,
    entered_at: DateTime<FixedOffset>,
) {
    let due = node.and_then(|n| calculate_due(priority, n, entered_at));
    active.sla_due_at = Set(due);
    active.sla_status = Set(SlaStatus::Normal.as_str().to_string());
}

/// Re-run the current window under a new priority.
///
/// The window keeps its original start (`node_entered_at`), so an escalation tightens the
/// existing deadline instead of restarting it. The residency is unchanged: a breach of the
/// old deadline is recorded if nobody observed it, and a recorded breach stays recorded.
pub fn reprice(
    ticket: &tickets::Model,
    active: &mut tickets::ActiveModel,
    priority: Priority,
    now: DateTime<FixedOffset>,
) {
    let node = ticket
        .ticket_type
        .parse::<TicketType>()
        .ok()
        .and_then(|t| Node::parse(t, &ticket.current_node).ok());

    if record_unobserved_breach(ticket, active, now) {
        active.sla_status = Set(SlaStatus::Breached.as_str().to_string());
    }
    active.sla_due_at = Set(node.and_then(|n| calculate_due(priority, n, ticket.node_entered_at)));
}

/// The full priority x phase table
pub fn matrix() -> SlaMatrixResponse {
    let matrix = Priority::ALL
        .iter()
        .map(|priority| {
            let phases: BTreeMap<String, i64> = SlaPhase::ALL
                .iter()
                .map(|phase| (phase.as_str().to_string(), sla_hours(*priority, *phase)))
                .collect();
            (priority.as_str().to_string(), phases)
        })
        .collect();

    SlaMatrixResponse {
        matrix,
        at_risk_threshold: AT_RISK_THRESHOLD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::node::{InquiryNode, RmaNode};
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 2, 10, h, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_due_follows_phase_of_node() {
        let draft = Node::Inquiry(InquiryNode::Draft);
        assert_eq!(calculate_due(Priority::P2, draft, at(0)), Some(at(0) + Duration::hours(24)));
        assert_eq!(calculate_due(Priority::P0, draft, at(0)), Some(at(2)));

        let repairing = Node::Rma(RmaNode::OpRepairing);
        assert_eq!(
            calculate_due(Priority::P1, repairing, at(0)),
            Some(at(0) + Duration::hours(72))
        );
    }

    #[test]
    fn test_terminal_nodes_have_no_due() {
        for node in [
            Node::Inquiry(InquiryNode::Converted),
            Node::Inquiry(InquiryNode::WaitingCustomer),
            Node::Rma(RmaNode::Closed),
        ] {
            assert_eq!(calculate_due(Priority::P0, node, at(0)), None);
        }
    }

    #[test]
    fn test_p3_shares_p2_durations() {
        for phase in SlaPhase::ALL {
            assert_eq!(sla_hours(Priority::P3, phase), sla_hours(Priority::P2, phase));
        }
    }

    #[test]
    fn test_evaluate_thresholds() {
        // 4h window starting at 00:00
        let normal = evaluate(at(0), at(4), at(1));
        assert_eq!(normal.sla_status, SlaStatus::Normal);
        assert_eq!(normal.remaining_hours, Some(3.0));
        assert_eq!(normal.remaining_percent, Some(0.75));

        let at_risk = evaluate(at(0), at(4), at(3));
        assert_eq!(at_risk.sla_status, SlaStatus::AtRisk);
        assert_eq!(at_risk.remaining_percent, Some(0.25));

        let breached = evaluate(at(0), at(4), at(6));
        assert_eq!(breached.sla_status, SlaStatus::Breached);
        assert_eq!(breached.remaining_hours, Some(0.0));
        assert_eq!(breached.remaining_percent, Some(0.0));
    }

    #[test]
    fn test_matrix_covers_every_priority_and_phase() {
        let response = matrix();
        assert_eq!(response.matrix.len(), 4);
        assert_eq!(response.matrix["P0"]["first_response"], 2);
        assert_eq!(response.matrix["P2"]["close"], 168);
        assert_eq!(response.at_risk_threshold, 0.25);
    }
}
