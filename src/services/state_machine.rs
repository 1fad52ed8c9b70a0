//! Node transitions
//!
//! Moving a ticket to another node rewrites its status projection, restarts the SLA window
//! and leaves a `status_change` activity. Which moves are legal is decided by a pluggable
//! [`TransitionPolicy`]; the default allows any move inside the ticket type's vocabulary.
//! Whatever the policy, `converted` is entered and left only by the conversion workflow.

use chrono::{DateTime, FixedOffset};
use sea_orm::{ConnectionTrait, Set};
use std::collections::HashSet;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::info;

use crate::auth::AuthUser;
use crate::config::TransitionPolicyKind;
use crate::entities::tickets;
use crate::error::TicketError;
use crate::models::activity::{ActivityMetadata, ActivityType};
use crate::models::node::{InquiryNode, Node, RmaNode, SvcNode};
use crate::models::ticket::{Priority, TicketType};
use crate::services::{activity_log, sla};

pub trait TransitionPolicy: Send + Sync + Debug {
    /// Whether `from -> to` may be requested through the API. Both nodes belong to the
    /// same ticket type and differ.
    fn permits(&self, from: Node, to: Node) -> bool;
}

/// Any node of the vocabulary is reachable from any other
#[derive(Debug, Clone, Copy, Default)]
pub struct PermissiveTransitions;

impl TransitionPolicy for PermissiveTransitions {
    fn permits(&self, from: Node, to: Node) -> bool {
        from.ticket_type() == to.ticket_type()
    }
}

/// Explicit adjacency table
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    edges: HashSet<(Node, Node)>,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, from: Node, to: Node) -> Self {
        self.edges.insert((from, to));
        self
    }

    /// Allow each step of `path` in order
    pub fn chain(mut self, path: &[Node]) -> Self {
        for pair in path.windows(2) {
            self.edges.insert((pair[0], pair[1]));
        }
        self
    }

    /// Forward workflow of each ticket type, plus close/cancel from any open node.
    ///
    /// `converted` is not reachable here; only the conversion workflow moves a ticket there.
    pub fn standard() -> Self {
        use InquiryNode as I;
        use RmaNode as R;
        use SvcNode as S;

        let inquiry = |n: I| Node::Inquiry(n);

        let mut table = Self::new()
            .chain(&[I::Draft, I::InProgress, I::Resolved, I::Closed].map(Node::Inquiry))
            .allow(inquiry(I::InProgress), inquiry(I::WaitingCustomer))
            .allow(inquiry(I::WaitingCustomer), inquiry(I::InProgress))
            .allow(inquiry(I::WaitingCustomer), inquiry(I::Resolved))
            .allow(inquiry(I::WaitingCustomer), inquiry(I::AutoClosed))
            .allow(inquiry(I::Resolved), inquiry(I::InProgress))
            .chain(
                &[
                    R::Submitted,
                    R::MsReview,
                    R::OpReceiving,
                    R::OpDiagnosing,
                    R::OpRepairing,
                    R::OpQa,
                    R::MsClosing,
                    R::Resolved,
                    R::Closed,
                ]
                .map(Node::Rma),
            )
            .allow(Node::Rma(R::OpQa), Node::Rma(R::OpRepairing))
            .chain(
                &[
                    S::Submitted,
                    S::GeReview,
                    S::DlReceiving,
                    S::DlRepairing,
                    S::DlQa,
                    S::GeClosing,
                    S::Resolved,
                    S::Closed,
                ]
                .map(Node::Svc),
            )
            .allow(Node::Svc(S::DlQa), Node::Svc(S::DlRepairing));

        let exits = [
            (TicketType::Inquiry, inquiry(I::Closed), inquiry(I::Cancelled)),
            (TicketType::Rma, Node::Rma(R::Closed), Node::Rma(R::Cancelled)),
            (TicketType::Svc, Node::Svc(S::Closed), Node::Svc(S::Cancelled)),
        ];
        for (ticket_type, closed, cancelled) in exits {
            for node in Node::vocabulary(ticket_type) {
                if !node.is_terminal() {
                    table.edges.insert((node, closed));
                    table.edges.insert((node, cancelled));
                }
            }
        }

        table
    }
}

impl TransitionPolicy for TransitionTable {
    fn permits(&self, from: Node, to: Node) -> bool {
        self.edges.contains(&(from, to))
    }
}

/// A requested node change that passed validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Stored node name before the move
    pub from: String,
    pub to: Node,
}

#[derive(Debug, Clone)]
pub struct TicketStateMachine {
    policy: Arc<dyn TransitionPolicy>,
}

impl Default for TicketStateMachine {
    fn default() -> Self {
        Self::new(Arc::new(PermissiveTransitions))
    }
}

impl TicketStateMachine {
    pub fn new(policy: Arc<dyn TransitionPolicy>) -> Self {
        Self { policy }
    }

    pub fn from_kind(kind: TransitionPolicyKind) -> Self {
        match kind {
            TransitionPolicyKind::Permissive => Self::default(),
            TransitionPolicyKind::Strict => Self::new(Arc::new(TransitionTable::standard())),
        }
    }

    /// Validate a requested move. `Ok(None)` means the ticket is already there.
    pub fn resolve(
        &self,
        ticket: &tickets::Model,
        requested: &str,
    ) -> Result<Option<Transition>, TicketError> {
        let ticket_type = ticket_type_of(ticket)?;
        let to = Node::parse(ticket_type, requested).map_err(TicketError::Validation)?;

        if ticket.current_node == to.as_str() {
            return Ok(None);
        }

        // Only the conversion workflow moves a ticket into or out of `converted`
        if touches_conversion(&ticket.current_node, to) {
            return Err(TicketError::InvalidTransition(format!(
                "{} cannot move from {} to {} outside conversion",
                ticket.ticket_number, ticket.current_node, to
            )));
        }

        // A stored node outside the vocabulary can always be repaired
        if let Ok(from) = Node::parse(ticket_type, &ticket.current_node) {
            if !self.policy.permits(from, to) {
                return Err(TicketError::InvalidTransition(format!(
                    "{} cannot move from {} to {}",
                    ticket.ticket_number, from, to
                )));
            }
        }

        Ok(Some(Transition {
            from: ticket.current_node.clone(),
            to,
        }))
    }

    /// Write the node change onto `active` without consulting the policy: status
    /// projection, entry timestamps and a new SLA window under `priority`.
    pub fn apply(
        &self,
        ticket: &tickets::Model,
        active: &mut tickets::ActiveModel,
        to: Node,
        priority: Priority,
        now: DateTime<FixedOffset>,
    ) {
        sla::close_window(ticket, active, now);

        active.current_node = Set(to.as_str().to_string());
        active.status = Set(to.status().as_str().to_string());
        active.node_entered_at = Set(now);
        active.status_changed_at = Set(Some(now));

        sla::open_window(active, priority, Some(to), now);
    }

    /// Resolve, apply and log a node change in one step. The caller persists `active`
    /// on the same connection or transaction.
    #[allow(clippy::too_many_arguments)]
    pub async fn transition<C>(
        &self,
        db: &C,
        ticket: &tickets::Model,
        active: &mut tickets::ActiveModel,
        requested: &str,
        priority: Priority,
        actor: &AuthUser,
        now: DateTime<FixedOffset>,
    ) -> Result<Option<Transition>, TicketError>
    where
        C: ConnectionTrait,
    {
        let Some(transition) = self.resolve(ticket, requested)? else {
            return Ok(None);
        };

        self.apply(ticket, active, transition.to, priority, now);

        activity_log::append(
            db,
            activity_log::ActivityEntry::new(ticket.id, ActivityType::StatusChange)
                .metadata(ActivityMetadata::StatusChange {
                    from_node: Some(transition.from.clone()),
                    to_node: transition.to.as_str().to_string(),
                    from_ticket_id: None,
                    from_ticket_number: None,
                })
                .actor(actor),
            now,
        )
        .await?;

        info!(
            ticket_id = ticket.id,
            ticket_number = %ticket.ticket_number,
            from = %transition.from,
            to = %transition.to,
            actor_id = actor.id,
            "Node transitioned"
        );

        Ok(Some(transition))
    }
}

fn touches_conversion(from: &str, to: Node) -> bool {
    to.is_converted() || from == InquiryNode::Converted.as_str()
}

/// Parse the stored ticket type
pub fn ticket_type_of(ticket: &tickets::Model) -> Result<TicketType, TicketError> {
    ticket
        .ticket_type
        .parse::<TicketType>()
        .map_err(TicketError::Validation)
}
