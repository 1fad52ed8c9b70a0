//! Lifecycle node vocabularies
//!
//! Each ticket type owns a closed set of nodes. `Node` is the tagged union over the three
//! vocabularies, so a node can never be paired with the wrong ticket type once parsed.
//! The database keeps the plain string; parsing happens at the store boundary.

use crate::models::sla::SlaPhase;
use crate::models::ticket::{TicketStatus, TicketType};

macro_rules! node_vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident, $label:literal {
            $( $variant:ident => $text:literal, $status:ident, $phase:expr; )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $( $variant, )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[ $( $name::$variant, )+ ];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $text, )+
                }
            }

            pub fn status(&self) -> TicketStatus {
                match self {
                    $( $name::$variant => TicketStatus::$status, )+
                }
            }

            pub fn sla_phase(&self) -> Option<SlaPhase> {
                match self {
                    $( $name::$variant => $phase, )+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $text => Ok($name::$variant), )+
                    _ => Err(format!("Unknown {} node: {}", $label, s)),
                }
            }
        }
    };
}

node_vocabulary! {
    /// Inquiry (consultation) workflow
    InquiryNode, "inquiry" {
        Draft => "draft", Open, Some(SlaPhase::FirstResponse);
        InProgress => "in_progress", InProgress, Some(SlaPhase::Solution);
        WaitingCustomer => "waiting_customer", Waiting, None;
        Resolved => "resolved", Resolved, None;
        AutoClosed => "auto_closed", Closed, None;
        Converted => "converted", Closed, None;
        Closed => "closed", Closed, None;
        Cancelled => "cancelled", Cancelled, None;
    }
}

node_vocabulary! {
    /// Return-merchandise workflow: marketing (MS) review, then operations (OP) repair
    RmaNode, "rma" {
        Submitted => "submitted", Open, Some(SlaPhase::FirstResponse);
        MsReview => "ms_review", InProgress, Some(SlaPhase::Solution);
        OpReceiving => "op_receiving", InProgress, Some(SlaPhase::Solution);
        OpDiagnosing => "op_diagnosing", InProgress, Some(SlaPhase::Solution);
        OpRepairing => "op_repairing", InProgress, Some(SlaPhase::Close);
        OpQa => "op_qa", InProgress, Some(SlaPhase::Close);
        MsClosing => "ms_closing", InProgress, Some(SlaPhase::Close);
        Resolved => "resolved", Resolved, None;
        Closed => "closed", Closed, None;
        Cancelled => "cancelled", Cancelled, None;
    }
}

node_vocabulary! {
    /// Dealer service workflow: general (GE) review, then dealer (DL) repair
    SvcNode, "svc" {
        Submitted => "submitted", Open, Some(SlaPhase::FirstResponse);
        GeReview => "ge_review", InProgress, Some(SlaPhase::FirstResponse);
        DlReceiving => "dl_receiving", InProgress, Some(SlaPhase::Solution);
        DlRepairing => "dl_repairing", InProgress, Some(SlaPhase::Close);
        DlQa => "dl_qa", InProgress, Some(SlaPhase::Close);
        GeClosing => "ge_closing", InProgress, Some(SlaPhase::Close);
        Resolved => "resolved", Resolved, None;
        Closed => "closed", Closed, None;
        Cancelled => "cancelled", Cancelled, None;
    }
}

/// A lifecycle node tagged with the ticket type whose vocabulary it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Inquiry(InquiryNode),
    Rma(RmaNode),
    Svc(SvcNode),
}

impl Node {
    /// The node a freshly created ticket of this type starts in
    pub fn initial(ticket_type: TicketType) -> Node {
        match ticket_type {
            TicketType::Inquiry => Node::Inquiry(InquiryNode::Draft),
            TicketType::Rma => Node::Rma(RmaNode::Submitted),
            TicketType::Svc => Node::Svc(SvcNode::Submitted),
        }
    }

    /// Parse a node name within the vocabulary of `ticket_type`
    pub fn parse(ticket_type: TicketType, s: &str) -> Result<Node, String> {
        match ticket_type {
            TicketType::Inquiry => s.parse().map(Node::Inquiry),
            TicketType::Rma => s.parse().map(Node::Rma),
            TicketType::Svc => s.parse().map(Node::Svc),
        }
    }

    /// Every node of the vocabulary, in workflow order
    pub fn vocabulary(ticket_type: TicketType) -> Vec<Node> {
        match ticket_type {
            TicketType::Inquiry => InquiryNode::ALL.iter().copied().map(Node::Inquiry).collect(),
            TicketType::Rma => RmaNode::ALL.iter().copied().map(Node::Rma).collect(),
            TicketType::Svc => SvcNode::ALL.iter().copied().map(Node::Svc).collect(),
        }
    }

    pub fn ticket_type(&self) -> TicketType {
        match self {
            Node::Inquiry(_) => TicketType::Inquiry,
            Node::Rma(_) => TicketType::Rma,
            Node::Svc(_) => TicketType::Svc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Node::Inquiry(n) => n.as_str(),
            Node::Rma(n) => n.as_str(),
            Node::Svc(n) => n.as_str(),
        }
    }

    pub fn status(&self) -> TicketStatus {
        match self {
            Node::Inquiry(n) => n.status(),
            Node::Rma(n) => n.status(),
            Node::Svc(n) => n.status(),
        }
    }

    pub fn sla_phase(&self) -> Option<SlaPhase> {
        match self {
            Node::Inquiry(n) => n.sla_phase(),
            Node::Rma(n) => n.sla_phase(),
            Node::Svc(n) => n.sla_phase(),
        }
    }

    /// Closed or cancelled; nothing is expected to happen after these
    pub fn is_terminal(&self) -> bool {
        matches!(self.status(), TicketStatus::Closed | TicketStatus::Cancelled)
    }

    pub fn is_converted(&self) -> bool {
        matches!(self, Node::Inquiry(InquiryNode::Converted))
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Project a raw node name onto its status category.
///
/// Names outside every vocabulary project to `open` rather than failing.
pub fn status_of(node: &str) -> TicketStatus {
    [TicketType::Inquiry, TicketType::Rma, TicketType::Svc]
        .into_iter()
        .find_map(|ticket_type| Node::parse(ticket_type, node).ok())
        .map(|n| n.status())
        .unwrap_or(TicketStatus::Open)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPES: [TicketType; 3] = [TicketType::Inquiry, TicketType::Rma, TicketType::Svc];

    #[test]
    fn test_every_node_round_trips_through_its_name() {
        for ticket_type in TYPES {
            for node in Node::vocabulary(ticket_type) {
                assert_eq!(Node::parse(ticket_type, node.as_str()), Ok(node));
                assert_eq!(node.ticket_type(), ticket_type);
            }
        }
    }

    #[test]
    fn test_projection_is_consistent_between_typed_and_raw() {
        for ticket_type in TYPES {
            for node in Node::vocabulary(ticket_type) {
                assert_eq!(status_of(node.as_str()), node.status(), "node {}", node);
            }
        }
    }

    #[test]
    fn test_unknown_node_projects_to_open() {
        assert_eq!(status_of("warp_drive"), TicketStatus::Open);
        assert_eq!(status_of(""), TicketStatus::Open);
    }

    #[test]
    fn test_nodes_do_not_cross_vocabularies() {
        assert!(Node::parse(TicketType::Inquiry, "op_repairing").is_err());
        assert!(Node::parse(TicketType::Rma, "draft").is_err());
        assert!(Node::parse(TicketType::Svc, "ms_review").is_err());
        assert!(Node::parse(TicketType::Rma, "converted").is_err());
    }

    #[test]
    fn test_initial_nodes() {
        assert_eq!(Node::initial(TicketType::Inquiry).as_str(), "draft");
        assert_eq!(Node::initial(TicketType::Rma).as_str(), "submitted");
        assert_eq!(Node::initial(TicketType::Svc).as_str(), "submitted");
        for ticket_type in TYPES {
            assert_eq!(Node::initial(ticket_type).status(), TicketStatus::Open);
        }
    }

    #[test]
    fn test_terminal_nodes_carry_no_sla() {
        for ticket_type in TYPES {
            for node in Node::vocabulary(ticket_type) {
                if node.is_terminal() {
                    assert!(node.sla_phase().is_none(), "terminal node {} has SLA", node);
                }
            }
        }
    }

    #[test]
    fn test_converted_projects_to_closed() {
        let node = Node::Inquiry(InquiryNode::Converted);
        assert!(node.is_converted());
        assert_eq!(node.status(), TicketStatus::Closed);
    }
}
