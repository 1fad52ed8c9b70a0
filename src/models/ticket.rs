//! Ticket vocabularies and request/response models for the /tickets endpoints

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

use crate::entities::tickets;

/// Ticket families sharing the unified table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketType {
    Inquiry,
    Rma,
    Svc,
}

impl TicketType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketType::Inquiry => "inquiry",
            TicketType::Rma => "rma",
            TicketType::Svc => "svc",
        }
    }
}

impl std::fmt::Display for TicketType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TicketType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "inquiry" => Ok(TicketType::Inquiry),
            "rma" => Ok(TicketType::Rma),
            "svc" => Ok(TicketType::Svc),
            _ => Err(format!("Unknown ticket type: {}", s)),
        }
    }
}

/// P0 is the most urgent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Priority {
    #[serde(alias = "p0")]
    P0,
    #[serde(alias = "p1")]
    P1,
    #[serde(alias = "p2")]
    P2,
    #[serde(alias = "p3")]
    P3,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::P0, Priority::P1, Priority::P2, Priority::P3];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::P0 => "P0",
            Priority::P1 => "P1",
            Priority::P2 => "P2",
            Priority::P3 => "P3",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::P2
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "P0" => Ok(Priority::P0),
            "P1" => Ok(Priority::P1),
            "P2" => Ok(Priority::P2),
            "P3" => Ok(Priority::P3),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Coarse lifecycle category projected from the current node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Waiting,
    Resolved,
    Closed,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Waiting => "waiting",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
            TicketStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(TicketStatus::Open),
            "in_progress" => Ok(TicketStatus::InProgress),
            "waiting" => Ok(TicketStatus::Waiting),
            "resolved" => Ok(TicketStatus::Resolved),
            "closed" => Ok(TicketStatus::Closed),
            "cancelled" => Ok(TicketStatus::Cancelled),
            _ => Err(format!("Unknown ticket status: {}", s)),
        }
    }
}

/// A user attached to the ticket's collaboration list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: i32,
    pub role: String,
    pub added_at: DateTime<Utc>,
    pub added_by: i32,
}

/// Decode the stored participants column; a malformed blob reads as an empty list.
pub fn participants_of(model: &tickets::Model) -> Vec<Participant> {
    model
        .participants
        .clone()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}

/// Distinguishes an absent field (`None`) from an explicit `null` (`Some(None)`)
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Request body for POST /tickets
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTicketRequest {
    pub ticket_type: Option<String>,
    pub priority: Option<Priority>,
    pub channel_code: Option<String>,

    pub account_id: Option<i32>,
    pub contact_id: Option<i32>,
    pub dealer_id: Option<i32>,
    pub reporter_name: Option<String>,
    pub reporter_type: Option<String>,
    pub region: Option<String>,

    pub product_id: Option<i32>,
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
    pub hardware_version: Option<String>,

    pub issue_type: Option<String>,
    pub issue_category: Option<String>,
    pub issue_subcategory: Option<String>,
    pub severity: Option<i32>,

    pub service_type: Option<String>,
    pub channel: Option<String>,
    pub problem_summary: Option<String>,
    pub communication_log: Option<String>,

    pub problem_description: Option<String>,
    pub solution_for_customer: Option<String>,
    pub is_warranty: Option<bool>,

    pub assigned_to: Option<i32>,
    pub feedback_date: Option<NaiveDate>,
    pub parent_ticket_id: Option<i32>,
}

/// Response for POST /tickets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTicketResponse {
    pub id: i32,
    pub ticket_number: String,
    pub ticket_type: TicketType,
    pub current_node: String,
    pub priority: Priority,
    pub sla_due_at: Option<DateTime<FixedOffset>>,
}

/// Request body for PATCH /tickets/{id}
///
/// Only whitelisted fields are accepted; anything else in the body is ignored.
/// Nullable columns use a double option so `null` clears the value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTicketRequest {
    pub priority: Option<Priority>,
    pub current_node: Option<String>,

    #[serde(default, deserialize_with = "double_option")]
    pub account_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub contact_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub dealer_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub reporter_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub reporter_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub region: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub product_id: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub serial_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub firmware_version: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub hardware_version: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub issue_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub issue_category: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub issue_subcategory: Option<Option<String>>,
    pub severity: Option<i32>,

    #[serde(default, deserialize_with = "double_option")]
    pub service_type: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub channel: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub problem_summary: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub communication_log: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub problem_description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub solution_for_customer: Option<Option<String>>,
    pub is_warranty: Option<bool>,

    #[serde(default, deserialize_with = "double_option")]
    pub repair_content: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub problem_analysis: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub resolution: Option<Option<String>>,

    #[serde(default, deserialize_with = "double_option")]
    pub assigned_to: Option<Option<i32>>,

    #[serde(default, deserialize_with = "double_option")]
    pub payment_channel: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub payment_amount: Option<Option<f64>>,
    #[serde(default, deserialize_with = "double_option")]
    pub payment_date: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "double_option")]
    pub feedback_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub ship_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub received_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "double_option")]
    pub completed_date: Option<Option<NaiveDate>>,

    #[serde(default, deserialize_with = "double_option")]
    pub snooze_until: Option<Option<DateTime<FixedOffset>>>,
    #[serde(default, deserialize_with = "double_option")]
    pub external_link: Option<Option<String>>,
}

/// Response for PATCH /tickets/{id}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateTicketResponse {
    pub updated: bool,
    pub message: String,
}

/// Request body for POST /tickets/{id}/convert
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConvertTicketRequest {
    pub target_type: Option<String>,
    pub channel_code: Option<String>,
}

/// Response for POST /tickets/{id}/convert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertTicketResponse {
    pub new_ticket_id: i32,
    pub new_ticket_number: String,
    pub target_type: TicketType,
    pub original_ticket_id: i32,
    pub original_ticket_number: String,
}

/// Query parameters for GET /tickets
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketListQuery {
    pub ticket_type: Option<String>,
    pub status: Option<String>,
    pub current_node: Option<String>,
    pub priority: Option<String>,
    pub sla_status: Option<String>,
    pub account_id: Option<i32>,
    pub dealer_id: Option<i32>,
    pub assigned_to: Option<i32>,
    pub submitted_by: Option<i32>,
    pub serial_number: Option<String>,
    pub keyword: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD`
    pub created_from: Option<String>,
    /// RFC 3339 timestamp or `YYYY-MM-DD` (inclusive)
    pub created_to: Option<String>,
    /// 1-based page (default: 1)
    pub page: Option<u64>,
    /// Page size (default: 20, max: 100)
    pub page_size: Option<u64>,
    /// created_at | updated_at | priority | sla_due_at | ticket_number
    pub sort_by: Option<String>,
    /// asc | desc (default: desc)
    pub sort_order: Option<String>,
}

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;
pub const SORTABLE_COLUMNS: [&str; 5] = [
    "created_at",
    "updated_at",
    "priority",
    "sla_due_at",
    "ticket_number",
];

impl TicketListQuery {
    /// Validate pagination parameters
    pub fn validate(&self) -> Result<(), String> {
        if let Some(page) = self.page {
            if page < 1 {
                return Err("page must be at least 1".to_string());
            }
        }
        if let Some(page_size) = self.page_size {
            if page_size < 1 {
                return Err("page_size must be at least 1".to_string());
            }
            if page_size > MAX_PAGE_SIZE {
                return Err(format!("page_size cannot exceed {}", MAX_PAGE_SIZE));
            }
        }
        Ok(())
    }

    pub fn page(&self) -> u64 {
        self.page.unwrap_or(1)
    }

    pub fn page_size(&self) -> u64 {
        self.page_size.unwrap_or(DEFAULT_PAGE_SIZE)
    }
}

/// Pagination metadata shared by list responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(page: u64, page_size: u64, total: u64) -> Self {
        Self {
            page,
            page_size,
            total,
            total_pages: total.div_ceil(page_size.max(1)),
        }
    }
}

/// Ticket row in list responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSummary {
    pub id: i32,
    pub ticket_number: String,
    pub ticket_type: String,
    pub current_node: String,
    pub status: String,
    pub priority: String,
    pub sla_due_at: Option<DateTime<FixedOffset>>,
    pub sla_status: String,
    pub breach_counter: i32,
    pub account_id: Option<i32>,
    pub contact_id: Option<i32>,
    pub dealer_id: Option<i32>,
    pub reporter_name: Option<String>,
    pub reporter_type: Option<String>,
    pub region: Option<String>,
    pub product_id: Option<i32>,
    pub serial_number: Option<String>,
    pub assigned_to: Option<i32>,
    pub submitted_by: Option<i32>,
    pub parent_ticket_id: Option<i32>,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<&tickets::Model> for TicketSummary {
    fn from(model: &tickets::Model) -> Self {
        Self {
            id: model.id,
            ticket_number: model.ticket_number.clone(),
            ticket_type: model.ticket_type.clone(),
            current_node: model.current_node.clone(),
            status: model.status.clone(),
            priority: model.priority.clone(),
            sla_due_at: model.sla_due_at,
            sla_status: model.sla_status.clone(),
            breach_counter: model.breach_counter,
            account_id: model.account_id,
            contact_id: model.contact_id,
            dealer_id: model.dealer_id,
            reporter_name: model.reporter_name.clone(),
            reporter_type: model.reporter_type.clone(),
            region: model.region.clone(),
            product_id: model.product_id,
            serial_number: model.serial_number.clone(),
            assigned_to: model.assigned_to,
            submitted_by: model.submitted_by,
            parent_ticket_id: model.parent_ticket_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Response for GET /tickets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketListResponse {
    pub tickets: Vec<TicketSummary>,
    pub pagination: Pagination,
}

/// Display names resolved through the party directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayNames {
    pub account_name: Option<String>,
    pub contact_name: Option<String>,
    pub dealer_name: Option<String>,
    pub product_name: Option<String>,
    pub assigned_name: Option<String>,
    pub submitted_name: Option<String>,
}

/// Response for GET /tickets/{id}
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub summary: TicketSummary,
    #[serde(flatten)]
    pub names: DisplayNames,

    pub channel_code: Option<String>,
    pub firmware_version: Option<String>,
    pub hardware_version: Option<String>,

    pub issue_type: Option<String>,
    pub issue_category: Option<String>,
    pub issue_subcategory: Option<String>,
    pub severity: i32,
    pub is_warranty: bool,

    pub service_type: Option<String>,
    pub channel: Option<String>,
    pub problem_summary: Option<String>,
    pub communication_log: Option<String>,
    pub problem_description: Option<String>,
    pub solution_for_customer: Option<String>,
    pub repair_content: Option<String>,
    pub problem_analysis: Option<String>,
    pub resolution: Option<String>,

    pub payment_channel: Option<String>,
    pub payment_amount: Option<f64>,
    pub payment_date: Option<NaiveDate>,

    pub feedback_date: Option<NaiveDate>,
    pub ship_date: Option<NaiveDate>,
    pub received_date: Option<NaiveDate>,
    pub completed_date: Option<NaiveDate>,
    pub first_response_at: Option<DateTime<FixedOffset>>,

    pub node_entered_at: DateTime<FixedOffset>,
    pub status_changed_at: Option<DateTime<FixedOffset>>,
    pub sla_remaining_hours: Option<f64>,
    pub sla_remaining_percent: Option<f64>,

    pub participants: Vec<Participant>,
    pub snooze_until: Option<DateTime<FixedOffset>>,

    pub parent_ticket_number: Option<String>,
    pub external_link: Option<String>,

    pub approval_status: Option<String>,
    pub approved_by: Option<i32>,
    pub approved_at: Option<DateTime<FixedOffset>>,
    pub created_by: Option<i32>,
}

impl TicketDetail {
    pub fn new(model: &tickets::Model, names: DisplayNames) -> Self {
        Self {
            summary: TicketSummary::from(model),
            names,
            channel_code: model.channel_code.clone(),
            firmware_version: model.firmware_version.clone(),
            hardware_version: model.hardware_version.clone(),
            issue_type: model.issue_type.clone(),
            issue_category: model.issue_category.clone(),
            issue_subcategory: model.issue_subcategory.clone(),
            severity: model.severity,
            is_warranty: model.is_warranty,
            service_type: model.service_type.clone(),
            channel: model.channel.clone(),
            problem_summary: model.problem_summary.clone(),
            communication_log: model.communication_log.clone(),
            problem_description: model.problem_description.clone(),
            solution_for_customer: model.solution_for_customer.clone(),
            repair_content: model.repair_content.clone(),
            problem_analysis: model.problem_analysis.clone(),
            resolution: model.resolution.clone(),
            payment_channel: model.payment_channel.clone(),
            payment_amount: model.payment_amount,
            payment_date: model.payment_date,
            feedback_date: model.feedback_date,
            ship_date: model.ship_date,
            received_date: model.received_date,
            completed_date: model.completed_date,
            first_response_at: model.first_response_at,
            node_entered_at: model.node_entered_at,
            status_changed_at: model.status_changed_at,
            sla_remaining_hours: None,
            sla_remaining_percent: None,
            participants: participants_of(model),
            snooze_until: model.snooze_until,
            parent_ticket_number: None,
            external_link: model.external_link.clone(),
            approval_status: model.approval_status.clone(),
            approved_by: model.approved_by,
            approved_at: model.approved_at,
            created_by: model.created_by,
        }
    }
}

/// Query parameters for GET /tickets/stats/summary
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketStatsQuery {
    pub ticket_type: Option<String>,
    pub created_from: Option<String>,
    pub created_to: Option<String>,
}

/// Response for GET /tickets/stats/summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketStatsResponse {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_priority: BTreeMap<String, i64>,
    pub by_sla_status: BTreeMap<String, i64>,
    pub by_type: BTreeMap<String, i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_parse_is_case_insensitive() {
        assert_eq!("p0".parse::<Priority>(), Ok(Priority::P0));
        assert_eq!("P3".parse::<Priority>(), Ok(Priority::P3));
        assert!("P4".parse::<Priority>().is_err());
    }

    #[test]
    fn test_request_bodies_accept_lowercase_priority() {
        let update: UpdateTicketRequest =
            serde_json::from_value(serde_json::json!({ "priority": "p0" })).unwrap();
        assert_eq!(update.priority, Some(Priority::P0));

        let create: CreateTicketRequest =
            serde_json::from_value(serde_json::json!({ "ticket_type": "rma", "priority": "p3" }))
                .unwrap();
        assert_eq!(create.priority, Some(Priority::P3));

        assert!(serde_json::from_value::<UpdateTicketRequest>(
            serde_json::json!({ "priority": "urgent" })
        )
        .is_err());
        // Responses keep the canonical spelling
        assert_eq!(serde_json::to_value(Priority::P1).unwrap(), "P1");
    }

    #[test]
    fn test_update_request_distinguishes_null_from_absent() {
        let req: UpdateTicketRequest =
            serde_json::from_str(r#"{"assigned_to": null, "region": "EU"}"#).unwrap();
        assert_eq!(req.assigned_to, Some(None));
        assert_eq!(req.region, Some(Some("EU".to_string())));
        assert_eq!(req.contact_id, None);
        assert!(req.priority.is_none());
    }

    #[test]
    fn test_update_request_ignores_unknown_fields() {
        let req: UpdateTicketRequest =
            serde_json::from_str(r#"{"ticket_number": "X", "parent_ticket_id": 9}"#).unwrap();
        assert!(req.priority.is_none());
        assert!(req.current_node.is_none());
    }

    #[test]
    fn test_list_query_validation() {
        let ok = TicketListQuery {
            page: Some(2),
            page_size: Some(100),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let too_big = TicketListQuery {
            page_size: Some(101),
            ..Default::default()
        };
        assert!(too_big.validate().is_err());

        let zero_page = TicketListQuery {
            page: Some(0),
            ..Default::default()
        };
        assert!(zero_page.validate().is_err());
    }

    #[test]
    fn test_pagination_total_pages() {
        assert_eq!(Pagination::new(1, 20, 0).total_pages, 0);
        assert_eq!(Pagination::new(1, 20, 20).total_pages, 1);
        assert_eq!(Pagination::new(1, 20, 21).total_pages, 2);
    }
}
