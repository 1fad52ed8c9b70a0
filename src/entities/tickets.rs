//! `SeaORM` Entity for the unified tickets table
//!
//! One table holds every ticket type; `current_node`, `ticket_type`, `priority` and the status
//! columns are stored as strings and parsed into typed vocabularies by `models::ticket`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub ticket_number: String,
    pub ticket_type: String,
    pub channel_code: Option<String>,

    pub issue_type: Option<String>,
    pub issue_category: Option<String>,
    pub issue_subcategory: Option<String>,
    /// 1 (lowest) to 5 (highest)
    pub severity: i32,
    pub is_warranty: bool,

    pub current_node: String,
    pub status: String,
    pub status_changed_at: Option<DateTimeWithTimeZone>,
    pub node_entered_at: DateTimeWithTimeZone,

    pub priority: String,
    pub sla_due_at: Option<DateTimeWithTimeZone>,
    pub sla_status: String,
    pub breach_counter: i32,

    pub account_id: Option<i32>,
    pub contact_id: Option<i32>,
    pub dealer_id: Option<i32>,
    pub reporter_name: Option<String>,
    pub reporter_type: Option<String>,
    pub region: Option<String>,
    pub assigned_to: Option<i32>,
    pub submitted_by: Option<i32>,
    pub created_by: Option<i32>,

    pub product_id: Option<i32>,
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
    pub hardware_version: Option<String>,

    pub service_type: Option<String>,
    pub channel: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub problem_summary: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub communication_log: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub problem_description: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub solution_for_customer: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub repair_content: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub problem_analysis: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub resolution: Option<String>,

    pub payment_channel: Option<String>,
    #[sea_orm(column_type = "Double", nullable)]
    pub payment_amount: Option<f64>,
    pub payment_date: Option<Date>,

    pub feedback_date: Option<Date>,
    pub ship_date: Option<Date>,
    pub received_date: Option<Date>,
    pub completed_date: Option<Date>,
    pub first_response_at: Option<DateTimeWithTimeZone>,

    /// Participant list as a JSON array, see `models::ticket::Participant`
    #[sea_orm(column_type = "Json", nullable)]
    pub participants: Option<Json>,
    pub snooze_until: Option<DateTimeWithTimeZone>,

    pub parent_ticket_id: Option<i32>,
    pub external_link: Option<String>,

    pub approval_status: Option<String>,
    pub approved_by: Option<i32>,
    pub approved_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::ticket_activities::Entity")]
    TicketActivities,
}

impl Related<super::ticket_activities::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TicketActivities.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
