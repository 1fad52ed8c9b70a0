//! `SeaORM` Entity for ticket_sequences table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "ticket_sequences")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub ticket_type: String,
    /// Empty string for ticket types that are not partitioned by channel
    pub channel_code: String,
    /// `YYMM` in the service's local calendar
    pub year_month: String,
    pub last_sequence: i32,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
