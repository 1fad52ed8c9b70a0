//! Ticket number sequence allocator and formatter
//!
//! Every ticket family draws from one counter table keyed by
//! (ticket_type, channel_code, year_month). Allocation is a single
//! `INSERT .. ON CONFLICT DO UPDATE .. RETURNING` statement, so concurrent creators
//! for the same partition are serialized by the database on the unique key.

use chrono::{DateTime, Local, TimeZone, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{ConnectionTrait, DbErr, EntityTrait, Set};
use tracing::debug;

use crate::entities::{prelude::TicketSequences, ticket_sequences};
use crate::models::ticket::TicketType;

/// Channel used by svc tickets regardless of the request
pub const SVC_CHANNEL_CODE: &str = "D";

const MAX_CHANNEL_CODE_LEN: usize = 4;
const DECIMAL_SEQUENCE_LIMIT: i32 = 9999;

/// Identifies one counting series
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PartitionKey {
    pub ticket_type: TicketType,
    /// `None` for ticket types whose numbers carry no channel
    pub channel_code: Option<String>,
    /// `YYMM`
    pub year_month: String,
}

impl PartitionKey {
    /// Build the key for a ticket created at `created_at`, normalizing the channel:
    /// inquiry never carries one, svc is fixed to `D`, rma uses the requested channel
    /// or `default_channel`.
    pub fn for_creation<Tz: TimeZone>(
        ticket_type: TicketType,
        requested_channel: Option<&str>,
        default_channel: &str,
        created_at: &DateTime<Tz>,
    ) -> Result<Self, String> {
        let channel_code = match ticket_type {
            TicketType::Inquiry => None,
            TicketType::Svc => Some(SVC_CHANNEL_CODE.to_string()),
            TicketType::Rma => Some(normalize_channel_code(
                requested_channel
                    .filter(|c| !c.trim().is_empty())
                    .unwrap_or(default_channel),
            )?),
        };

        Ok(Self {
            ticket_type,
            channel_code,
            year_month: year_month_of(created_at),
        })
    }

    fn stored_channel(&self) -> &str {
        self.channel_code.as_deref().unwrap_or("")
    }
}

/// Channel codes are short upper-case alphanumerics (e.g. `D` for dealer, `C` for customer)
pub fn normalize_channel_code(raw: &str) -> Result<String, String> {
    let code = raw.trim().to_uppercase();
    if code.is_empty()
        || code.len() > MAX_CHANNEL_CODE_LEN
        || !code.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(format!("Invalid channel code: {}", raw));
    }
    Ok(code)
}

/// `YYMM` of the instant in the service's local calendar
pub fn local_year_month(instant: DateTime<Utc>) -> String {
    year_month_of(&instant.with_timezone(&Local))
}

fn year_month_of<Tz: TimeZone>(instant: &DateTime<Tz>) -> String {
    instant.naive_local().format("%y%m").to_string()
}

/// Zero-padded to 4 digits; past 9999 the sequence switches to upper-case hex,
/// still padded to 4 characters.
pub fn format_sequence(sequence: i32) -> String {
    if sequence <= DECIMAL_SEQUENCE_LIMIT {
        format!("{:04}", sequence)
    } else {
        format!("{:04X}", sequence)
    }
}

/// Render the canonical ticket number for an allocated sequence
pub fn format_ticket_number(key: &PartitionKey, sequence: i32) -> String {
    let seq = format_sequence(sequence);
    match key.ticket_type {
        TicketType::Inquiry => format!("K{}-{}", key.year_month, seq),
        TicketType::Rma => format!("RMA-{}-{}-{}", key.stored_channel(), key.year_month, seq),
        TicketType::Svc => format!("SVC-{}-{}-{}", SVC_CHANNEL_CODE, key.year_month, seq),
    }
}

/// Atomically hand out the next sequence of a partition, creating the counter at 1
/// on first use.
pub async fn next_sequence<C>(db: &C, key: &PartitionKey) -> Result<i32, DbErr>
where
    C: ConnectionTrait,
{
    let counter = ticket_sequences::ActiveModel {
        ticket_type: Set(key.ticket_type.as_str().to_string()),
        channel_code: Set(key.stored_channel().to_string()),
        year_month: Set(key.year_month.clone()),
        last_sequence: Set(1),
        updated_at: Set(Utc::now().fixed_offset()),
        ..Default::default()
    };

    let row = TicketSequences::insert(counter)
        .on_conflict(
            OnConflict::columns([
                ticket_sequences::Column::TicketType,
                ticket_sequences::Column::ChannelCode,
                ticket_sequences::Column::YearMonth,
            ])
            .value(
                ticket_sequences::Column::LastSequence,
                Expr::col((TicketSequences, ticket_sequences::Column::LastSequence)).add(1),
            )
            .update_column(ticket_sequences::Column::UpdatedAt)
            .to_owned(),
        )
        .exec_with_returning(db)
        .await?;

    debug!(
        ticket_type = %key.ticket_type,
        channel_code = key.stored_channel(),
        year_month = %key.year_month,
        sequence = row.last_sequence,
        "Allocated ticket sequence"
    );

    Ok(row.last_sequence)
}

/// Allocate and render the next ticket number of a partition
pub async fn allocate_ticket_number<C>(db: &C, key: &PartitionKey) -> Result<String, DbErr>
where
    C: ConnectionTrait,
{
    let sequence = next_sequence(db, key).await?;
    Ok(format_ticket_number(key, sequence))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn key(ticket_type: TicketType, channel: Option<&str>, year_month: &str) -> PartitionKey {
        PartitionKey {
            ticket_type,
            channel_code: channel.map(str::to_string),
            year_month: year_month.to_string(),
        }
    }

    #[test]
    fn test_inquiry_format() {
        let k = key(TicketType::Inquiry, None, "2602");
        assert_eq!(format_ticket_number(&k, 7), "K2602-0007");
        assert_eq!(format_ticket_number(&k, 9999), "K2602-9999");
    }

    #[test]
    fn test_overflow_switches_to_upper_hex() {
        let k = key(TicketType::Inquiry, None, "2602");
        // 10042 = 0x273A
        assert_eq!(format_ticket_number(&k, 10042), "K2602-273A");
        assert_eq!(format_sequence(10000), "2710");
        assert_eq!(format_sequence(70000), "11170");
    }

    #[test]
    fn test_rma_and_svc_formats() {
        assert_eq!(
            format_ticket_number(&key(TicketType::Rma, Some("C"), "2611"), 12),
            "RMA-C-2611-0012"
        );
        assert_eq!(
            format_ticket_number(&key(TicketType::Svc, Some("D"), "2611"), 1),
            "SVC-D-2611-0001"
        );
    }

    #[test]
    fn test_partition_key_normalizes_channel() {
        let at = FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 2, 14, 9, 30, 0)
            .unwrap();

        let inquiry = PartitionKey::for_creation(TicketType::Inquiry, Some("C"), "D", &at).unwrap();
        assert_eq!(inquiry.channel_code, None);
        assert_eq!(inquiry.year_month, "2602");

        let svc = PartitionKey::for_creation(TicketType::Svc, Some("C"), "D", &at).unwrap();
        assert_eq!(svc.channel_code.as_deref(), Some("D"));

        let rma = PartitionKey::for_creation(TicketType::Rma, Some("c"), "D", &at).unwrap();
        assert_eq!(rma.channel_code.as_deref(), Some("C"));

        let rma_default = PartitionKey::for_creation(TicketType::Rma, None, "D", &at).unwrap();
        assert_eq!(rma_default.channel_code.as_deref(), Some("D"));

        assert!(PartitionKey::for_creation(TicketType::Rma, Some("??"), "D", &at).is_err());
    }

    #[test]
    fn test_year_month_uses_the_instant_calendar_not_utc() {
        // 2026-03-01 01:00 at +08:00 is still February in UTC
        let at = FixedOffset::east_opt(8 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 3, 1, 1, 0, 0)
            .unwrap();
        assert_eq!(year_month_of(&at), "2603");
        assert_eq!(year_month_of(&at.with_timezone(&Utc)), "2602");
    }
}
