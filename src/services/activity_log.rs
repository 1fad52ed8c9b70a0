//! Append-only ticket activity log
//!
//! Rows are only ever inserted. Every state, priority and assignment change writes one
//! entry inside the transaction that performs the change.

use chrono::{DateTime, FixedOffset, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use tracing::{debug, info};

use crate::auth::AuthUser;
use crate::entities::{prelude::TicketActivities, ticket_activities, tickets};
use crate::error::TicketError;
use crate::models::activity::{
    ActivityListQuery, ActivityListResponse, ActivityMetadata, ActivityResponse, ActivityType,
    CreateActivityRequest, Mention, Visibility, DEFAULT_ACTIVITY_PAGE_SIZE,
};
use crate::models::ticket::{participants_of, Pagination, Participant};
use crate::services::tickets as ticket_store;

lazy_static! {
    // @[Display Name](42)
    static ref MENTION_REGEX: Regex = Regex::new(r"@\[([^\]]+)\]\((\d+)\)").unwrap();
}

const MENTIONED_ROLE: &str = "mentioned";

/// One activity row to be written
#[derive(Debug, Clone)]
pub struct ActivityEntry {
    ticket_id: i32,
    activity_type: ActivityType,
    content: Option<String>,
    metadata: Option<ActivityMetadata>,
    visibility: Visibility,
    actor_id: Option<i32>,
    actor_name: Option<String>,
    actor_role: Option<String>,
}

impl ActivityEntry {
    pub fn new(ticket_id: i32, activity_type: ActivityType) -> Self {
        Self {
            ticket_id,
            activity_type,
            content: None,
            metadata: None,
            visibility: Visibility::All,
            actor_id: None,
            actor_name: None,
            actor_role: None,
        }
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn metadata(mut self, metadata: ActivityMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn actor(mut self, user: &AuthUser) -> Self {
        self.actor_id = Some(user.id);
        self.actor_name = Some(user.name.clone());
        self.actor_role = Some(user.actor_role().to_string());
        self
    }
}

pub async fn append<C>(
    db: &C,
    entry: ActivityEntry,
    now: DateTime<FixedOffset>,
) -> Result<ticket_activities::Model, DbErr>
where
    C: ConnectionTrait,
{
    let row = ticket_activities::ActiveModel {
        ticket_id: Set(entry.ticket_id),
        activity_type: Set(entry.activity_type.as_str().to_string()),
        content: Set(entry.content),
        metadata: Set(entry.metadata.as_ref().map(ActivityMetadata::to_json)),
        actor_id: Set(entry.actor_id),
        actor_name: Set(entry.actor_name),
        actor_role: Set(entry.actor_role),
        visibility: Set(entry.visibility.as_str().to_string()),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    debug!(
        ticket_id = row.ticket_id,
        activity_id = row.id,
        activity_type = %row.activity_type,
        "Activity appended"
    );

    Ok(row)
}

/// Extract `@[name](user_id)` mentions, first occurrence of each user wins
pub fn parse_mentions(content: &str) -> Vec<Mention> {
    let mut mentions: Vec<Mention> = Vec::new();
    for caps in MENTION_REGEX.captures_iter(content) {
        let Ok(user_id) = caps[2].parse::<i32>() else {
            continue;
        };
        if mentions.iter().any(|m| m.user_id == user_id) {
            continue;
        }
        mentions.push(Mention {
            user_id,
            name: caps[1].trim().to_string(),
        });
    }
    mentions
}

/// Newest-first page of a ticket's timeline as seen by `caller`
pub async fn list_for_ticket(
    db: &DatabaseConnection,
    ticket_id: i32,
    query: &ActivityListQuery,
    caller: &AuthUser,
) -> Result<ActivityListResponse, TicketError> {
    query.validate().map_err(TicketError::Validation)?;

    let mut condition = Condition::all().add(ticket_activities::Column::TicketId.eq(ticket_id));

    if let Some(raw) = query.activity_type.as_deref().filter(|s| !s.is_empty()) {
        let activity_type = raw
            .parse::<ActivityType>()
            .map_err(TicketError::Validation)?;
        condition = condition.add(ticket_activities::Column::ActivityType.eq(activity_type.as_str()));
    }

    // Dealers never see internal notes, whatever they ask for
    let visibility = if caller.is_dealer() {
        Some(Visibility::All)
    } else {
        query
            .visibility
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<Visibility>())
            .transpose()
            .map_err(TicketError::Validation)?
    };
    if let Some(visibility) = visibility {
        condition = condition.add(ticket_activities::Column::Visibility.eq(visibility.as_str()));
    }

    let page = query.page.unwrap_or(1);
    let page_size = query.page_size.unwrap_or(DEFAULT_ACTIVITY_PAGE_SIZE);

    let select = TicketActivities::find().filter(condition);
    let total = select.clone().count(db).await?;

    let rows = select
        .order_by(ticket_activities::Column::CreatedAt, Order::Desc)
        .order_by(ticket_activities::Column::Id, Order::Desc)
        .offset((page - 1) * page_size)
        .limit(page_size)
        .all(db)
        .await?;

    Ok(ActivityListResponse {
        activities: rows.into_iter().map(ActivityResponse::from).collect(),
        pagination: Pagination::new(page, page_size, total),
    })
}

/// Post a comment on a ticket.
///
/// Mentioned users join the participant list and get a `mention` entry. The first comment
/// from staff stamps `first_response_at`. The ticket is read under a row lock inside the
/// comment's transaction, so concurrent mentions all land in the participant list.
pub async fn add_comment(
    db: &DatabaseConnection,
    id: i32,
    req: CreateActivityRequest,
    caller: &AuthUser,
    now: DateTime<FixedOffset>,
) -> Result<ActivityResponse, TicketError> {
    let content = req
        .content
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .ok_or_else(|| TicketError::Validation("content is required".to_string()))?
        .to_string();

    let visibility = if caller.is_dealer() {
        Visibility::All
    } else {
        req.visibility.unwrap_or_default()
    };

    let mentions = parse_mentions(&content);

    let txn = db.begin().await?;
    let ticket = ticket_store::load_for_update(&txn, id, caller).await?;

    let comment = append(
        &txn,
        ActivityEntry::new(ticket.id, ActivityType::Comment)
            .content(content)
            .visibility(visibility)
            .actor(caller),
        now,
    )
    .await?;

    let mut active: tickets::ActiveModel = ticket.clone().into();

    if !mentions.is_empty() {
        let mut participants = participants_of(&ticket);
        for mention in &mentions {
            if participants.iter().all(|p| p.user_id != mention.user_id) {
                participants.push(Participant {
                    user_id: mention.user_id,
                    role: MENTIONED_ROLE.to_string(),
                    added_at: now.with_timezone(&Utc),
                    added_by: caller.id,
                });
            }
        }
        active.participants = Set(Some(serde_json::to_value(&participants).map_err(|e| {
            TicketError::Database(DbErr::Custom(format!("participants encoding: {}", e)))
        })?));

        append(
            &txn,
            ActivityEntry::new(ticket.id, ActivityType::Mention)
                .metadata(ActivityMetadata::Mention {
                    mentions: mentions.clone(),
                    activity_id: comment.id,
                })
                .visibility(visibility)
                .actor(caller),
            now,
        )
        .await?;
    }

    if !caller.is_dealer() && ticket.first_response_at.is_none() {
        active.first_response_at = Set(Some(now));
    }

    active.updated_at = Set(now);
    active.update(&txn).await?;
    txn.commit().await?;

    info!(
        ticket_id = ticket.id,
        activity_id = comment.id,
        mentions = mentions.len(),
        actor_id = caller.id,
        "Comment added"
    );

    Ok(ActivityResponse::from(comment))
}
