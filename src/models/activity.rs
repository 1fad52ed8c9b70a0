//! Activity timeline types and request/response models

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::entities::ticket_activities;
use crate::models::ticket::{Pagination, Priority, TicketType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    StatusChange,
    PriorityChange,
    AssignmentChange,
    TicketLinked,
    Comment,
    Mention,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::StatusChange => "status_change",
            ActivityType::PriorityChange => "priority_change",
            ActivityType::AssignmentChange => "assignment_change",
            ActivityType::TicketLinked => "ticket_linked",
            ActivityType::Comment => "comment",
            ActivityType::Mention => "mention",
        }
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActivityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "status_change" => Ok(ActivityType::StatusChange),
            "priority_change" => Ok(ActivityType::PriorityChange),
            "assignment_change" => Ok(ActivityType::AssignmentChange),
            "ticket_linked" => Ok(ActivityType::TicketLinked),
            "comment" => Ok(ActivityType::Comment),
            "mention" => Ok(ActivityType::Mention),
            _ => Err(format!("Unknown activity type: {}", s)),
        }
    }
}

/// Who may see an activity: `all` includes dealers, `internal` is staff only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    All,
    Internal,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::All => "all",
            Visibility::Internal => "internal",
        }
    }
}

impl std::str::FromStr for Visibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Visibility::All),
            "internal" => Ok(Visibility::Internal),
            _ => Err(format!("Unknown visibility: {}", s)),
        }
    }
}

/// A user referenced with `@[name](user_id)` in a comment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    pub user_id: i32,
    pub name: String,
}

/// Structured before/after payload stored in the activity `metadata` column.
///
/// The variant is implied by the activity type, so the JSON form is untagged;
/// use [`ActivityMetadata::decode`] to read it back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ActivityMetadata {
    StatusChange {
        from_node: Option<String>,
        to_node: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        from_ticket_id: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        from_ticket_number: Option<String>,
    },
    PriorityChange {
        from_priority: Priority,
        to_priority: Priority,
    },
    AssignmentChange {
        from_user_id: Option<i32>,
        to_user_id: Option<i32>,
    },
    TicketLinked {
        linked_ticket_id: i32,
        linked_ticket_number: String,
        target_type: TicketType,
    },
    Mention {
        mentions: Vec<Mention>,
        activity_id: i32,
    },
}

#[derive(Deserialize)]
struct StatusChangeFields {
    from_node: Option<String>,
    to_node: String,
    from_ticket_id: Option<i32>,
    from_ticket_number: Option<String>,
}

#[derive(Deserialize)]
struct PriorityChangeFields {
    from_priority: Priority,
    to_priority: Priority,
}

#[derive(Deserialize)]
struct AssignmentChangeFields {
    from_user_id: Option<i32>,
    to_user_id: Option<i32>,
}

#[derive(Deserialize)]
struct TicketLinkedFields {
    linked_ticket_id: i32,
    linked_ticket_number: String,
    target_type: TicketType,
}

#[derive(Deserialize)]
struct MentionFields {
    mentions: Vec<Mention>,
    activity_id: i32,
}

impl ActivityMetadata {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Read a stored payload back using the activity type as the discriminant
    pub fn decode(activity_type: ActivityType, value: &serde_json::Value) -> Option<Self> {
        let value = value.clone();
        match activity_type {
            ActivityType::StatusChange => serde_json::from_value::<StatusChangeFields>(value)
                .ok()
                .map(|f| ActivityMetadata::StatusChange {
                    from_node: f.from_node,
                    to_node: f.to_node,
                    from_ticket_id: f.from_ticket_id,
                    from_ticket_number: f.from_ticket_number,
                }),
            ActivityType::PriorityChange => serde_json::from_value::<PriorityChangeFields>(value)
                .ok()
                .map(|f| ActivityMetadata::PriorityChange {
                    from_priority: f.from_priority,
                    to_priority: f.to_priority,
                }),
            ActivityType::AssignmentChange => {
                serde_json::from_value::<AssignmentChangeFields>(value)
                    .ok()
                    .map(|f| ActivityMetadata::AssignmentChange {
                        from_user_id: f.from_user_id,
                        to_user_id: f.to_user_id,
                    })
            }
            ActivityType::TicketLinked => serde_json::from_value::<TicketLinkedFields>(value)
                .ok()
                .map(|f| ActivityMetadata::TicketLinked {
                    linked_ticket_id: f.linked_ticket_id,
                    linked_ticket_number: f.linked_ticket_number,
                    target_type: f.target_type,
                }),
            ActivityType::Mention => serde_json::from_value::<MentionFields>(value)
                .ok()
                .map(|f| ActivityMetadata::Mention {
                    mentions: f.mentions,
                    activity_id: f.activity_id,
                }),
            ActivityType::Comment => None,
        }
    }
}

/// Query parameters for GET /tickets/{id}/activities
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivityListQuery {
    pub activity_type: Option<String>,
    pub visibility: Option<String>,
    pub page: Option<u64>,
    pub page_size: Option<u64>,
}

pub const DEFAULT_ACTIVITY_PAGE_SIZE: u64 = 50;

impl ActivityListQuery {
    pub fn validate(&self) -> Result<(), String> {
        if matches!(self.page, Some(0)) {
            return Err("page must be at least 1".to_string());
        }
        if let Some(page_size) = self.page_size {
            if !(1..=100).contains(&page_size) {
                return Err("page_size must be between 1 and 100".to_string());
            }
        }
        Ok(())
    }
}

/// Request body for POST /tickets/{id}/activities
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateActivityRequest {
    pub content: Option<String>,
    pub visibility: Option<Visibility>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorView {
    pub id: i32,
    pub name: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityResponse {
    pub id: i32,
    pub ticket_id: i32,
    pub activity_type: String,
    pub content: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub visibility: String,
    pub actor: Option<ActorView>,
    pub created_at: DateTime<FixedOffset>,
}

impl From<ticket_activities::Model> for ActivityResponse {
    fn from(model: ticket_activities::Model) -> Self {
        Self {
            id: model.id,
            ticket_id: model.ticket_id,
            activity_type: model.activity_type,
            content: model.content,
            metadata: model.metadata,
            visibility: model.visibility,
            actor: model.actor_id.map(|id| ActorView {
                id,
                name: model.actor_name,
                role: model.actor_role,
            }),
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityListResponse {
    pub activities: Vec<ActivityResponse>,
    pub pagination: Pagination,
}
