use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{Conversation, ConversationSummary, Message};
use crate::error::ApiError;

pub const MAX_MESSAGE_LEN: usize = 4000;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartConversationRequest {
    pub recipient_id: Uuid,
    #[serde(default)]
    pub service_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

impl SendMessageRequest {
    /// Trimmed content, 1 to 4000 characters.
    pub fn into_content(self) -> Result<String, ApiError> {
        let content = self.content.trim();
        let n = content.chars().count();
        if n == 0 {
            return Err(ApiError::validation("message must not be empty"));
        }
        if n > MAX_MESSAGE_LEN {
            return Err(ApiError::validation(format!(
                "message must be at most {MAX_MESSAGE_LEN} characters"
            )));
        }
        Ok(content.to_string())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantCard {
    pub id: Uuid,
    pub display_name: String,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub id: Uuid,
    pub service_id: Option<Uuid>,
    pub other: ParticipantCard,
    pub last_message: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_message_at: Option<OffsetDateTime>,
    pub unread: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<ConversationSummary> for ConversationResponse {
    fn from(c: ConversationSummary) -> Self {
        Self {
            id: c.id,
            service_id: c.service_id,
            other: ParticipantCard {
                id: c.other_id,
                display_name: c.other_name,
                avatar_url: c.other_avatar,
            },
            last_message: c.last_message,
            last_message_at: c.last_message_at,
            unread: c.unread,
            created_at: c.created_at,
        }
    }
}

/// Conversation as returned right after opening it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenedConversation {
    pub id: Uuid,
    pub other_id: Uuid,
    pub service_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl OpenedConversation {
    pub fn new(c: Conversation, me: Uuid) -> Self {
        Self {
            id: c.id,
            other_id: c.other_participant(me),
            service_id: c.service_id,
            created_at: c.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: Uuid,
    pub sender_id: Uuid,
    /// Sent by the caller.
    pub mine: bool,
    pub content: String,
    pub read: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl MessageResponse {
    pub fn new(m: Message, me: Uuid) -> Self {
        Self {
            id: m.id,
            mine: m.sender_id == me,
            sender_id: m.sender_id,
            content: m.content,
            read: m.read_at.is_some(),
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadResponse {
    pub marked: u64,
}
