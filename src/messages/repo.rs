use anyhow::Context;
use sqlx::{FromRow, PgExecutor};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::pagination::PageParams;

#[derive(Debug, Clone, FromRow)]
pub struct Conversation {
    pub id: Uuid,
    pub participant_a: Uuid,
    pub participant_b: Uuid,
    pub service_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
}

impl Conversation {
    pub fn has_participant(&self, profile_id: Uuid) -> bool {
        self.participant_a == profile_id || self.participant_b == profile_id
    }

    pub fn other_participant(&self, profile_id: Uuid) -> Uuid {
        if self.participant_a == profile_id {
            self.participant_b
        } else {
            self.participant_a
        }
    }
}

/// Stored participant order: the smaller id is always `participant_a`.
pub fn ordered_pair(x: Uuid, y: Uuid) -> (Uuid, Uuid) {
    if x <= y {
        (x, y)
    } else {
        (y, x)
    }
}

/// Inbox row from the caller's point of view.
#[derive(Debug, Clone, FromRow)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub service_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub other_id: Uuid,
    pub other_name: String,
    pub other_avatar: Option<String>,
    pub last_message: Option<String>,
    pub last_message_at: Option<OffsetDateTime>,
    pub unread: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub content: String,
    pub read_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

impl Conversation {
    pub async fn find<'e>(
        db: impl PgExecutor<'e>,
        id: Uuid,
    ) -> anyhow::Result<Option<Conversation>> {
        let row = sqlx::query_as::<_, Conversation>(
            r#"
            SELECT id, participant_a, participant_b, service_id, created_at
              FROM conversations
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(db)
        .await
        .context("find conversation")?;
        Ok(row)
    }

    /// Existing conversation for the pair, or a new one. A service attached
    /// to the first contact is kept.
    pub async fn get_or_create<'e>(
        db: impl PgExecutor<'e>,
        x: Uuid,
        y: Uuid,
        service_id: Option<Uuid>,
    ) -> anyhow::Result<Conversation> {
        let (a, b) = ordered_pair(x, y);
        let row = sqlx::query_as::<_, Conversation>(
            r#"
            INSERT INTO conversations (participant_a, participant_b, service_id)
            VALUES ($1, $2, $3)
            ON CONFLICT ON CONSTRAINT conversations_pair_key DO UPDATE
               SET service_id = COALESCE(conversations.service_id, EXCLUDED.service_id)
            RETURNING id, participant_a, participant_b, service_id, created_at
            "#,
        )
        .bind(a)
        .bind(b)
        .bind(service_id)
        .fetch_one(db)
        .await
        .context("upsert conversation")?;
        Ok(row)
    }

    /// The caller's conversations, most recently active first.
    pub async fn list_for<'e>(
        db: impl PgExecutor<'e>,
        profile_id: Uuid,
    ) -> anyhow::Result<Vec<ConversationSummary>> {
        let rows = sqlx::query_as::<_, ConversationSummary>(
            r#"
            SELECT c.id, c.service_id, c.created_at,
                   o.id AS other_id, o.display_name AS other_name, o.avatar_url AS other_avatar,
                   lm.content AS last_message, lm.created_at AS last_message_at,
                   (SELECT COUNT(*)
                      FROM messages m
                     WHERE m.conversation_id = c.id
                       AND m.sender_id <> $1
                       AND m.read_at IS NULL) AS unread
              FROM conversations c
              JOIN profiles o
                ON o.id = CASE WHEN c.participant_a = $1 THEN c.participant_b ELSE c.participant_a END
              LEFT JOIN LATERAL (
                    SELECT content, created_at
                      FROM messages m
                     WHERE m.conversation_id = c.id
                     ORDER BY m.created_at DESC, m.id DESC
                     LIMIT 1
                   ) lm ON TRUE
             WHERE c.participant_a = $1 OR c.participant_b = $1
             ORDER BY COALESCE(lm.created_at, c.created_at) DESC, c.id
            "#,
        )
        .bind(profile_id)
        .fetch_all(db)
        .await
        .context("list conversations")?;
        Ok(rows)
    }
}

impl Message {
    /// One page of a conversation, oldest first, plus the message total.
    pub async fn page<'e, E>(
        db: E,
        conversation_id: Uuid,
        page: PageParams,
    ) -> anyhow::Result<(Vec<Message>, i64)>
    where
        E: PgExecutor<'e> + Copy,
    {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE conversation_id = $1")
                .bind(conversation_id)
                .fetch_one(db)
                .await
                .context("count messages")?;

        let rows = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, conversation_id, sender_id, content, read_at, created_at
              FROM messages
             WHERE conversation_id = $1
             ORDER BY created_at ASC, id
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(conversation_id)
        .bind(page.limit)
        .bind(page.offset())
        .fetch_all(db)
        .await
        .context("list messages")?;
        Ok((rows, total))
    }

    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        conversation_id: Uuid,
        sender_id: Uuid,
        content: &str,
    ) -> anyhow::Result<Message> {
        let row = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (conversation_id, sender_id, content)
            VALUES ($1, $2, $3)
            RETURNING id, conversation_id, sender_id, content, read_at, created_at
            "#,
        )
        .bind(conversation_id)
        .bind(sender_id)
        .bind(content)
        .fetch_one(db)
        .await
        .context("insert message")?;
        Ok(row)
    }

    /// Mark everything the other participant sent as read.
    pub async fn mark_read<'e>(
        db: impl PgExecutor<'e>,
        conversation_id: Uuid,
        reader_id: Uuid,
    ) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            UPDATE messages
               SET read_at = now()
             WHERE conversation_id = $1 AND sender_id <> $2 AND read_at IS NULL
            "#,
        )
        .bind(conversation_id)
        .bind(reader_id)
        .execute(db)
        .await
        .context("mark messages read")?;
        Ok(res.rows_affected())
    }
}
