use sqlx::{FromRow, SqlitePool};
use tracing::info;

use super::error::ServiceError;
use super::notification::{create_notification, NewNotification, NotificationKind};
use super::profile::{display_label, resolve_profile_id};
use crate::routes::models::{Conversation, Message, ProfileSummary, SendMessageRequest};
use crate::util::now_timestamp;

pub const MAX_MESSAGE_CHARS: usize = 2000;
const PREVIEW_CHARS: usize = 120;

const MESSAGE_SELECT: &str = r#"
SELECT m.public_id, s.public_id AS sender_id, t.public_id AS recipient_id,
       r.public_id AS ride_id, m.content, m.is_read, m.created_at
FROM messages m
JOIN profiles s ON s.id = m.sender_id
JOIN profiles t ON t.id = m.recipient_id
LEFT JOIN rides r ON r.id = m.ride_id
"#;

#[derive(Debug, FromRow)]
struct MessageRow {
    public_id: String,
    sender_id: String,
    recipient_id: String,
    ride_id: Option<String>,
    content: String,
    is_read: bool,
    created_at: String,
}

impl From<MessageRow> for Message {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.public_id,
            sender_id: row.sender_id,
            recipient_id: row.recipient_id,
            ride_id: row.ride_id,
            content: row.content,
            is_read: row.is_read,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ConversationRow {
    counterpart_public_id: String,
    counterpart_display_name: Option<String>,
    counterpart_avatar_url: Option<String>,
    last_message: String,
    last_message_at: String,
    last_sender_id: String,
    unread_count: i64,
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        Self {
            counterpart: ProfileSummary {
                id: row.counterpart_public_id,
                display_name: row.counterpart_display_name,
                avatar_url: row.counterpart_avatar_url,
            },
            last_message: row.last_message,
            last_message_at: row.last_message_at,
            last_sender_id: row.last_sender_id,
            unread_count: row.unread_count,
        }
    }
}

pub async fn send_message(
    pool: &SqlitePool,
    sender_id: i64,
    req: SendMessageRequest,
) -> Result<Message, ServiceError> {
    let content = req.content.trim();
    if content.is_empty() {
        return Err(ServiceError::bad_request("content must not be empty"));
    }
    if content.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ServiceError::bad_request(format!(
            "content must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }

    let recipient_id = resolve_profile_id(pool, req.recipient_id.trim()).await?;
    if recipient_id == sender_id {
        return Err(ServiceError::bad_request("cannot send a message to yourself"));
    }

    let ride_id: Option<i64> = match req.ride_id.as_deref() {
        Some(ride_id) => Some(
            sqlx::query_scalar("SELECT id FROM rides WHERE public_id = ?")
                .bind(ride_id)
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| ServiceError::not_found("ride not found"))?,
        ),
        None => None,
    };

    let sender_name = display_label(pool, sender_id).await?;
    let public_id = carpool_auth::new_public_id();

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO messages (public_id, sender_id, recipient_id, ride_id, content, is_read, created_at)
        VALUES (?, ?, ?, ?, ?, 0, ?)
        "#,
    )
    .bind(&public_id)
    .bind(sender_id)
    .bind(recipient_id)
    .bind(ride_id)
    .bind(content)
    .bind(now_timestamp())
    .execute(&mut *tx)
    .await?;

    create_notification(
        &mut tx,
        NewNotification {
            profile_id: recipient_id,
            kind: NotificationKind::NewMessage,
            title: format!("New message from {sender_name}"),
            body: preview(content),
            ride_id: req.ride_id.as_deref(),
            booking_id: None,
        },
    )
    .await?;

    tx.commit().await?;

    info!(message = %public_id, sender_id, recipient_id, "message sent");

    let row = sqlx::query_as::<_, MessageRow>(&format!("{MESSAGE_SELECT} WHERE m.public_id = ?"))
        .bind(&public_id)
        .fetch_one(pool)
        .await?;
    Ok(row.into())
}

/// One entry per counterpart, newest conversation first.
pub async fn list_conversations(
    pool: &SqlitePool,
    profile_id: i64,
) -> Result<Vec<Conversation>, ServiceError> {
    let rows = sqlx::query_as::<_, ConversationRow>(
        r#"
        WITH involved AS (
            SELECT m.id, m.sender_id, m.content, m.created_at,
                   CASE WHEN m.sender_id = ?1 THEN m.recipient_id ELSE m.sender_id END AS counterpart_id
            FROM messages m
            WHERE m.sender_id = ?1 OR m.recipient_id = ?1
        ),
        ranked AS (
            SELECT involved.*,
                   ROW_NUMBER() OVER (
                       PARTITION BY counterpart_id ORDER BY created_at DESC, id DESC
                   ) AS position
            FROM involved
        )
        SELECT c.public_id AS counterpart_public_id,
               c.display_name AS counterpart_display_name,
               c.avatar_url AS counterpart_avatar_url,
               ranked.content AS last_message,
               ranked.created_at AS last_message_at,
               s.public_id AS last_sender_id,
               (SELECT COUNT(*) FROM messages u
                WHERE u.sender_id = ranked.counterpart_id AND u.recipient_id = ?1 AND u.is_read = 0
               ) AS unread_count
        FROM ranked
        JOIN profiles c ON c.id = ranked.counterpart_id
        JOIN profiles s ON s.id = ranked.sender_id
        WHERE ranked.position = 1
        ORDER BY ranked.created_at DESC, ranked.id DESC
        "#,
    )
    .bind(profile_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Conversation::from).collect())
}

/// Messages exchanged with one counterpart, oldest first.
pub async fn list_thread(
    pool: &SqlitePool,
    profile_id: i64,
    counterpart_public_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<Message>, ServiceError> {
    let counterpart_id = resolve_profile_id(pool, counterpart_public_id).await?;

    let rows = sqlx::query_as::<_, MessageRow>(&format!(
        r#"
        {MESSAGE_SELECT}
        WHERE (m.sender_id = ?1 AND m.recipient_id = ?2)
           OR (m.sender_id = ?2 AND m.recipient_id = ?1)
        ORDER BY m.created_at ASC, m.id ASC
        LIMIT ?3 OFFSET ?4
        "#
    ))
    .bind(profile_id)
    .bind(counterpart_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Message::from).collect())
}

pub async fn mark_thread_read(
    pool: &SqlitePool,
    profile_id: i64,
    counterpart_public_id: &str,
) -> Result<u64, ServiceError> {
    let counterpart_id = resolve_profile_id(pool, counterpart_public_id).await?;

    let result = sqlx::query(
        "UPDATE messages SET is_read = 1 WHERE sender_id = ? AND recipient_id = ? AND is_read = 0",
    )
    .bind(counterpart_id)
    .bind(profile_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn unread_count(pool: &SqlitePool, profile_id: i64) -> Result<i64, ServiceError> {
    let count =
        sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE recipient_id = ? AND is_read = 0")
            .bind(profile_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

fn preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_CHARS {
        return content.to_string();
    }
    let mut short: String = content.chars().take(PREVIEW_CHARS).collect();
    short.push('…');
    short
}
