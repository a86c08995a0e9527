use sqlx::{FromRow, SqliteConnection, SqlitePool};

use super::error::ServiceError;
use crate::routes::models::Notification;
use crate::util::now_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    BookingRequested,
    BookingConfirmed,
    BookingRejected,
    BookingCancelled,
    RideCancelled,
    RideCompleted,
    NewMessage,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BookingRequested => "booking_requested",
            Self::BookingConfirmed => "booking_confirmed",
            Self::BookingRejected => "booking_rejected",
            Self::BookingCancelled => "booking_cancelled",
            Self::RideCancelled => "ride_cancelled",
            Self::RideCompleted => "ride_completed",
            Self::NewMessage => "new_message",
        }
    }
}

#[derive(Debug)]
pub struct NewNotification<'a> {
    pub profile_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub ride_id: Option<&'a str>,
    pub booking_id: Option<&'a str>,
}

#[derive(Debug, FromRow)]
struct NotificationRow {
    public_id: String,
    kind: String,
    title: String,
    body: String,
    read: bool,
    ride_id: Option<String>,
    booking_id: Option<String>,
    created_at: String,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.public_id,
            kind: row.kind,
            title: row.title,
            body: row.body,
            read: row.read,
            ride_id: row.ride_id,
            booking_id: row.booking_id,
            created_at: row.created_at,
        }
    }
}

const NOTIFICATION_COLUMNS: &str =
    "public_id, type AS kind, title, body, read, ride_id, booking_id, created_at";

pub async fn list_notifications(
    pool: &SqlitePool,
    profile_id: i64,
    unread_only: bool,
    limit: i64,
    offset: i64,
) -> Result<Vec<Notification>, ServiceError> {
    let rows = sqlx::query_as::<_, NotificationRow>(&format!(
        r#"
        SELECT {NOTIFICATION_COLUMNS}
        FROM notifications
        WHERE profile_id = ? AND (? = 0 OR read = 0)
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#
    ))
    .bind(profile_id)
    .bind(unread_only)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Notification::from).collect())
}

pub async fn unread_count(pool: &SqlitePool, profile_id: i64) -> Result<i64, ServiceError> {
    let count =
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE profile_id = ? AND read = 0")
            .bind(profile_id)
            .fetch_one(pool)
            .await?;

    Ok(count)
}

pub async fn mark_notification_read(
    pool: &SqlitePool,
    profile_id: i64,
    notification_id: &str,
    read: bool,
) -> Result<Notification, ServiceError> {
    let result =
        sqlx::query("UPDATE notifications SET read = ? WHERE public_id = ? AND profile_id = ?")
            .bind(read)
            .bind(notification_id)
            .bind(profile_id)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::not_found("notification not found"));
    }

    let row = sqlx::query_as::<_, NotificationRow>(&format!(
        "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE public_id = ?"
    ))
    .bind(notification_id)
    .fetch_one(pool)
    .await?;

    Ok(row.into())
}

pub async fn mark_all_read(pool: &SqlitePool, profile_id: i64) -> Result<u64, ServiceError> {
    let result =
        sqlx::query("UPDATE notifications SET read = 1 WHERE profile_id = ? AND read = 0")
            .bind(profile_id)
            .execute(pool)
            .await?;

    Ok(result.rows_affected())
}

pub async fn delete_notification(
    pool: &SqlitePool,
    profile_id: i64,
    notification_id: &str,
) -> Result<(), ServiceError> {
    let result = sqlx::query("DELETE FROM notifications WHERE public_id = ? AND profile_id = ?")
        .bind(notification_id)
        .bind(profile_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ServiceError::not_found("notification not found"));
    }

    Ok(())
}

/// Insert a notification on the caller's connection so it commits together
/// with the change that triggered it.
pub async fn create_notification(
    conn: &mut SqliteConnection,
    notification: NewNotification<'_>,
) -> Result<String, ServiceError> {
    let public_id = carpool_auth::new_public_id();

    sqlx::query(
        r#"
        INSERT INTO notifications (public_id, profile_id, type, title, body, read, ride_id, booking_id, created_at)
        VALUES (?, ?, ?, ?, ?, 0, ?, ?, ?)
        "#,
    )
    .bind(&public_id)
    .bind(notification.profile_id)
    .bind(notification.kind.as_str())
    .bind(&notification.title)
    .bind(&notification.body)
    .bind(notification.ride_id)
    .bind(notification.booking_id)
    .bind(now_timestamp())
    .execute(&mut *conn)
    .await?;

    Ok(public_id)
}
