use sqlx::{FromRow, SqlitePool};

use super::error::ServiceError;
use crate::routes::models::{Profile, ProfileSummary, PublicProfile, UpdateProfileRequest};
use crate::util::now_timestamp;

const MAX_DISPLAY_NAME_CHARS: usize = 80;
const MAX_BIO_CHARS: usize = 500;
const MAX_NAME_CHARS: usize = 80;
const MAX_PHONE_CHARS: usize = 32;

#[derive(Debug, FromRow)]
struct ProfileRow {
    id: i64,
    public_id: String,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    display_name: Option<String>,
    phone: Option<String>,
    bio: Option<String>,
    avatar_url: Option<String>,
    is_driver: bool,
    created_at: String,
    updated_at: String,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.public_id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            display_name: row.display_name,
            phone: row.phone,
            bio: row.bio,
            avatar_url: row.avatar_url,
            is_driver: row.is_driver,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<ProfileRow> for PublicProfile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.public_id,
            first_name: row.first_name,
            display_name: row.display_name,
            bio: row.bio,
            avatar_url: row.avatar_url,
            is_driver: row.is_driver,
            created_at: row.created_at,
        }
    }
}

const PROFILE_COLUMNS: &str = "id, public_id, email, first_name, last_name, display_name, phone, \
                               bio, avatar_url, is_driver, created_at, updated_at";

async fn fetch_row_by_id(pool: &SqlitePool, profile_id: i64) -> Result<ProfileRow, ServiceError> {
    sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?"
    ))
    .bind(profile_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found("profile not found"))
}

pub async fn get_profile(pool: &SqlitePool, profile_id: i64) -> Result<Profile, ServiceError> {
    fetch_row_by_id(pool, profile_id).await.map(Profile::from)
}

pub async fn get_public_profile(
    pool: &SqlitePool,
    public_id: &str,
) -> Result<PublicProfile, ServiceError> {
    let row = sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {PROFILE_COLUMNS} FROM profiles WHERE public_id = ?"
    ))
    .bind(public_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found("profile not found"))?;

    Ok(row.into())
}

/// Apply a partial update. Absent fields stay as they are and blank strings
/// clear the field.
pub async fn update_profile(
    pool: &SqlitePool,
    profile_id: i64,
    req: UpdateProfileRequest,
) -> Result<Profile, ServiceError> {
    let mut row = fetch_row_by_id(pool, profile_id).await?;

    apply_text(&mut row.first_name, req.first_name, "first_name", MAX_NAME_CHARS)?;
    apply_text(&mut row.last_name, req.last_name, "last_name", MAX_NAME_CHARS)?;
    apply_text(
        &mut row.display_name,
        req.display_name,
        "display_name",
        MAX_DISPLAY_NAME_CHARS,
    )?;
    apply_text(&mut row.phone, req.phone, "phone", MAX_PHONE_CHARS)?;
    apply_text(&mut row.bio, req.bio, "bio", MAX_BIO_CHARS)?;
    apply_text(&mut row.avatar_url, req.avatar_url, "avatar_url", 2048)?;

    row.updated_at = now_timestamp();

    sqlx::query(
        r#"
        UPDATE profiles
        SET first_name = ?, last_name = ?, display_name = ?, phone = ?, bio = ?,
            avatar_url = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&row.first_name)
    .bind(&row.last_name)
    .bind(&row.display_name)
    .bind(&row.phone)
    .bind(&row.bio)
    .bind(&row.avatar_url)
    .bind(&row.updated_at)
    .bind(row.id)
    .execute(pool)
    .await?;

    Ok(row.into())
}

fn apply_text(
    field: &mut Option<String>,
    update: Option<String>,
    name: &str,
    max_chars: usize,
) -> Result<(), ServiceError> {
    let Some(value) = update else {
        return Ok(());
    };

    let value = value.trim();
    if value.chars().count() > max_chars {
        return Err(ServiceError::bad_request(format!(
            "{name} must be at most {max_chars} characters"
        )));
    }

    *field = (!value.is_empty()).then(|| value.to_string());
    Ok(())
}

/// Translate a public profile id into its row id.
pub async fn resolve_profile_id(pool: &SqlitePool, public_id: &str) -> Result<i64, ServiceError> {
    sqlx::query_scalar("SELECT id FROM profiles WHERE public_id = ?")
        .bind(public_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("profile not found"))
}

pub async fn profile_summary(
    pool: &SqlitePool,
    profile_id: i64,
) -> Result<ProfileSummary, ServiceError> {
    let (id, display_name, avatar_url): (String, Option<String>, Option<String>) =
        sqlx::query_as("SELECT public_id, display_name, avatar_url FROM profiles WHERE id = ?")
            .bind(profile_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| ServiceError::not_found("profile not found"))?;

    Ok(ProfileSummary {
        id,
        display_name,
        avatar_url,
    })
}

/// Short label used in notification titles.
pub async fn display_label(pool: &SqlitePool, profile_id: i64) -> Result<String, ServiceError> {
    let summary = profile_summary(pool, profile_id).await?;
    Ok(summary
        .display_name
        .unwrap_or_else(|| "Someone".to_string()))
}
