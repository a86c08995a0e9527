use argon2::password_hash::{
    rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
};
use argon2::Argon2;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use carpool_config::AuthConfig;
use chrono::{DateTime, Duration, Utc};
use cuid2::CuidConstructor;
use once_cell::sync::Lazy;
use rand::RngCore;
use serde::Serialize;
use sqlx::{Row, SqlitePool, Transaction};
use thiserror::Error;
use tracing::{debug, info, warn};

mod claims;
mod oauth;

pub use claims::SessionClaims;

use claims::ClaimsVerifier;
use oauth::IdentityOAuth;

const PASSWORD_PROVIDER: &str = "password";
const IDENTITY_PROVIDER: &str = "identity";

static CUID: Lazy<CuidConstructor> = Lazy::new(CuidConstructor::new);

#[derive(Clone)]
pub struct Authenticator {
    pool: SqlitePool,
    session_ttl: Duration,
    identity: Option<IdentityOAuth>,
    claims: Option<ClaimsVerifier>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("user already exists")]
    UserExists,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("identity provider sign-in is not configured")]
    IdentityProviderDisabled,
    #[error("identity provider error: {0}")]
    IdentityProvider(#[from] anyhow::Error),
    #[error("identity provider session tokens are not accepted")]
    ClaimsDisabled,
    #[error("invalid identity provider session token: {0}")]
    InvalidClaims(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("password hashing failed: {0}")]
    PasswordHash(#[from] argon2::password_hash::Error),
    #[error("session not found")]
    SessionNotFound,
    #[error("session expired")]
    SessionExpired,
    #[error("invalid session token")]
    InvalidSession,
}

/// The signed-in profile as seen by the authentication layer.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    #[serde(skip_serializing)]
    pub id: i64,
    pub public_id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthSession {
    pub token: String,
    pub user_id: i64,
    pub expires_at: DateTime<Utc>,
}

/// Identity attributes asserted by the identity provider.
#[derive(Debug, Clone, Default)]
pub struct IdentityProfile {
    pub subject: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl Authenticator {
    pub fn new(pool: SqlitePool, config: AuthConfig) -> Self {
        let ttl_seconds = i64::try_from(config.session_ttl_seconds).unwrap_or(i64::MAX);
        let session_ttl = Duration::try_seconds(ttl_seconds).unwrap_or_else(|| Duration::days(36_500));

        let identity = match IdentityOAuth::from_config(&config.identity) {
            Ok(identity) => identity,
            Err(error) => {
                warn!(error = %format!("{error:#}"), "identity provider configuration rejected");
                None
            }
        };
        let claims = ClaimsVerifier::from_config(&config.claims);

        Self {
            pool,
            session_ttl,
            identity,
            claims,
        }
    }

    pub fn pool(&self) -> SqlitePool {
        self.pool.clone()
    }

    pub fn identity_enabled(&self) -> bool {
        self.identity.is_some()
    }

    pub fn session_claims_enabled(&self) -> bool {
        self.claims.is_some()
    }

    pub fn identity_authorization_url(
        &self,
        state: &str,
        redirect_uri: &str,
    ) -> Result<String, AuthError> {
        let identity = self
            .identity
            .as_ref()
            .ok_or(AuthError::IdentityProviderDisabled)?;
        identity
            .authorize_url(state, redirect_uri)
            .map_err(AuthError::IdentityProvider)
    }

    pub async fn register_with_password(
        &self,
        email: &str,
        password: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<User, AuthError> {
        let email = normalize_email(email);
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT id FROM profiles WHERE email = ?")
            .bind(&email)
            .fetch_optional(&mut *tx)
            .await?;

        if existing.is_some() {
            return Err(AuthError::UserExists);
        }

        let password_hash = self.hash_password(password)?;

        let profile = IdentityProfile {
            subject: email.clone(),
            email: Some(email.clone()),
            first_name: first_name.map(str::to_owned),
            last_name: last_name.map(str::to_owned),
            display_name: None,
            avatar_url: None,
        };
        let user = self.insert_profile(&mut tx, &profile).await?;
        insert_identity(&mut tx, user.id, PASSWORD_PROVIDER, &email, Some(&password_hash)).await?;

        tx.commit().await?;

        info!(user = %user.public_id, "registered password account");
        Ok(user)
    }

    pub async fn login_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, AuthError> {
        let email = normalize_email(email);
        let identity = sqlx::query(
            "SELECT profile_id, secret FROM identities WHERE provider = ? AND provider_uid = ?",
        )
        .bind(PASSWORD_PROVIDER)
        .bind(&email)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = identity else {
            return Err(AuthError::InvalidCredentials);
        };

        let secret: Option<String> = row.try_get("secret")?;
        let secret = secret.ok_or(AuthError::InvalidCredentials)?;
        let stored_hash = PasswordHash::new(&secret)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &stored_hash)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let profile_id: i64 = row.try_get("profile_id")?;
        self.fetch_user(profile_id).await?;

        self.issue_session(profile_id).await
    }

    pub async fn login_with_identity_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AuthSession, AuthError> {
        let identity = self
            .identity
            .as_ref()
            .ok_or(AuthError::IdentityProviderDisabled)?;

        let profile = identity
            .exchange_code(code, redirect_uri)
            .await
            .map_err(AuthError::IdentityProvider)?;

        self.login_with_identity_profile(profile).await
    }

    /// Exchange an identity-provider session token for a local session.
    pub async fn login_with_session_claims(&self, token: &str) -> Result<AuthSession, AuthError> {
        let verifier = self.claims.as_ref().ok_or(AuthError::ClaimsDisabled)?;
        let claims = verifier
            .verify(token)
            .map_err(|error| AuthError::InvalidClaims(error.to_string()))?;

        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidClaims("missing subject".into()));
        }

        self.login_with_identity_profile(claims.into()).await
    }

    /// Sign in an identity-provider subject, linking or creating its profile.
    ///
    /// A known subject signs straight in. An unknown subject whose email
    /// matches an existing profile is linked to it; otherwise a new profile
    /// is created from the asserted attributes.
    pub async fn login_with_identity_profile(
        &self,
        profile: IdentityProfile,
    ) -> Result<AuthSession, AuthError> {
        let mut tx = self.pool.begin().await?;

        if let Some(row) =
            sqlx::query("SELECT profile_id FROM identities WHERE provider = ? AND provider_uid = ?")
                .bind(IDENTITY_PROVIDER)
                .bind(&profile.subject)
                .fetch_optional(&mut *tx)
                .await?
        {
            let profile_id: i64 = row.try_get("profile_id")?;
            tx.commit().await?;
            return self.issue_session(profile_id).await;
        }

        let email = profile.email.as_deref().map(normalize_email);
        let linked = match email.as_deref() {
            Some(email) => sqlx::query("SELECT id FROM profiles WHERE email = ?")
                .bind(email)
                .fetch_optional(&mut *tx)
                .await?
                .map(|row| row.try_get::<i64, _>("id"))
                .transpose()?,
            None => None,
        };

        let profile_id = match linked {
            Some(id) => id,
            None => {
                let normalized = IdentityProfile {
                    email: email.clone(),
                    ..profile.clone()
                };
                self.insert_profile(&mut tx, &normalized).await?.id
            }
        };

        insert_identity(&mut tx, profile_id, IDENTITY_PROVIDER, &profile.subject, None).await?;
        tx.commit().await?;

        info!(profile_id, email = ?email, linked = linked.is_some(), "linked identity provider subject");
        self.issue_session(profile_id).await
    }

    pub async fn authenticate_token(&self, token: &str) -> Result<(User, AuthSession), AuthError> {
        if token.is_empty() {
            return Err(AuthError::InvalidSession);
        }

        let row = sqlx::query("SELECT profile_id, expires_at FROM sessions WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Err(AuthError::SessionNotFound);
        };

        let profile_id: i64 = row.try_get("profile_id")?;
        let expires_at: String = row.try_get("expires_at")?;

        let expires_at = DateTime::parse_from_rfc3339(&expires_at)
            .map_err(|_| AuthError::InvalidSession)?
            .with_timezone(&Utc);

        if expires_at <= Utc::now() {
            sqlx::query("DELETE FROM sessions WHERE token = ?")
                .bind(token)
                .execute(&self.pool)
                .await?;
            debug!(profile_id, "expired session removed");
            return Err(AuthError::SessionExpired);
        }

        let user = self.fetch_user(profile_id).await?;
        let session = AuthSession {
            token: token.to_owned(),
            user_id: profile_id,
            expires_at,
        };

        Ok((user, session))
    }

    pub async fn revoke_session(&self, token: &str) -> Result<(), AuthError> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AuthError::SessionNotFound);
        }
        Ok(())
    }

    /// Mint a session for an existing profile without any credential check.
    pub async fn create_session(&self, profile_id: i64) -> Result<AuthSession, AuthError> {
        self.fetch_user(profile_id).await?;
        self.issue_session(profile_id).await
    }

    pub async fn user_profile(&self, profile_id: i64) -> Result<User, AuthError> {
        self.fetch_user(profile_id).await
    }

    async fn insert_profile(
        &self,
        tx: &mut Transaction<'_, sqlx::Sqlite>,
        profile: &IdentityProfile,
    ) -> Result<User, AuthError> {
        let now = Utc::now().to_rfc3339();
        let public_id = new_public_id();
        let display_name = profile
            .display_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| compose_display_name(profile.first_name.as_deref(), profile.last_name.as_deref()));

        let id = sqlx::query(
            "INSERT INTO profiles (public_id, email, first_name, last_name, display_name, avatar_url, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(profile.email.as_deref())
        .bind(profile.first_name.as_deref())
        .bind(profile.last_name.as_deref())
        .bind(display_name.as_deref())
        .bind(profile.avatar_url.as_deref())
        .bind(&now)
        .bind(&now)
        .execute(&mut **tx)
        .await?
        .last_insert_rowid();

        Ok(User {
            id,
            public_id,
            email: profile.email.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            display_name,
        })
    }

    async fn fetch_user(&self, id: i64) -> Result<User, AuthError> {
        let row = sqlx::query(
            "SELECT id, public_id, email, first_name, last_name, display_name FROM profiles WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AuthError::InvalidSession)?;

        Ok(User {
            id,
            public_id: row.try_get("public_id")?,
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            display_name: row.try_get("display_name")?,
        })
    }

    async fn issue_session(&self, profile_id: i64) -> Result<AuthSession, AuthError> {
        let token = generate_session_token();
        let now = Utc::now();
        let expires_at = now + self.session_ttl;

        sqlx::query(
            "INSERT INTO sessions (profile_id, token, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(profile_id)
        .bind(&token)
        .bind(now.to_rfc3339())
        .bind(expires_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(AuthSession {
            token,
            user_id: profile_id,
            expires_at,
        })
    }

    fn hash_password(&self, password: &str) -> Result<String, argon2::password_hash::Error> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default().hash_password(password.as_bytes(), &salt)?;
        Ok(hash.to_string())
    }
}

async fn insert_identity(
    tx: &mut Transaction<'_, sqlx::Sqlite>,
    profile_id: i64,
    provider: &str,
    provider_uid: &str,
    secret: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO identities (profile_id, provider, provider_uid, secret, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(profile_id)
    .bind(provider)
    .bind(provider_uid)
    .bind(secret)
    .bind(Utc::now().to_rfc3339())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn compose_display_name(first: Option<&str>, last: Option<&str>) -> Option<String> {
    let joined = [first, last]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!joined.is_empty()).then_some(joined)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

pub fn new_public_id() -> String {
    CUID.create_id()
}
