use carpool_auth::{AuthSession, Authenticator, User};

use super::error::ServiceError;
use crate::routes::models::{LoginRequest, RegisterRequest};
use crate::state::OAuthStateStore;
use crate::util::non_blank;

const MIN_PASSWORD_CHARS: usize = 8;

pub async fn register(
    authenticator: &Authenticator,
    req: RegisterRequest,
) -> Result<(AuthSession, User), ServiceError> {
    let email = req.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ServiceError::bad_request("a valid email address is required"));
    }
    if req.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ServiceError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_CHARS} characters"
        )));
    }

    let first_name = non_blank(req.first_name.as_deref());
    let last_name = non_blank(req.last_name.as_deref());
    let user = authenticator
        .register_with_password(
            email,
            &req.password,
            first_name.as_deref(),
            last_name.as_deref(),
        )
        .await?;
    let session = authenticator.create_session(user.id).await?;

    Ok((session, user))
}

pub async fn login(
    authenticator: &Authenticator,
    req: LoginRequest,
) -> Result<(AuthSession, User), ServiceError> {
    let session = authenticator
        .login_with_password(&req.email, &req.password)
        .await?;
    let user = authenticator.user_profile(session.user_id).await?;

    Ok((session, user))
}

/// Start an identity-provider login. Returns the authorization URL and the
/// single-use state it carries.
pub async fn identity_login_url(
    authenticator: &Authenticator,
    oauth_state: &OAuthStateStore,
    redirect_uri: &str,
) -> Result<(String, String), ServiceError> {
    if !authenticator.identity_enabled() {
        return Err(carpool_auth::AuthError::IdentityProviderDisabled.into());
    }
    if redirect_uri.trim().is_empty() {
        return Err(ServiceError::bad_request("redirect_uri is required"));
    }

    let state = oauth_state.issue().await;
    let authorize_url = authenticator.identity_authorization_url(&state, redirect_uri)?;

    Ok((authorize_url, state))
}

pub async fn identity_callback(
    authenticator: &Authenticator,
    oauth_state: &OAuthStateStore,
    code: &str,
    state: &str,
    redirect_uri: &str,
) -> Result<(AuthSession, User), ServiceError> {
    if !oauth_state.consume(state).await {
        return Err(ServiceError::bad_request("invalid or expired OAuth state"));
    }

    let session = authenticator
        .login_with_identity_code(code, redirect_uri)
        .await?;
    let user = authenticator.user_profile(session.user_id).await?;

    Ok((session, user))
}

pub async fn identity_session(
    authenticator: &Authenticator,
    token: &str,
) -> Result<(AuthSession, User), ServiceError> {
    if token.trim().is_empty() {
        return Err(ServiceError::bad_request("token is required"));
    }

    let session = authenticator.login_with_session_claims(token.trim()).await?;
    let user = authenticator.user_profile(session.user_id).await?;

    Ok((session, user))
}

/// Sign in a fixed development profile.
#[cfg(debug_assertions)]
pub async fn create_dev_token(
    authenticator: &Authenticator,
) -> Result<(AuthSession, User), ServiceError> {
    let session = authenticator
        .login_with_identity_profile(carpool_auth::IdentityProfile {
            subject: "dev-user".to_string(),
            email: Some("dev@carpool.local".to_string()),
            first_name: Some("Dev".to_string()),
            last_name: Some("User".to_string()),
            display_name: Some("Dev User".to_string()),
            avatar_url: None,
        })
        .await?;
    let user = authenticator.user_profile(session.user_id).await?;

    Ok((session, user))
}
