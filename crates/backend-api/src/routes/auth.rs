use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::{
    routes::models::{
        IdentityCallbackRequest, IdentityLoginQuery, IdentityLoginResponse,
        IdentitySessionRequest, LoginRequest, RegisterRequest, SessionResponse, UserResponse,
    },
    services::auth as auth_service,
    util::require_bearer,
    ApiError, AppState,
};

#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "Auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created and signed in", body = SessionResponse),
        (status = 400, description = "Invalid email or password", body = crate::error::ErrorResponse),
        (status = 409, description = "Email already registered", body = crate::error::ErrorResponse)
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let (session, user) = auth_service::register(state.authenticator(), payload).await?;
    Ok((StatusCode::CREATED, Json(SessionResponse::new(session, user))))
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorResponse)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let (session, user) = auth_service::login(state.authenticator(), payload).await?;
    Ok(Json(SessionResponse::new(session, user)))
}

#[utoipa::path(
    get,
    path = "/api/auth/identity/login",
    tag = "Auth",
    params(IdentityLoginQuery),
    responses(
        (status = 200, description = "Identity provider authorization URL", body = IdentityLoginResponse),
        (status = 503, description = "Identity provider not configured", body = crate::error::ErrorResponse)
    )
)]
pub async fn identity_login(
    State(state): State<AppState>,
    Query(params): Query<IdentityLoginQuery>,
) -> Result<Json<IdentityLoginResponse>, ApiError> {
    let (authorize_url, oauth_state) = auth_service::identity_login_url(
        state.authenticator(),
        state.oauth_state(),
        &params.redirect_uri,
    )
    .await?;

    Ok(Json(IdentityLoginResponse {
        authorize_url,
        state: oauth_state,
    }))
}

#[utoipa::path(
    post,
    path = "/api/auth/identity/callback",
    tag = "Auth",
    request_body = IdentityCallbackRequest,
    responses(
        (status = 200, description = "Identity provider sign-in succeeded", body = SessionResponse),
        (status = 400, description = "Invalid or expired OAuth state", body = crate::error::ErrorResponse),
        (status = 502, description = "Identity provider failed", body = crate::error::ErrorResponse),
        (status = 503, description = "Identity provider not configured", body = crate::error::ErrorResponse)
    )
)]
pub async fn identity_callback(
    State(state): State<AppState>,
    Json(payload): Json<IdentityCallbackRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let (session, user) = auth_service::identity_callback(
        state.authenticator(),
        state.oauth_state(),
        &payload.code,
        &payload.state,
        &payload.redirect_uri,
    )
    .await?;

    Ok(Json(SessionResponse::new(session, user)))
}

#[utoipa::path(
    post,
    path = "/api/auth/identity/session",
    tag = "Auth",
    request_body = IdentitySessionRequest,
    responses(
        (status = 200, description = "Identity session exchanged for a local session", body = SessionResponse),
        (status = 401, description = "Session claims rejected", body = crate::error::ErrorResponse),
        (status = 503, description = "Session claims not configured", body = crate::error::ErrorResponse)
    )
)]
pub async fn identity_session(
    State(state): State<AppState>,
    Json(payload): Json<IdentitySessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let (session, user) =
        auth_service::identity_session(state.authenticator(), &payload.token).await?;
    Ok(Json(SessionResponse::new(session, user)))
}

#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Signed-in user", body = UserResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "Auth",
    security(("bearerAuth" = [])),
    responses(
        (status = 204, description = "Session revoked"),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode, ApiError> {
    let token = require_bearer(&headers)?;
    state.authenticator().revoke_session(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

// Development endpoint to create a test token
#[cfg(debug_assertions)]
#[utoipa::path(
    get,
    path = "/api/auth/dev/token",
    tag = "Auth",
    responses(
        (status = 200, description = "Development session issued", body = SessionResponse),
        (status = 500, description = "Failed to create development session", body = crate::error::ErrorResponse)
    )
)]
pub async fn dev_token(State(state): State<AppState>) -> Result<Json<SessionResponse>, ApiError> {
    let (session, user) = auth_service::create_dev_token(state.authenticator())
        .await
        .map_err(|e| {
            tracing::error!("Failed to create dev token: {:?}", e);
            ApiError::from(e)
        })?;

    Ok(Json(SessionResponse::new(session, user)))
}
