use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};

use crate::{
    routes::models::{Profile, PublicProfile, UpdateProfileRequest},
    services::profile as profile_service,
    ApiError, AppState,
};

#[utoipa::path(
    get,
    path = "/api/profiles/me",
    tag = "Profiles",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Signed-in profile", body = Profile),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_my_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Profile>, ApiError> {
    let user = state.current_user(&headers).await?;
    let profile = profile_service::get_profile(state.db_pool(), user.id).await?;
    Ok(Json(profile))
}

#[utoipa::path(
    put,
    path = "/api/profiles/me",
    tag = "Profiles",
    security(("bearerAuth" = [])),
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Updated profile", body = Profile),
        (status = 400, description = "Invalid profile payload", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_my_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<Profile>, ApiError> {
    let user = state.current_user(&headers).await?;
    let profile = profile_service::update_profile(state.db_pool(), user.id, payload).await?;
    Ok(Json(profile))
}

#[utoipa::path(
    get,
    path = "/api/profiles/{profile_id}",
    tag = "Profiles",
    security(("bearerAuth" = [])),
    params(("profile_id" = String, Path, description = "Profile public ID")),
    responses(
        (status = 200, description = "Public profile", body = PublicProfile),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 404, description = "Profile not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<PublicProfile>, ApiError> {
    state.current_user(&headers).await?;
    let profile = profile_service::get_public_profile(state.db_pool(), &profile_id).await?;
    Ok(Json(profile))
}
