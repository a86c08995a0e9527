use axum::{extract::State, http::HeaderMap, Json};

use crate::{
    routes::models::{Impact, ImpactSummary},
    services::impact as impact_service,
    ApiError, AppState,
};

#[utoipa::path(
    get,
    path = "/api/impact/me",
    tag = "Impact",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "The caller's recorded impact", body = Impact),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn my_impact(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Impact>, ApiError> {
    let user = state.current_user(&headers).await?;
    let impact = impact_service::get_impact(state.db_pool(), user.id).await?;
    Ok(Json(impact))
}

#[utoipa::path(
    get,
    path = "/api/impact/summary",
    tag = "Impact",
    responses(
        (status = 200, description = "Community totals", body = ImpactSummary)
    )
)]
pub async fn impact_summary(State(state): State<AppState>) -> Result<Json<ImpactSummary>, ApiError> {
    let summary = impact_service::get_summary(state.db_pool()).await?;
    Ok(Json(summary))
}
