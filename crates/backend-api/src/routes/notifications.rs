use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::{
    routes::models::{
        ListNotificationsQuery, MarkNotificationReadRequest, MarkedReadResponse,
        NotificationResponse, NotificationsResponse, UnreadCountResponse,
    },
    services::notification as notification_service,
    util::page,
    ApiError, AppState,
};

#[utoipa::path(
    get,
    path = "/api/notifications",
    tag = "Notifications",
    security(("bearerAuth" = [])),
    params(ListNotificationsQuery),
    responses(
        (status = 200, description = "Notifications, newest first", body = NotificationsResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_notifications(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListNotificationsQuery>,
) -> Result<Json<NotificationsResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let (limit, offset) = page(query.limit, query.offset);
    let notifications = notification_service::list_notifications(
        state.db_pool(),
        user.id,
        query.unread_only.unwrap_or(false),
        limit,
        offset,
    )
    .await?;
    Ok(Json(NotificationsResponse { notifications }))
}

#[utoipa::path(
    get,
    path = "/api/notifications/unread-count",
    tag = "Notifications",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Unread notifications", body = UnreadCountResponse)
    )
)]
pub async fn unread_count(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let unread_count = notification_service::unread_count(state.db_pool(), user.id).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

#[utoipa::path(
    put,
    path = "/api/notifications/{notification_id}/read",
    tag = "Notifications",
    security(("bearerAuth" = [])),
    params(("notification_id" = String, Path, description = "Notification public ID")),
    request_body = MarkNotificationReadRequest,
    responses(
        (status = 200, description = "Notification updated", body = NotificationResponse),
        (status = 404, description = "Notification not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<MarkNotificationReadRequest>,
) -> Result<Json<NotificationResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let notification = notification_service::mark_notification_read(
        state.db_pool(),
        user.id,
        &notification_id,
        payload.read,
    )
    .await?;
    Ok(Json(NotificationResponse { notification }))
}

#[utoipa::path(
    post,
    path = "/api/notifications/read-all",
    tag = "Notifications",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Number of notifications marked read", body = MarkedReadResponse)
    )
)]
pub async fn mark_all_read(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MarkedReadResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let updated = notification_service::mark_all_read(state.db_pool(), user.id).await?;
    Ok(Json(MarkedReadResponse { updated }))
}

#[utoipa::path(
    delete,
    path = "/api/notifications/{notification_id}",
    tag = "Notifications",
    security(("bearerAuth" = [])),
    params(("notification_id" = String, Path, description = "Notification public ID")),
    responses(
        (status = 204, description = "Notification deleted"),
        (status = 404, description = "Notification not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(notification_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let user = state.current_user(&headers).await?;
    notification_service::delete_notification(state.db_pool(), user.id, &notification_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
