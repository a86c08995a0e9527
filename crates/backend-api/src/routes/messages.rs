use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::{
    routes::models::{
        ConversationsResponse, MarkedReadResponse, Message, MessagesResponse, PageQuery,
        SendMessageRequest, UnreadCountResponse,
    },
    services::message as message_service,
    util::page,
    ApiError, AppState,
};

#[utoipa::path(
    post,
    path = "/api/messages",
    tag = "Messages",
    security(("bearerAuth" = [])),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message sent", body = Message),
        (status = 400, description = "Empty, oversized or self-addressed message", body = crate::error::ErrorResponse),
        (status = 404, description = "Recipient or ride not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn send_message(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let user = state.current_user(&headers).await?;
    let message = message_service::send_message(state.db_pool(), user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

#[utoipa::path(
    get,
    path = "/api/messages",
    tag = "Messages",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Latest message per counterpart", body = ConversationsResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_conversations(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ConversationsResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let conversations = message_service::list_conversations(state.db_pool(), user.id).await?;
    Ok(Json(ConversationsResponse { conversations }))
}

#[utoipa::path(
    get,
    path = "/api/messages/unread-count",
    tag = "Messages",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Unread direct messages", body = UnreadCountResponse)
    )
)]
pub async fn unread_count(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UnreadCountResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let unread_count = message_service::unread_count(state.db_pool(), user.id).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

#[utoipa::path(
    get,
    path = "/api/messages/{profile_id}",
    tag = "Messages",
    security(("bearerAuth" = [])),
    params(
        ("profile_id" = String, Path, description = "Counterpart profile public ID"),
        PageQuery
    ),
    responses(
        (status = 200, description = "Thread with the counterpart, oldest first", body = MessagesResponse),
        (status = 404, description = "Profile not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_thread(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Result<Json<MessagesResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let (limit, offset) = page(query.limit, query.offset);
    let messages =
        message_service::list_thread(state.db_pool(), user.id, &profile_id, limit, offset)
            .await?;
    Ok(Json(MessagesResponse { messages }))
}

#[utoipa::path(
    post,
    path = "/api/messages/{profile_id}/read",
    tag = "Messages",
    security(("bearerAuth" = [])),
    params(("profile_id" = String, Path, description = "Counterpart profile public ID")),
    responses(
        (status = 200, description = "Number of messages marked read", body = MarkedReadResponse),
        (status = 404, description = "Profile not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn mark_thread_read(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<MarkedReadResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let updated = message_service::mark_thread_read(state.db_pool(), user.id, &profile_id).await?;
    Ok(Json(MarkedReadResponse { updated }))
}
