use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::{
    routes::models::{Booking, BookingsResponse, CreateBookingRequest, ListBookingsQuery},
    services::booking as booking_service,
    ApiError, AppState,
};

#[utoipa::path(
    post,
    path = "/api/rides/{ride_id}/bookings",
    tag = "Bookings",
    security(("bearerAuth" = [])),
    params(("ride_id" = String, Path, description = "Ride public ID")),
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Seats reserved, waiting for the driver", body = Booking),
        (status = 400, description = "Invalid booking request", body = crate::error::ErrorResponse),
        (status = 404, description = "Ride not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Not enough seats, ride inactive or already booked", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_booking(
    State(state): State<AppState>,
    Path(ride_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    let user = state.current_user(&headers).await?;
    let booking =
        booking_service::create_booking(state.db_pool(), user.id, &ride_id, payload).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

#[utoipa::path(
    get,
    path = "/api/rides/{ride_id}/bookings",
    tag = "Bookings",
    security(("bearerAuth" = [])),
    params(
        ("ride_id" = String, Path, description = "Ride public ID"),
        ListBookingsQuery
    ),
    responses(
        (status = 200, description = "Bookings on the ride", body = BookingsResponse),
        (status = 403, description = "Only the driver can list bookings", body = crate::error::ErrorResponse),
        (status = 404, description = "Ride not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_ride_bookings(
    State(state): State<AppState>,
    Path(ride_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<BookingsResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let bookings = booking_service::list_ride_bookings(
        state.db_pool(),
        user.id,
        &ride_id,
        query.status.as_deref(),
    )
    .await?;
    Ok(Json(BookingsResponse { bookings }))
}

#[utoipa::path(
    get,
    path = "/api/bookings",
    tag = "Bookings",
    security(("bearerAuth" = [])),
    params(ListBookingsQuery),
    responses(
        (status = 200, description = "The caller's bookings as a passenger", body = BookingsResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_my_bookings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListBookingsQuery>,
) -> Result<Json<BookingsResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let bookings =
        booking_service::list_passenger_bookings(state.db_pool(), user.id, query.status.as_deref())
            .await?;
    Ok(Json(BookingsResponse { bookings }))
}

#[utoipa::path(
    get,
    path = "/api/bookings/{booking_id}",
    tag = "Bookings",
    security(("bearerAuth" = [])),
    params(("booking_id" = String, Path, description = "Booking public ID")),
    responses(
        (status = 200, description = "Booking", body = Booking),
        (status = 403, description = "Not a participant", body = crate::error::ErrorResponse),
        (status = 404, description = "Booking not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Booking>, ApiError> {
    let user = state.current_user(&headers).await?;
    let booking = booking_service::get_booking(state.db_pool(), user.id, &booking_id).await?;
    Ok(Json(booking))
}

#[utoipa::path(
    post,
    path = "/api/bookings/{booking_id}/confirm",
    tag = "Bookings",
    security(("bearerAuth" = [])),
    params(("booking_id" = String, Path, description = "Booking public ID")),
    responses(
        (status = 200, description = "Booking confirmed", body = Booking),
        (status = 403, description = "Only the driver can confirm", body = crate::error::ErrorResponse),
        (status = 409, description = "Booking is not pending", body = crate::error::ErrorResponse)
    )
)]
pub async fn confirm_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Booking>, ApiError> {
    let user = state.current_user(&headers).await?;
    let booking = booking_service::confirm_booking(state.db_pool(), user.id, &booking_id).await?;
    Ok(Json(booking))
}

#[utoipa::path(
    post,
    path = "/api/bookings/{booking_id}/reject",
    tag = "Bookings",
    security(("bearerAuth" = [])),
    params(("booking_id" = String, Path, description = "Booking public ID")),
    responses(
        (status = 200, description = "Booking rejected and seats released", body = Booking),
        (status = 403, description = "Only the driver can reject", body = crate::error::ErrorResponse),
        (status = 409, description = "Booking is not pending", body = crate::error::ErrorResponse)
    )
)]
pub async fn reject_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Booking>, ApiError> {
    let user = state.current_user(&headers).await?;
    let booking = booking_service::reject_booking(state.db_pool(), user.id, &booking_id).await?;
    Ok(Json(booking))
}

#[utoipa::path(
    post,
    path = "/api/bookings/{booking_id}/cancel",
    tag = "Bookings",
    security(("bearerAuth" = [])),
    params(("booking_id" = String, Path, description = "Booking public ID")),
    responses(
        (status = 200, description = "Booking cancelled and seats released", body = Booking),
        (status = 403, description = "Not a participant", body = crate::error::ErrorResponse),
        (status = 409, description = "Booking or ride is no longer open", body = crate::error::ErrorResponse)
    )
)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Booking>, ApiError> {
    let user = state.current_user(&headers).await?;
    let booking = booking_service::cancel_booking(state.db_pool(), user.id, &booking_id).await?;
    Ok(Json(booking))
}
