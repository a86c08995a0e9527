use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::{
    routes::models::{
        CreateRideRequest, DriverRidesQuery, ListRidesQuery, RideDetail, RidesResponse,
        SearchRidesQuery, SearchRidesResponse, SegmentsResponse, UpdateRideRequest,
    },
    services::{ride as ride_service, search as search_service},
    ApiError, AppState,
};

#[utoipa::path(
    post,
    path = "/api/rides",
    tag = "Rides",
    security(("bearerAuth" = [])),
    request_body = CreateRideRequest,
    responses(
        (status = 201, description = "Ride offered", body = RideDetail),
        (status = 400, description = "Invalid ride payload", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse),
        (status = 403, description = "Vehicle belongs to another member", body = crate::error::ErrorResponse),
        (status = 502, description = "Maps provider failed", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_ride(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateRideRequest>,
) -> Result<(StatusCode, Json<RideDetail>), ApiError> {
    let user = state.current_user(&headers).await?;
    let ride =
        ride_service::create_ride(state.db_pool(), state.maps(), user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(ride)))
}

#[utoipa::path(
    get,
    path = "/api/rides",
    tag = "Rides",
    params(ListRidesQuery),
    responses(
        (status = 200, description = "Upcoming rides with free seats", body = RidesResponse),
        (status = 400, description = "Invalid filter", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_rides(
    State(state): State<AppState>,
    Query(query): Query<ListRidesQuery>,
) -> Result<Json<RidesResponse>, ApiError> {
    let rides = ride_service::list_rides(state.db_pool(), query).await?;
    Ok(Json(RidesResponse { rides }))
}

#[utoipa::path(
    get,
    path = "/api/rides/search",
    tag = "Rides",
    security(("bearerAuth" = [])),
    params(SearchRidesQuery),
    responses(
        (status = 200, description = "Rides passing the rider's origin and destination", body = SearchRidesResponse),
        (status = 400, description = "Invalid search", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn search_rides(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<SearchRidesQuery>,
) -> Result<Json<SearchRidesResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let results =
        search_service::search_rides(state.db_pool(), state.matching(), user.id, query).await?;
    Ok(Json(SearchRidesResponse { results }))
}

#[utoipa::path(
    get,
    path = "/api/rides/driver/{profile_id}",
    tag = "Rides",
    params(
        ("profile_id" = String, Path, description = "Driver profile public ID"),
        DriverRidesQuery
    ),
    responses(
        (status = 200, description = "Rides offered by the driver", body = RidesResponse),
        (status = 404, description = "Driver not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_driver_rides(
    State(state): State<AppState>,
    Path(profile_id): Path<String>,
    Query(query): Query<DriverRidesQuery>,
) -> Result<Json<RidesResponse>, ApiError> {
    let rides = ride_service::list_driver_rides(state.db_pool(), &profile_id, query).await?;
    Ok(Json(RidesResponse { rides }))
}

#[utoipa::path(
    get,
    path = "/api/rides/{ride_id}",
    tag = "Rides",
    params(("ride_id" = String, Path, description = "Ride public ID")),
    responses(
        (status = 200, description = "Ride with its route segments", body = RideDetail),
        (status = 404, description = "Ride not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<String>,
) -> Result<Json<RideDetail>, ApiError> {
    let ride = ride_service::get_ride_detail(state.db_pool(), &ride_id).await?;
    Ok(Json(ride))
}

#[utoipa::path(
    get,
    path = "/api/rides/{ride_id}/segments",
    tag = "Rides",
    params(("ride_id" = String, Path, description = "Ride public ID")),
    responses(
        (status = 200, description = "Route segments in travel order", body = SegmentsResponse),
        (status = 404, description = "Ride not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_segments(
    State(state): State<AppState>,
    Path(ride_id): Path<String>,
) -> Result<Json<SegmentsResponse>, ApiError> {
    let segments = ride_service::list_segments(state.db_pool(), &ride_id).await?;
    Ok(Json(SegmentsResponse { segments }))
}

#[utoipa::path(
    put,
    path = "/api/rides/{ride_id}",
    tag = "Rides",
    security(("bearerAuth" = [])),
    params(("ride_id" = String, Path, description = "Ride public ID")),
    request_body = UpdateRideRequest,
    responses(
        (status = 200, description = "Updated ride", body = RideDetail),
        (status = 400, description = "Invalid ride payload", body = crate::error::ErrorResponse),
        (status = 403, description = "Only the driver can edit the ride", body = crate::error::ErrorResponse),
        (status = 404, description = "Ride not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Ride is not active or seats are already booked", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<UpdateRideRequest>,
) -> Result<Json<RideDetail>, ApiError> {
    let user = state.current_user(&headers).await?;
    let ride = ride_service::update_ride(state.db_pool(), user.id, &ride_id, payload).await?;
    Ok(Json(ride))
}

#[utoipa::path(
    post,
    path = "/api/rides/{ride_id}/cancel",
    tag = "Rides",
    security(("bearerAuth" = [])),
    params(("ride_id" = String, Path, description = "Ride public ID")),
    responses(
        (status = 200, description = "Ride cancelled", body = RideDetail),
        (status = 403, description = "Only the driver can cancel the ride", body = crate::error::ErrorResponse),
        (status = 404, description = "Ride not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Ride is not active", body = crate::error::ErrorResponse)
    )
)]
pub async fn cancel_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RideDetail>, ApiError> {
    let user = state.current_user(&headers).await?;
    let ride = ride_service::cancel_ride(state.db_pool(), user.id, &ride_id).await?;
    Ok(Json(ride))
}

#[utoipa::path(
    post,
    path = "/api/rides/{ride_id}/complete",
    tag = "Rides",
    security(("bearerAuth" = [])),
    params(("ride_id" = String, Path, description = "Ride public ID")),
    responses(
        (status = 200, description = "Ride completed", body = RideDetail),
        (status = 403, description = "Only the driver can complete the ride", body = crate::error::ErrorResponse),
        (status = 404, description = "Ride not found", body = crate::error::ErrorResponse),
        (status = 409, description = "Ride is not active", body = crate::error::ErrorResponse)
    )
)]
pub async fn complete_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<RideDetail>, ApiError> {
    let user = state.current_user(&headers).await?;
    let ride =
        ride_service::complete_ride(state.db_pool(), state.impact(), user.id, &ride_id).await?;
    Ok(Json(ride))
}
