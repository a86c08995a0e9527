use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};

use crate::{
    routes::models::{CreateVehicleRequest, UpdateVehicleRequest, Vehicle, VehiclesResponse},
    services::vehicle as vehicle_service,
    ApiError, AppState,
};

#[utoipa::path(
    get,
    path = "/api/vehicles",
    tag = "Vehicles",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Vehicles owned by the caller", body = VehiclesResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn list_vehicles(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<VehiclesResponse>, ApiError> {
    let user = state.current_user(&headers).await?;
    let vehicles = vehicle_service::list_vehicles(state.db_pool(), user.id).await?;
    Ok(Json(VehiclesResponse { vehicles }))
}

#[utoipa::path(
    post,
    path = "/api/vehicles",
    tag = "Vehicles",
    security(("bearerAuth" = [])),
    request_body = CreateVehicleRequest,
    responses(
        (status = 201, description = "Vehicle registered", body = Vehicle),
        (status = 400, description = "Invalid vehicle payload", body = crate::error::ErrorResponse),
        (status = 401, description = "Authentication required", body = crate::error::ErrorResponse)
    )
)]
pub async fn create_vehicle(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateVehicleRequest>,
) -> Result<(StatusCode, Json<Vehicle>), ApiError> {
    let user = state.current_user(&headers).await?;
    let vehicle = vehicle_service::create_vehicle(state.db_pool(), user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

#[utoipa::path(
    get,
    path = "/api/vehicles/{vehicle_id}",
    tag = "Vehicles",
    security(("bearerAuth" = [])),
    params(("vehicle_id" = String, Path, description = "Vehicle public ID")),
    responses(
        (status = 200, description = "Vehicle", body = Vehicle),
        (status = 403, description = "Vehicle belongs to another member", body = crate::error::ErrorResponse),
        (status = 404, description = "Vehicle not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn get_vehicle(
    State(state): State<AppState>,
    Path(vehicle_id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vehicle>, ApiError> {
    let user = state.current_user(&headers).await?;
    let vehicle = vehicle_service::get_vehicle(state.db_pool(), user.id, &vehicle_id).await?;
    Ok(Json(vehicle))
}

#[utoipa::path(
    put,
    path = "/api/vehicles/{vehicle_id}",
    tag = "Vehicles",
    security(("bearerAuth" = [])),
    params(("vehicle_id" = String, Path, description = "Vehicle public ID")),
    request_body = UpdateVehicleRequest,
    responses(
        (status = 200, description = "Updated vehicle", body = Vehicle),
        (status = 400, description = "Invalid vehicle payload", body = crate::error::ErrorResponse),
        (status = 403, description = "Vehicle belongs to another member", body = crate::error::ErrorResponse),
        (status = 404, description = "Vehicle not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn update_vehicle(
    State(state): State<AppState>,
    Path(vehicle_id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<UpdateVehicleRequest>,
) -> Result<Json<Vehicle>, ApiError> {
    let user = state.current_user(&headers).await?;
    let vehicle =
        vehicle_service::update_vehicle(state.db_pool(), user.id, &vehicle_id, payload).await?;
    Ok(Json(vehicle))
}

#[utoipa::path(
    delete,
    path = "/api/vehicles/{vehicle_id}",
    tag = "Vehicles",
    security(("bearerAuth" = [])),
    params(("vehicle_id" = String, Path, description = "Vehicle public ID")),
    responses(
        (status = 204, description = "Vehicle deleted"),
        (status = 403, description = "Vehicle belongs to another member", body = crate::error::ErrorResponse),
        (status = 404, description = "Vehicle not found", body = crate::error::ErrorResponse)
    )
)]
pub async fn delete_vehicle(
    State(state): State<AppState>,
    Path(vehicle_id): Path<String>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let user = state.current_user(&headers).await?;
    vehicle_service::delete_vehicle(state.db_pool(), user.id, &vehicle_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
