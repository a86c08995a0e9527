use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use carpool_maps::LatLng;

use crate::{
    routes::models::{
        AutocompleteQuery, AutocompleteResponse, GeocodeQuery, GeocodeResponse, RouteRequest,
        RouteResponse,
    },
    ApiError, AppState,
};

#[utoipa::path(
    get,
    path = "/api/maps/autocomplete",
    tag = "Maps",
    security(("bearerAuth" = [])),
    params(AutocompleteQuery),
    responses(
        (status = 200, description = "Place suggestions", body = AutocompleteResponse),
        (status = 400, description = "Blank input", body = crate::error::ErrorResponse),
        (status = 502, description = "Maps provider failed", body = crate::error::ErrorResponse),
        (status = 503, description = "Maps integration not configured", body = crate::error::ErrorResponse)
    )
)]
pub async fn autocomplete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AutocompleteQuery>,
) -> Result<Json<AutocompleteResponse>, ApiError> {
    state.current_user(&headers).await?;
    let maps = state.require_maps()?;
    let suggestions = maps
        .autocomplete(&query.input, query.session_token.as_deref())
        .await?;
    Ok(Json(AutocompleteResponse {
        suggestions: suggestions.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/api/maps/geocode",
    tag = "Maps",
    security(("bearerAuth" = [])),
    params(GeocodeQuery),
    responses(
        (status = 200, description = "Geocoding candidates", body = GeocodeResponse),
        (status = 400, description = "Blank address", body = crate::error::ErrorResponse),
        (status = 502, description = "Maps provider failed", body = crate::error::ErrorResponse),
        (status = 503, description = "Maps integration not configured", body = crate::error::ErrorResponse)
    )
)]
pub async fn geocode(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<GeocodeQuery>,
) -> Result<Json<GeocodeResponse>, ApiError> {
    state.current_user(&headers).await?;
    let maps = state.require_maps()?;
    let results = maps.geocode(&query.address).await?;
    Ok(Json(GeocodeResponse {
        results: results.into_iter().map(Into::into).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/api/maps/route",
    tag = "Maps",
    security(("bearerAuth" = [])),
    request_body = RouteRequest,
    responses(
        (status = 200, description = "Driving route with one leg per stop pair", body = RouteResponse),
        (status = 400, description = "Invalid coordinates", body = crate::error::ErrorResponse),
        (status = 422, description = "No route between the stops", body = crate::error::ErrorResponse),
        (status = 502, description = "Maps provider failed", body = crate::error::ErrorResponse),
        (status = 503, description = "Maps integration not configured", body = crate::error::ErrorResponse)
    )
)]
pub async fn compute_route(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<RouteRequest>,
) -> Result<Json<RouteResponse>, ApiError> {
    state.current_user(&headers).await?;
    let maps = state.require_maps()?;
    let waypoints: Vec<LatLng> = payload.waypoints.into_iter().map(Into::into).collect();
    let route = maps
        .compute_route(payload.origin.into(), payload.destination.into(), &waypoints)
        .await?;
    Ok(Json(route.into()))
}
