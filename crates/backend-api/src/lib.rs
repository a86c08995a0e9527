mod docs;
mod error;
mod middleware;
mod state;
mod util;

pub mod routes;
pub mod services;

pub use docs::ApiDoc;
pub use error::ApiError;
pub use state::{AppState, OAuthStateStore};

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(routes::health::health_check))
        // Auth
        .route("/api/auth/register", post(routes::auth::register))
        .route("/api/auth/login", post(routes::auth::login))
        .route(
            "/api/auth/identity/login",
            get(routes::auth::identity_login),
        )
        .route(
            "/api/auth/identity/callback",
            post(routes::auth::identity_callback),
        )
        .route(
            "/api/auth/identity/session",
            post(routes::auth::identity_session),
        )
        .route("/api/auth/me", get(routes::auth::me))
        .route("/api/auth/logout", post(routes::auth::logout))
        // Profiles
        .route(
            "/api/profiles/me",
            get(routes::profiles::get_my_profile).put(routes::profiles::update_my_profile),
        )
        .route("/api/profiles/:profile_id", get(routes::profiles::get_profile))
        // Vehicles
        .route(
            "/api/vehicles",
            get(routes::vehicles::list_vehicles).post(routes::vehicles::create_vehicle),
        )
        .route(
            "/api/vehicles/:vehicle_id",
            get(routes::vehicles::get_vehicle)
                .put(routes::vehicles::update_vehicle)
                .delete(routes::vehicles::delete_vehicle),
        )
        // Rides
        .route(
            "/api/rides",
            get(routes::rides::list_rides).post(routes::rides::create_ride),
        )
        .route("/api/rides/search", get(routes::rides::search_rides))
        .route(
            "/api/rides/driver/:profile_id",
            get(routes::rides::list_driver_rides),
        )
        .route(
            "/api/rides/:ride_id",
            get(routes::rides::get_ride).put(routes::rides::update_ride),
        )
        .route(
            "/api/rides/:ride_id/segments",
            get(routes::rides::list_segments),
        )
        .route("/api/rides/:ride_id/cancel", post(routes::rides::cancel_ride))
        .route(
            "/api/rides/:ride_id/complete",
            post(routes::rides::complete_ride),
        )
        // Bookings
        .route(
            "/api/rides/:ride_id/bookings",
            get(routes::bookings::list_ride_bookings).post(routes::bookings::create_booking),
        )
        .route("/api/bookings", get(routes::bookings::list_my_bookings))
        .route(
            "/api/bookings/:booking_id",
            get(routes::bookings::get_booking),
        )
        .route(
            "/api/bookings/:booking_id/confirm",
            post(routes::bookings::confirm_booking),
        )
        .route(
            "/api/bookings/:booking_id/reject",
            post(routes::bookings::reject_booking),
        )
        .route(
            "/api/bookings/:booking_id/cancel",
            post(routes::bookings::cancel_booking),
        )
        // Messages
        .route(
            "/api/messages",
            get(routes::messages::list_conversations).post(routes::messages::send_message),
        )
        .route(
            "/api/messages/unread-count",
            get(routes::messages::unread_count),
        )
        .route(
            "/api/messages/:profile_id",
            get(routes::messages::get_thread),
        )
        .route(
            "/api/messages/:profile_id/read",
            post(routes::messages::mark_thread_read),
        )
        // Notifications
        .route(
            "/api/notifications",
            get(routes::notifications::list_notifications),
        )
        .route(
            "/api/notifications/unread-count",
            get(routes::notifications::unread_count),
        )
        .route(
            "/api/notifications/read-all",
            post(routes::notifications::mark_all_read),
        )
        .route(
            "/api/notifications/:notification_id",
            delete(routes::notifications::delete_notification),
        )
        .route(
            "/api/notifications/:notification_id/read",
            put(routes::notifications::mark_notification_read),
        )
        // Impact
        .route("/api/impact/me", get(routes::impact::my_impact))
        .route("/api/impact/summary", get(routes::impact::impact_summary))
        // Maps
        .route("/api/maps/autocomplete", get(routes::maps::autocomplete))
        .route("/api/maps/geocode", get(routes::maps::geocode))
        .route("/api/maps/route", post(routes::maps::compute_route));

    let api = with_debug_routes(api);

    api.with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum::middleware::from_fn(middleware::logging_middleware))
        .layer(cors_layer())
}

#[cfg(debug_assertions)]
fn with_debug_routes(router: Router<AppState>) -> Router<AppState> {
    router
        .route("/api/auth/dev/token", get(routes::auth::dev_token))
        .route("/api/debug/db", get(routes::debug::database_status))
}

#[cfg(not(debug_assertions))]
fn with_debug_routes(router: Router<AppState>) -> Router<AppState> {
    router
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
}
