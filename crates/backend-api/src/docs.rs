use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::routes::{
    auth, bookings, health, impact, maps, messages, models, notifications, profiles, rides,
    vehicles,
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Carpool API",
        description = "Ride sharing backend: offers, route matching, bookings, messaging and impact tracking"
    ),
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::identity_login,
        auth::identity_callback,
        auth::identity_session,
        auth::me,
        auth::logout,
        profiles::get_my_profile,
        profiles::update_my_profile,
        profiles::get_profile,
        vehicles::list_vehicles,
        vehicles::create_vehicle,
        vehicles::get_vehicle,
        vehicles::update_vehicle,
        vehicles::delete_vehicle,
        rides::create_ride,
        rides::list_rides,
        rides::search_rides,
        rides::list_driver_rides,
        rides::get_ride,
        rides::list_segments,
        rides::update_ride,
        rides::cancel_ride,
        rides::complete_ride,
        bookings::create_booking,
        bookings::list_ride_bookings,
        bookings::list_my_bookings,
        bookings::get_booking,
        bookings::confirm_booking,
        bookings::reject_booking,
        bookings::cancel_booking,
        messages::send_message,
        messages::list_conversations,
        messages::unread_count,
        messages::get_thread,
        messages::mark_thread_read,
        notifications::list_notifications,
        notifications::unread_count,
        notifications::mark_notification_read,
        notifications::mark_all_read,
        notifications::delete_notification,
        impact::my_impact,
        impact::impact_summary,
        maps::autocomplete,
        maps::geocode,
        maps::compute_route
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            health::HealthResponse,
            models::RegisterRequest,
            models::LoginRequest,
            models::IdentityLoginResponse,
            models::IdentityCallbackRequest,
            models::IdentitySessionRequest,
            models::SessionResponse,
            models::UserResponse,
            models::Profile,
            models::PublicProfile,
            models::ProfileSummary,
            models::UpdateProfileRequest,
            models::Vehicle,
            models::VehicleSummary,
            models::CreateVehicleRequest,
            models::UpdateVehicleRequest,
            models::VehiclesResponse,
            models::Location,
            models::Coordinates,
            models::RouteInput,
            models::CreateRideRequest,
            models::UpdateRideRequest,
            models::RouteSummary,
            models::Ride,
            models::SegmentPoint,
            models::RouteSegment,
            models::RideDetail,
            models::RidesResponse,
            models::SegmentsResponse,
            models::RideMatch,
            models::SearchRidesResponse,
            models::BookingRide,
            models::Booking,
            models::CreateBookingRequest,
            models::BookingsResponse,
            models::Message,
            models::SendMessageRequest,
            models::Conversation,
            models::ConversationsResponse,
            models::MessagesResponse,
            models::MarkedReadResponse,
            models::UnreadCountResponse,
            models::Notification,
            models::NotificationsResponse,
            models::NotificationResponse,
            models::MarkNotificationReadRequest,
            models::Impact,
            models::ImpactSummary,
            models::PlaceSuggestionResponse,
            models::AutocompleteResponse,
            models::GeocodeResultResponse,
            models::GeocodeResponse,
            models::RouteRequest,
            models::RouteLegResponse,
            models::RouteResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness probe"),
        (name = "Auth", description = "Password and identity-provider sign-in, sessions"),
        (name = "Profiles", description = "Member profiles"),
        (name = "Vehicles", description = "Vehicles owned by drivers"),
        (name = "Rides", description = "Ride offers, route segments and route matching search"),
        (name = "Bookings", description = "Seat requests and their lifecycle"),
        (name = "Messages", description = "Direct messages between members"),
        (name = "Notifications", description = "In-app notifications"),
        (name = "Impact", description = "CO2 savings from shared rides"),
        (name = "Maps", description = "Place autocomplete, geocoding and routing")
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

/// Registers the `bearerAuth` scheme referenced by authenticated operations.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        let mut http = Http::new(HttpAuthScheme::Bearer);
        http.bearer_format = Some("session token".to_string());
        components.add_security_scheme("bearerAuth", SecurityScheme::Http(http));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_carpool_operations_and_security() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/rides/search"));
        assert!(doc.paths.paths.contains_key("/api/bookings/{booking_id}/confirm"));
        assert!(doc.paths.paths.contains_key("/api/maps/route"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearerAuth"));
        assert!(components.schemas.contains_key("RideMatch"));
    }
}
