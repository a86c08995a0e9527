use carpool_auth::{AuthSession, User};
use carpool_maps::{ComputedRoute, GeocodeResult, LatLng, PlaceSuggestion, RouteLeg};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

// Auth

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IdentityLoginQuery {
    pub redirect_uri: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct IdentityLoginResponse {
    pub authorize_url: String,
    pub state: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct IdentityCallbackRequest {
    pub code: String,
    pub state: String,
    pub redirect_uri: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct IdentitySessionRequest {
    pub token: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    pub token: String,
    pub user: UserResponse,
    pub expires_at: String,
}

impl SessionResponse {
    pub fn new(session: AuthSession, user: User) -> Self {
        Self {
            token: session.token,
            user: user.into(),
            expires_at: session.expires_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
}

impl From<User> for UserResponse {
    fn from(value: User) -> Self {
        Self {
            id: value.public_id,
            email: value.email,
            first_name: value.first_name,
            last_name: value.last_name,
            display_name: value.display_name,
        }
    }
}

// Profiles

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Profile {
    pub id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub is_driver: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// What other members see: no email or phone.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PublicProfile {
    pub id: String,
    pub first_name: Option<String>,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    pub is_driver: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ProfileSummary {
    pub id: String,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

// Vehicles

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Vehicle {
    pub id: String,
    pub make: String,
    pub model: String,
    pub year: Option<i64>,
    pub color: Option<String>,
    pub license_plate: String,
    pub seats: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct VehicleSummary {
    pub id: String,
    pub make: String,
    pub model: String,
    pub color: Option<String>,
    pub seats: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateVehicleRequest {
    pub make: String,
    pub model: String,
    pub year: Option<i64>,
    pub color: Option<String>,
    pub license_plate: String,
    pub seats: i64,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateVehicleRequest {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i64>,
    pub color: Option<String>,
    pub license_plate: Option<String>,
    pub seats: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct VehiclesResponse {
    pub vehicles: Vec<Vehicle>,
}

// Rides

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Location {
    pub address: String,
    pub lat: f64,
    pub lng: f64,
}

impl Location {
    pub fn point(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl From<Coordinates> for LatLng {
    fn from(value: Coordinates) -> Self {
        LatLng::new(value.lat, value.lng)
    }
}

impl From<LatLng> for Coordinates {
    fn from(value: LatLng) -> Self {
        Self {
            lat: value.lat,
            lng: value.lng,
        }
    }
}

/// A route the client already computed, stored as a single segment.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RouteInput {
    pub polyline: String,
    pub distance_meters: Option<i64>,
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRideRequest {
    pub origin: Location,
    pub destination: Location,
    #[serde(default)]
    pub waypoints: Vec<Location>,
    pub departure_time: String,
    pub total_seats: i64,
    pub vehicle_id: Option<String>,
    #[serde(default)]
    pub price_per_seat: f64,
    pub notes: Option<String>,
    pub route: Option<RouteInput>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateRideRequest {
    pub departure_time: Option<String>,
    pub notes: Option<String>,
    pub price_per_seat: Option<f64>,
    pub total_seats: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RouteSummary {
    pub polyline: Option<String>,
    pub distance_meters: Option<i64>,
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Ride {
    pub id: String,
    pub driver: ProfileSummary,
    pub vehicle: Option<VehicleSummary>,
    pub origin: Location,
    pub destination: Location,
    pub departure_time: String,
    pub total_seats: i64,
    pub available_seats: i64,
    pub price_per_seat: f64,
    pub status: String,
    pub notes: Option<String>,
    pub route: RouteSummary,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SegmentPoint {
    pub address: Option<String>,
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RouteSegment {
    pub sequence: i64,
    pub start: SegmentPoint,
    pub end: SegmentPoint,
    pub polyline: String,
    pub distance_meters: Option<i64>,
    pub duration_seconds: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RideDetail {
    #[serde(flatten)]
    pub ride: Ride,
    pub segments: Vec<RouteSegment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RidesResponse {
    pub rides: Vec<Ride>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SegmentsResponse {
    pub segments: Vec<RouteSegment>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListRidesQuery {
    pub departure_after: Option<String>,
    pub departure_before: Option<String>,
    pub min_seats: Option<i64>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DriverRidesQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchRidesQuery {
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub destination_lat: f64,
    pub destination_lng: f64,
    pub seats: Option<i64>,
    pub departure_after: Option<String>,
    pub departure_before: Option<String>,
    pub max_pickup_distance_meters: Option<f64>,
    pub max_dropoff_distance_meters: Option<f64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RideMatch {
    pub ride: Ride,
    pub pickup_distance_meters: f64,
    pub dropoff_distance_meters: f64,
    pub pickup_progress_meters: f64,
    pub dropoff_progress_meters: f64,
    pub score: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SearchRidesResponse {
    pub results: Vec<RideMatch>,
}

// Bookings

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookingRide {
    pub id: String,
    pub driver_id: String,
    pub origin_address: String,
    pub destination_address: String,
    pub departure_time: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Booking {
    pub id: String,
    pub ride: BookingRide,
    pub passenger: ProfileSummary,
    pub seats: i64,
    pub status: String,
    pub pickup: Option<Location>,
    pub dropoff: Option<Location>,
    pub message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn one_seat() -> i64 {
    1
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateBookingRequest {
    #[serde(default = "one_seat")]
    pub seats: i64,
    pub pickup: Option<Location>,
    pub dropoff: Option<Location>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BookingsResponse {
    pub bookings: Vec<Booking>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListBookingsQuery {
    pub status: Option<String>,
}

// Messages

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Message {
    pub id: String,
    pub sender_id: String,
    pub recipient_id: String,
    pub ride_id: Option<String>,
    pub content: String,
    pub is_read: bool,
    pub created_at: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub recipient_id: String,
    pub ride_id: Option<String>,
    pub content: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Conversation {
    pub counterpart: ProfileSummary,
    pub last_message: String,
    pub last_message_at: String,
    pub last_sender_id: String,
    pub unread_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ConversationsResponse {
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessagesResponse {
    pub messages: Vec<Message>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MarkedReadResponse {
    pub updated: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

// Notifications

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub ride_id: Option<String>,
    pub booking_id: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationsResponse {
    pub notifications: Vec<Notification>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationResponse {
    pub notification: Notification,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListNotificationsQuery {
    pub unread_only: Option<bool>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkNotificationReadRequest {
    pub read: bool,
}

// Environmental impact

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Impact {
    pub rides_shared: i64,
    pub distance_shared_km: f64,
    pub co2_saved_kg: f64,
    pub updated_at: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ImpactSummary {
    pub participants: i64,
    pub completed_rides: i64,
    pub rides_shared: i64,
    pub distance_shared_km: f64,
    pub co2_saved_kg: f64,
}

// Maps

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AutocompleteQuery {
    pub input: String,
    pub session_token: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlaceSuggestionResponse {
    pub place_id: String,
    pub description: String,
    pub main_text: Option<String>,
    pub secondary_text: Option<String>,
}

impl From<PlaceSuggestion> for PlaceSuggestionResponse {
    fn from(value: PlaceSuggestion) -> Self {
        Self {
            place_id: value.place_id,
            description: value.description,
            main_text: value.main_text,
            secondary_text: value.secondary_text,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AutocompleteResponse {
    pub suggestions: Vec<PlaceSuggestionResponse>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GeocodeQuery {
    pub address: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GeocodeResultResponse {
    pub formatted_address: String,
    pub place_id: Option<String>,
    pub location: Coordinates,
}

impl From<GeocodeResult> for GeocodeResultResponse {
    fn from(value: GeocodeResult) -> Self {
        Self {
            formatted_address: value.formatted_address,
            place_id: value.place_id,
            location: value.location.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct GeocodeResponse {
    pub results: Vec<GeocodeResultResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RouteRequest {
    pub origin: Coordinates,
    pub destination: Coordinates,
    #[serde(default)]
    pub waypoints: Vec<Coordinates>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteLegResponse {
    pub start: Coordinates,
    pub end: Coordinates,
    pub polyline: String,
    pub distance_meters: i64,
    pub duration_seconds: i64,
}

impl From<RouteLeg> for RouteLegResponse {
    fn from(value: RouteLeg) -> Self {
        Self {
            start: value.start.into(),
            end: value.end.into(),
            polyline: value.polyline,
            distance_meters: value.distance_meters,
            duration_seconds: value.duration_seconds,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteResponse {
    pub polyline: String,
    pub distance_meters: i64,
    pub duration_seconds: i64,
    pub legs: Vec<RouteLegResponse>,
}

impl From<ComputedRoute> for RouteResponse {
    fn from(value: ComputedRoute) -> Self {
        Self {
            polyline: value.polyline,
            distance_meters: value.distance_meters,
            duration_seconds: value.duration_seconds,
            legs: value.legs.into_iter().map(Into::into).collect(),
        }
    }
}
