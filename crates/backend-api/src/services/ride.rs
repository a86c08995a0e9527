use carpool_config::ImpactConfig;
use carpool_maps::{haversine_meters, path_length_meters, polyline, LatLng, MapsClient, MapsError};
use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use tracing::{info, warn};

use super::error::ServiceError;
use super::impact::{self, CarriedPassenger};
use super::notification::{create_notification, NewNotification, NotificationKind};
use super::{profile, vehicle};
use crate::routes::models::{
    CreateRideRequest, DriverRidesQuery, ListRidesQuery, Location, ProfileSummary, Ride,
    RideDetail, RouteInput, RouteSegment, RouteSummary, SegmentPoint, UpdateRideRequest,
    VehicleSummary,
};
use crate::util::{format_departure, non_blank, now_timestamp, page, parse_departure};

pub const MAX_NOTES_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RideStatus {
    Active,
    Cancelled,
    Completed,
}

impl RideStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ServiceError> {
        match value.trim() {
            "active" => Ok(Self::Active),
            "cancelled" => Ok(Self::Cancelled),
            "completed" => Ok(Self::Completed),
            other => Err(ServiceError::bad_request(format!(
                "unknown ride status '{other}'"
            ))),
        }
    }
}

pub(crate) const RIDE_SELECT: &str = r#"
SELECT r.id, r.public_id, r.driver_id,
       r.origin_address, r.origin_lat, r.origin_lng,
       r.destination_address, r.destination_lat, r.destination_lng,
       r.departure_time, r.total_seats, r.available_seats, r.price_per_seat, r.status, r.notes,
       r.polyline, r.distance_meters, r.duration_seconds, r.created_at, r.updated_at,
       d.public_id AS driver_public_id, d.display_name AS driver_display_name,
       d.avatar_url AS driver_avatar_url,
       v.public_id AS vehicle_public_id, v.make AS vehicle_make, v.model AS vehicle_model,
       v.color AS vehicle_color, v.seats AS vehicle_seats
FROM rides r
JOIN profiles d ON d.id = r.driver_id
LEFT JOIN vehicles v ON v.id = r.vehicle_id
"#;

#[derive(Debug, Clone, FromRow)]
pub(crate) struct RideRow {
    pub id: i64,
    pub public_id: String,
    pub driver_id: i64,
    pub origin_address: String,
    pub origin_lat: f64,
    pub origin_lng: f64,
    pub destination_address: String,
    pub destination_lat: f64,
    pub destination_lng: f64,
    pub departure_time: String,
    pub total_seats: i64,
    pub available_seats: i64,
    pub price_per_seat: f64,
    pub status: String,
    pub notes: Option<String>,
    pub polyline: Option<String>,
    pub distance_meters: Option<i64>,
    pub duration_seconds: Option<i64>,
    pub created_at: String,
    pub updated_at: String,
    pub driver_public_id: String,
    pub driver_display_name: Option<String>,
    pub driver_avatar_url: Option<String>,
    pub vehicle_public_id: Option<String>,
    pub vehicle_make: Option<String>,
    pub vehicle_model: Option<String>,
    pub vehicle_color: Option<String>,
    pub vehicle_seats: Option<i64>,
}

impl RideRow {
    pub fn origin(&self) -> LatLng {
        LatLng::new(self.origin_lat, self.origin_lng)
    }

    pub fn destination(&self) -> LatLng {
        LatLng::new(self.destination_lat, self.destination_lng)
    }

    pub fn is_active(&self) -> bool {
        self.status == RideStatus::Active.as_str()
    }

    /// Human readable trip description for notifications.
    pub fn trip_label(&self) -> String {
        format!(
            "{} → {} on {}",
            self.origin_address, self.destination_address, self.departure_time
        )
    }

    pub fn into_ride(self) -> Ride {
        let vehicle = match (
            self.vehicle_public_id,
            self.vehicle_make,
            self.vehicle_model,
            self.vehicle_seats,
        ) {
            (Some(id), Some(make), Some(model), Some(seats)) => Some(VehicleSummary {
                id,
                make,
                model,
                color: self.vehicle_color,
                seats,
            }),
            _ => None,
        };

        Ride {
            id: self.public_id,
            driver: ProfileSummary {
                id: self.driver_public_id,
                display_name: self.driver_display_name,
                avatar_url: self.driver_avatar_url,
            },
            vehicle,
            origin: Location {
                address: self.origin_address,
                lat: self.origin_lat,
                lng: self.origin_lng,
            },
            destination: Location {
                address: self.destination_address,
                lat: self.destination_lat,
                lng: self.destination_lng,
            },
            departure_time: self.departure_time,
            total_seats: self.total_seats,
            available_seats: self.available_seats,
            price_per_seat: self.price_per_seat,
            status: self.status,
            notes: self.notes,
            route: RouteSummary {
                polyline: self.polyline,
                distance_meters: self.distance_meters,
                duration_seconds: self.duration_seconds,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub(crate) struct SegmentRow {
    pub ride_id: i64,
    pub sequence: i64,
    pub start_address: Option<String>,
    pub start_lat: f64,
    pub start_lng: f64,
    pub end_address: Option<String>,
    pub end_lat: f64,
    pub end_lng: f64,
    pub polyline: String,
    pub distance_meters: Option<i64>,
    pub duration_seconds: Option<i64>,
}

impl From<SegmentRow> for RouteSegment {
    fn from(row: SegmentRow) -> Self {
        Self {
            sequence: row.sequence,
            start: SegmentPoint {
                address: row.start_address,
                lat: row.start_lat,
                lng: row.start_lng,
            },
            end: SegmentPoint {
                address: row.end_address,
                lat: row.end_lat,
                lng: row.end_lng,
            },
            polyline: row.polyline,
            distance_meters: row.distance_meters,
            duration_seconds: row.duration_seconds,
        }
    }
}

pub(crate) const SEGMENT_COLUMNS: &str = "ride_id, sequence, start_address, start_lat, start_lng, \
     end_address, end_lat, end_lng, polyline, distance_meters, duration_seconds";

#[derive(Debug, Clone)]
struct Stop {
    address: Option<String>,
    point: LatLng,
}

#[derive(Debug)]
struct PlannedSegment {
    start: Stop,
    end: Stop,
    polyline: String,
    distance_meters: Option<i64>,
    duration_seconds: Option<i64>,
}

#[derive(Debug)]
struct PlannedRoute {
    polyline: Option<String>,
    distance_meters: Option<i64>,
    duration_seconds: Option<i64>,
    segments: Vec<PlannedSegment>,
}

pub async fn create_ride(
    pool: &SqlitePool,
    maps: Option<&MapsClient>,
    driver_id: i64,
    req: CreateRideRequest,
) -> Result<RideDetail, ServiceError> {
    let origin = validate_location(&req.origin, "origin")?;
    let destination = validate_location(&req.destination, "destination")?;
    let mut stops = Vec::with_capacity(req.waypoints.len() + 2);
    stops.push(origin);
    for (index, waypoint) in req.waypoints.iter().enumerate() {
        stops.push(validate_location(waypoint, &format!("waypoints[{index}]"))?);
    }
    stops.push(destination);

    let departure = parse_departure(&req.departure_time, "departure_time")
        .map_err(ServiceError::BadRequest)?;
    if departure <= Utc::now() {
        return Err(ServiceError::bad_request("departure_time must be in the future"));
    }

    validate_total_seats(req.total_seats)?;
    validate_price(req.price_per_seat)?;
    let notes = validate_notes(req.notes.as_deref())?;

    let vehicle_id = match req.vehicle_id.as_deref() {
        Some(vehicle_id) => {
            let vehicle = vehicle::owned_vehicle(pool, driver_id, vehicle_id).await?;
            check_vehicle_capacity(req.total_seats, vehicle.seats)?;
            Some(vehicle.id)
        }
        None => None,
    };

    let route = plan_route(maps, &stops, req.route.as_ref()).await?;

    let public_id = carpool_auth::new_public_id();
    let now = now_timestamp();
    let (first, last) = (&stops[0], &stops[stops.len() - 1]);

    let mut tx = pool.begin().await?;

    let ride_id = sqlx::query(
        r#"
        INSERT INTO rides (
            public_id, driver_id, vehicle_id,
            origin_address, origin_lat, origin_lng,
            destination_address, destination_lat, destination_lng,
            departure_time, total_seats, available_seats, price_per_seat, status, notes,
            polyline, distance_meters, duration_seconds, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'active', ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&public_id)
    .bind(driver_id)
    .bind(vehicle_id)
    .bind(&first.address)
    .bind(first.point.lat)
    .bind(first.point.lng)
    .bind(&last.address)
    .bind(last.point.lat)
    .bind(last.point.lng)
    .bind(format_departure(departure))
    .bind(req.total_seats)
    .bind(req.total_seats)
    .bind(req.price_per_seat)
    .bind(&notes)
    .bind(&route.polyline)
    .bind(route.distance_meters)
    .bind(route.duration_seconds)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for (sequence, segment) in route.segments.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO route_segments (
                ride_id, sequence, start_address, start_lat, start_lng,
                end_address, end_lat, end_lng, polyline, distance_meters, duration_seconds
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(ride_id)
        .bind(sequence as i64)
        .bind(&segment.start.address)
        .bind(segment.start.point.lat)
        .bind(segment.start.point.lng)
        .bind(&segment.end.address)
        .bind(segment.end.point.lat)
        .bind(segment.end.point.lng)
        .bind(&segment.polyline)
        .bind(segment.distance_meters)
        .bind(segment.duration_seconds)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query("UPDATE profiles SET is_driver = 1, updated_at = ? WHERE id = ? AND is_driver = 0")
        .bind(&now)
        .bind(driver_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    info!(
        ride = %public_id,
        driver_id,
        segments = route.segments.len(),
        "ride created"
    );

    get_ride_detail(pool, &public_id).await
}

pub async fn list_rides(pool: &SqlitePool, query: ListRidesQuery) -> Result<Vec<Ride>, ServiceError> {
    let min_seats = query.min_seats.unwrap_or(1);
    if min_seats < 0 {
        return Err(ServiceError::bad_request("min_seats must not be negative"));
    }
    let after = optional_departure(query.departure_after.as_deref(), "departure_after")?;
    let before = optional_departure(query.departure_before.as_deref(), "departure_before")?;
    let (limit, offset) = page(query.limit, query.offset);

    let rows = sqlx::query_as::<_, RideRow>(&format!(
        r#"
        {RIDE_SELECT}
        WHERE r.status = 'active'
          AND r.departure_time > ?
          AND r.available_seats >= ?
          AND (? IS NULL OR r.departure_time >= ?)
          AND (? IS NULL OR r.departure_time <= ?)
        ORDER BY r.departure_time ASC, r.id ASC
        LIMIT ? OFFSET ?
        "#
    ))
    .bind(format_departure(Utc::now()))
    .bind(min_seats)
    .bind(&after)
    .bind(&after)
    .bind(&before)
    .bind(&before)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(RideRow::into_ride).collect())
}

pub async fn list_driver_rides(
    pool: &SqlitePool,
    driver_public_id: &str,
    query: DriverRidesQuery,
) -> Result<Vec<Ride>, ServiceError> {
    let driver_id = profile::resolve_profile_id(pool, driver_public_id).await?;
    let status = query
        .status
        .as_deref()
        .map(RideStatus::parse)
        .transpose()?
        .map(|status| status.as_str());
    let (limit, offset) = page(query.limit, query.offset);

    let rows = sqlx::query_as::<_, RideRow>(&format!(
        r#"
        {RIDE_SELECT}
        WHERE r.driver_id = ? AND (? IS NULL OR r.status = ?)
        ORDER BY r.departure_time DESC, r.id DESC
        LIMIT ? OFFSET ?
        "#
    ))
    .bind(driver_id)
    .bind(status)
    .bind(status)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(RideRow::into_ride).collect())
}

pub async fn get_ride_detail(pool: &SqlitePool, ride_id: &str) -> Result<RideDetail, ServiceError> {
    let ride = fetch_ride(pool, ride_id).await?;
    let segments = segment_rows(pool, ride.id).await?;

    Ok(RideDetail {
        ride: ride.into_ride(),
        segments: segments.into_iter().map(RouteSegment::from).collect(),
    })
}

pub async fn list_segments(
    pool: &SqlitePool,
    ride_id: &str,
) -> Result<Vec<RouteSegment>, ServiceError> {
    let ride = fetch_ride(pool, ride_id).await?;
    let segments = segment_rows(pool, ride.id).await?;
    Ok(segments.into_iter().map(RouteSegment::from).collect())
}

/// Update the editable fields of an active ride.
///
/// Seats already held by pending or confirmed bookings carry over, so the
/// new `available_seats` is `total_seats` minus those. The seat change is a
/// single guarded statement so a booking racing with the edit cannot push
/// availability below zero.
pub async fn update_ride(
    pool: &SqlitePool,
    driver_id: i64,
    ride_id: &str,
    req: UpdateRideRequest,
) -> Result<RideDetail, ServiceError> {
    let ride = fetch_ride(pool, ride_id).await?;
    require_driver(&ride, driver_id)?;
    if !ride.is_active() {
        return Err(ServiceError::conflict("ride is not active"));
    }

    let departure_time = match req.departure_time.as_deref() {
        Some(value) => {
            let departure =
                parse_departure(value, "departure_time").map_err(ServiceError::BadRequest)?;
            if departure <= Utc::now() {
                return Err(ServiceError::bad_request("departure_time must be in the future"));
            }
            format_departure(departure)
        }
        None => ride.departure_time.clone(),
    };

    let notes = match req.notes.as_deref() {
        Some(value) => validate_notes(Some(value))?,
        None => ride.notes.clone(),
    };

    let price_per_seat = match req.price_per_seat {
        Some(price) => {
            validate_price(price)?;
            price
        }
        None => ride.price_per_seat,
    };

    let total_seats = match req.total_seats {
        Some(total) => {
            validate_total_seats(total)?;
            if let Some(capacity) = ride.vehicle_seats {
                check_vehicle_capacity(total, capacity)?;
            }
            total
        }
        None => ride.total_seats,
    };

    let result = sqlx::query(
        r#"
        UPDATE rides
        SET departure_time = ?,
            notes = ?,
            price_per_seat = ?,
            available_seats = ? - (total_seats - available_seats),
            total_seats = ?,
            updated_at = ?
        WHERE id = ? AND status = 'active' AND total_seats - available_seats <= ?
        "#,
    )
    .bind(&departure_time)
    .bind(&notes)
    .bind(price_per_seat)
    .bind(total_seats)
    .bind(total_seats)
    .bind(now_timestamp())
    .bind(ride.id)
    .bind(total_seats)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        let current = fetch_ride(pool, ride_id).await?;
        if !current.is_active() {
            return Err(ServiceError::conflict("ride is not active"));
        }
        let held = current.total_seats - current.available_seats;
        return Err(ServiceError::conflict(format!(
            "total_seats cannot be lower than the {held} seats already booked"
        )));
    }

    info!(ride = %ride.public_id, driver_id, "ride updated");
    get_ride_detail(pool, ride_id).await
}

/// Cancel an active ride together with every open booking on it.
pub async fn cancel_ride(
    pool: &SqlitePool,
    driver_id: i64,
    ride_id: &str,
) -> Result<RideDetail, ServiceError> {
    let ride = fetch_ride(pool, ride_id).await?;
    require_driver(&ride, driver_id)?;
    let trip = ride.trip_label();
    let now = now_timestamp();

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE rides SET status = 'cancelled', updated_at = ? WHERE id = ? AND status = 'active'",
    )
    .bind(&now)
    .bind(ride.id)
    .execute(&mut *tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ServiceError::conflict("ride is not active"));
    }

    let open: Vec<(String, i64)> = sqlx::query_as(
        "SELECT public_id, passenger_id FROM bookings WHERE ride_id = ? AND status IN ('pending', 'confirmed')",
    )
    .bind(ride.id)
    .fetch_all(&mut *tx)
    .await?;

    sqlx::query(
        "UPDATE bookings SET status = 'cancelled', updated_at = ? WHERE ride_id = ? AND status IN ('pending', 'confirmed')",
    )
    .bind(&now)
    .bind(ride.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE rides SET available_seats = total_seats WHERE id = ?")
        .bind(ride.id)
        .execute(&mut *tx)
        .await?;

    for (booking_id, passenger_id) in &open {
        create_notification(
            &mut tx,
            NewNotification {
                profile_id: *passenger_id,
                kind: NotificationKind::RideCancelled,
                title: "Ride cancelled".to_string(),
                body: format!("The driver cancelled the ride {trip}."),
                ride_id: Some(&ride.public_id),
                booking_id: Some(booking_id),
            },
        )
        .await?;
    }

    tx.commit().await?;

    info!(
        ride = %ride.public_id,
        driver_id,
        cancelled_bookings = open.len(),
        "ride cancelled"
    );
    get_ride_detail(pool, ride_id).await
}

/// Complete an active ride. Pending requests are rejected and the
/// confirmed passengers' shared distance is recorded as impact.
pub async fn complete_ride(
    pool: &SqlitePool,
    impact_config: &ImpactConfig,
    driver_id: i64,
    ride_id: &str,
) -> Result<RideDetail, ServiceError> {
    let ride = fetch_ride(pool, ride_id).await?;
    require_driver(&ride, driver_id)?;
    let segments = segment_rows(pool, ride.id).await?;
    let distance_km = ride_distance_meters(&ride, &segments) / 1000.0;
    let trip = ride.trip_label();
    let now = now_timestamp();

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE rides SET status = 'completed', updated_at = ? WHERE id = ? AND status = 'active'",
    )
    .bind(&now)
    .bind(ride.id)
    .execute(&mut *tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ServiceError::conflict("ride is not active"));
    }

    let pending: Vec<(String, i64, i64)> = sqlx::query_as(
        "SELECT public_id, passenger_id, seats FROM bookings WHERE ride_id = ? AND status = 'pending'",
    )
    .bind(ride.id)
    .fetch_all(&mut *tx)
    .await?;

    if !pending.is_empty() {
        let released: i64 = pending.iter().map(|(_, _, seats)| seats).sum();
        sqlx::query(
            "UPDATE bookings SET status = 'rejected', updated_at = ? WHERE ride_id = ? AND status = 'pending'",
        )
        .bind(&now)
        .bind(ride.id)
        .execute(&mut *tx)
        .await?;
        sqlx::query("UPDATE rides SET available_seats = available_seats + ? WHERE id = ?")
            .bind(released)
            .bind(ride.id)
            .execute(&mut *tx)
            .await?;
    }

    let confirmed: Vec<(String, i64, i64)> = sqlx::query_as(
        "SELECT public_id, passenger_id, seats FROM bookings WHERE ride_id = ? AND status = 'confirmed'",
    )
    .bind(ride.id)
    .fetch_all(&mut *tx)
    .await?;

    let carried: Vec<CarriedPassenger> = confirmed
        .iter()
        .map(|(_, passenger_id, seats)| CarriedPassenger {
            profile_id: *passenger_id,
            seats: *seats,
        })
        .collect();
    impact::record_ride_impact(
        &mut tx,
        ride.driver_id,
        &carried,
        distance_km,
        impact_config.co2_kg_per_km,
    )
    .await?;

    for (booking_id, passenger_id, _) in &confirmed {
        create_notification(
            &mut tx,
            NewNotification {
                profile_id: *passenger_id,
                kind: NotificationKind::RideCompleted,
                title: "Ride completed".to_string(),
                body: format!("Thanks for sharing the ride {trip}."),
                ride_id: Some(&ride.public_id),
                booking_id: Some(booking_id),
            },
        )
        .await?;
    }
    for (booking_id, passenger_id, _) in &pending {
        create_notification(
            &mut tx,
            NewNotification {
                profile_id: *passenger_id,
                kind: NotificationKind::BookingRejected,
                title: "Booking request closed".to_string(),
                body: format!("The ride {trip} was completed before your request was accepted."),
                ride_id: Some(&ride.public_id),
                booking_id: Some(booking_id),
            },
        )
        .await?;
    }

    tx.commit().await?;

    info!(
        ride = %ride.public_id,
        driver_id,
        passengers = confirmed.len(),
        distance_km,
        "ride completed"
    );
    get_ride_detail(pool, ride_id).await
}

pub(crate) async fn fetch_ride(pool: &SqlitePool, ride_id: &str) -> Result<RideRow, ServiceError> {
    sqlx::query_as::<_, RideRow>(&format!("{RIDE_SELECT} WHERE r.public_id = ?"))
        .bind(ride_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("ride not found"))
}

pub(crate) async fn segment_rows(
    pool: &SqlitePool,
    ride_id: i64,
) -> Result<Vec<SegmentRow>, ServiceError> {
    let rows = sqlx::query_as::<_, SegmentRow>(&format!(
        "SELECT {SEGMENT_COLUMNS} FROM route_segments WHERE ride_id = ? ORDER BY sequence"
    ))
    .bind(ride_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub(crate) fn require_driver(ride: &RideRow, profile_id: i64) -> Result<(), ServiceError> {
    if ride.driver_id != profile_id {
        return Err(ServiceError::forbidden("only the driver can manage this ride"));
    }
    Ok(())
}

/// The geometry a rider is matched against: segment polylines in order,
/// else the ride polyline, else the straight line between the endpoints.
pub(crate) fn ride_path(ride: &RideRow, segments: &[SegmentRow]) -> Vec<LatLng> {
    let mut path: Vec<LatLng> = Vec::new();
    for segment in segments {
        match polyline::decode(&segment.polyline) {
            Ok(points) => {
                let skip = usize::from(path.last().is_some_and(|last| points.first() == Some(last)));
                path.extend(points.into_iter().skip(skip));
            }
            Err(err) => {
                warn!(ride = %ride.public_id, sequence = segment.sequence, error = %err, "skipping undecodable segment");
            }
        }
    }
    if path.len() >= 2 {
        return path;
    }

    if let Some(encoded) = ride.polyline.as_deref() {
        match polyline::decode(encoded) {
            Ok(points) if points.len() >= 2 => return points,
            Ok(_) => {}
            Err(err) => warn!(ride = %ride.public_id, error = %err, "ride polyline is not decodable"),
        }
    }

    vec![ride.origin(), ride.destination()]
}

/// Distance used for impact accounting.
pub(crate) fn ride_distance_meters(ride: &RideRow, segments: &[SegmentRow]) -> f64 {
    if let Some(distance) = ride.distance_meters {
        return distance as f64;
    }

    let summed: Option<i64> = if segments.is_empty() {
        None
    } else {
        segments.iter().map(|segment| segment.distance_meters).sum()
    };
    match summed {
        Some(distance) => distance as f64,
        None => haversine_meters(ride.origin(), ride.destination()),
    }
}

async fn plan_route(
    maps: Option<&MapsClient>,
    stops: &[Stop],
    supplied: Option<&RouteInput>,
) -> Result<PlannedRoute, ServiceError> {
    if let Some(route) = supplied {
        return client_route(stops, route);
    }

    if let Some(maps) = maps {
        let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
            return Err(ServiceError::internal("a route needs at least two stops"));
        };
        let waypoints: Vec<LatLng> = stops[1..stops.len() - 1]
            .iter()
            .map(|stop| stop.point)
            .collect();

        match maps.compute_route(first.point, last.point, &waypoints).await {
            Ok(route) => {
                let legs_match_stops = route.legs.len() + 1 == stops.len();
                let segments = route
                    .legs
                    .into_iter()
                    .enumerate()
                    .map(|(index, leg)| PlannedSegment {
                        start: Stop {
                            address: legs_match_stops
                                .then(|| stops[index].address.clone())
                                .flatten(),
                            point: leg.start,
                        },
                        end: Stop {
                            address: legs_match_stops
                                .then(|| stops[index + 1].address.clone())
                                .flatten(),
                            point: leg.end,
                        },
                        polyline: leg.polyline,
                        distance_meters: Some(leg.distance_meters),
                        duration_seconds: Some(leg.duration_seconds),
                    })
                    .collect();

                return Ok(PlannedRoute {
                    polyline: Some(route.polyline),
                    distance_meters: Some(route.distance_meters),
                    duration_seconds: Some(route.duration_seconds),
                    segments,
                });
            }
            Err(MapsError::NoRoute) => {
                warn!("maps provider found no route, falling back to straight segments");
            }
            Err(err) => return Err(err.into()),
        }
    }

    Ok(straight_line_route(stops))
}

fn client_route(stops: &[Stop], route: &RouteInput) -> Result<PlannedRoute, ServiceError> {
    let encoded = route.polyline.trim();
    let points = polyline::decode(encoded)?;
    if points.len() < 2 {
        return Err(ServiceError::bad_request(
            "route polyline must contain at least two points",
        ));
    }
    if points.iter().any(|point| !point.is_valid()) {
        return Err(ServiceError::bad_request(
            "route polyline contains coordinates out of range",
        ));
    }
    if route.distance_meters.is_some_and(|distance| distance < 0)
        || route.duration_seconds.is_some_and(|duration| duration < 0)
    {
        return Err(ServiceError::bad_request(
            "route distance and duration must not be negative",
        ));
    }

    let distance = route
        .distance_meters
        .unwrap_or_else(|| path_length_meters(&points).round() as i64);
    let (Some(first), Some(last)) = (stops.first(), stops.last()) else {
        return Err(ServiceError::internal("a route needs at least two stops"));
    };

    Ok(PlannedRoute {
        polyline: Some(encoded.to_string()),
        distance_meters: Some(distance),
        duration_seconds: route.duration_seconds,
        segments: vec![PlannedSegment {
            start: first.clone(),
            end: last.clone(),
            polyline: encoded.to_string(),
            distance_meters: Some(distance),
            duration_seconds: route.duration_seconds,
        }],
    })
}

fn straight_line_route(stops: &[Stop]) -> PlannedRoute {
    let segments: Vec<PlannedSegment> = stops
        .windows(2)
        .map(|pair| PlannedSegment {
            start: pair[0].clone(),
            end: pair[1].clone(),
            polyline: polyline::encode(&[pair[0].point, pair[1].point]),
            distance_meters: Some(haversine_meters(pair[0].point, pair[1].point).round() as i64),
            duration_seconds: None,
        })
        .collect();

    let points: Vec<LatLng> = stops.iter().map(|stop| stop.point).collect();
    PlannedRoute {
        polyline: Some(polyline::encode(&points)),
        distance_meters: Some(path_length_meters(&points).round() as i64),
        duration_seconds: None,
        segments,
    }
}

fn validate_location(location: &Location, field: &str) -> Result<Stop, ServiceError> {
    let address = non_blank(Some(&location.address))
        .ok_or_else(|| ServiceError::bad_request(format!("{field}.address is required")))?;
    let point = location.point();
    if !point.is_valid() {
        return Err(ServiceError::bad_request(format!(
            "{field} has invalid coordinates"
        )));
    }
    Ok(Stop {
        address: Some(address),
        point,
    })
}

fn validate_total_seats(total_seats: i64) -> Result<(), ServiceError> {
    if !(vehicle::MIN_SEATS..=vehicle::MAX_SEATS).contains(&total_seats) {
        return Err(ServiceError::bad_request(format!(
            "total_seats must be between {} and {}",
            vehicle::MIN_SEATS,
            vehicle::MAX_SEATS
        )));
    }
    Ok(())
}

fn check_vehicle_capacity(total_seats: i64, vehicle_seats: i64) -> Result<(), ServiceError> {
    if total_seats > vehicle_seats {
        return Err(ServiceError::bad_request(format!(
            "total_seats exceeds the {vehicle_seats} seats of the selected vehicle"
        )));
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<(), ServiceError> {
    if !price.is_finite() || price < 0.0 {
        return Err(ServiceError::bad_request(
            "price_per_seat must be zero or positive",
        ));
    }
    Ok(())
}

fn validate_notes(notes: Option<&str>) -> Result<Option<String>, ServiceError> {
    let notes = non_blank(notes);
    if notes
        .as_deref()
        .is_some_and(|notes| notes.chars().count() > MAX_NOTES_CHARS)
    {
        return Err(ServiceError::bad_request(format!(
            "notes must be at most {MAX_NOTES_CHARS} characters"
        )));
    }
    Ok(notes)
}

fn optional_departure(value: Option<&str>, field: &str) -> Result<Option<String>, ServiceError> {
    value
        .map(|value| {
            parse_departure(value, field)
                .map(format_departure)
                .map_err(ServiceError::BadRequest)
        })
        .transpose()
}
