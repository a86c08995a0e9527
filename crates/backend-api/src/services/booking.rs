use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use tracing::info;

use super::error::ServiceError;
use super::notification::{create_notification, NewNotification, NotificationKind};
use super::profile::display_label;
use super::ride::{fetch_ride, require_driver};
use crate::routes::models::{Booking, BookingRide, CreateBookingRequest, Location, ProfileSummary};
use crate::util::{format_departure, non_blank, now_timestamp};

const MAX_SEATS_PER_BOOKING: i64 = 8;
const MAX_MESSAGE_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Rejected,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ServiceError> {
        match value.trim() {
            "pending" => Ok(Self::Pending),
            "confirmed" => Ok(Self::Confirmed),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ServiceError::bad_request(format!(
                "unknown booking status '{other}'"
            ))),
        }
    }

    /// Pending and confirmed bookings hold seats on their ride.
    pub fn holds_seats(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }
}

const BOOKING_SELECT: &str = r#"
SELECT b.id, b.public_id, b.ride_id, b.passenger_id, b.seats, b.status,
       b.pickup_address, b.pickup_lat, b.pickup_lng,
       b.dropoff_address, b.dropoff_lat, b.dropoff_lng,
       b.message, b.created_at, b.updated_at,
       r.public_id AS ride_public_id, r.driver_id, d.public_id AS driver_public_id,
       r.origin_address, r.destination_address, r.departure_time, r.status AS ride_status,
       p.public_id AS passenger_public_id, p.display_name AS passenger_display_name,
       p.avatar_url AS passenger_avatar_url
FROM bookings b
JOIN rides r ON r.id = b.ride_id
JOIN profiles d ON d.id = r.driver_id
JOIN profiles p ON p.id = b.passenger_id
"#;

#[derive(Debug, FromRow)]
struct BookingRow {
    id: i64,
    public_id: String,
    ride_id: i64,
    passenger_id: i64,
    seats: i64,
    status: String,
    pickup_address: Option<String>,
    pickup_lat: Option<f64>,
    pickup_lng: Option<f64>,
    dropoff_address: Option<String>,
    dropoff_lat: Option<f64>,
    dropoff_lng: Option<f64>,
    message: Option<String>,
    created_at: String,
    updated_at: String,
    ride_public_id: String,
    driver_id: i64,
    driver_public_id: String,
    origin_address: String,
    destination_address: String,
    departure_time: String,
    ride_status: String,
    passenger_public_id: String,
    passenger_display_name: Option<String>,
    passenger_avatar_url: Option<String>,
}

impl BookingRow {
    fn status(&self) -> Result<BookingStatus, ServiceError> {
        BookingStatus::parse(&self.status)
    }

    fn ride_is_active(&self) -> bool {
        self.ride_status == "active"
    }

    fn trip_label(&self) -> String {
        format!(
            "{} → {} on {}",
            self.origin_address, self.destination_address, self.departure_time
        )
    }
}

fn location(address: Option<String>, lat: Option<f64>, lng: Option<f64>) -> Option<Location> {
    match (lat, lng) {
        (Some(lat), Some(lng)) => Some(Location {
            address: address.unwrap_or_default(),
            lat,
            lng,
        }),
        _ => None,
    }
}

impl From<BookingRow> for Booking {
    fn from(row: BookingRow) -> Self {
        Self {
            id: row.public_id,
            ride: BookingRide {
                id: row.ride_public_id,
                driver_id: row.driver_public_id,
                origin_address: row.origin_address,
                destination_address: row.destination_address,
                departure_time: row.departure_time,
                status: row.ride_status,
            },
            passenger: ProfileSummary {
                id: row.passenger_public_id,
                display_name: row.passenger_display_name,
                avatar_url: row.passenger_avatar_url,
            },
            seats: row.seats,
            status: row.status,
            pickup: location(row.pickup_address, row.pickup_lat, row.pickup_lng),
            dropoff: location(row.dropoff_address, row.dropoff_lat, row.dropoff_lng),
            message: row.message,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Request seats on a ride.
///
/// The seats are taken from the ride immediately with a guarded update, so
/// two passengers racing for the last seat cannot both succeed. The update
/// is the first statement of the transaction so that SQLite takes the write
/// lock before anything is read.
pub async fn create_booking(
    pool: &SqlitePool,
    passenger_id: i64,
    ride_id: &str,
    req: CreateBookingRequest,
) -> Result<Booking, ServiceError> {
    if !(1..=MAX_SEATS_PER_BOOKING).contains(&req.seats) {
        return Err(ServiceError::bad_request(format!(
            "seats must be between 1 and {MAX_SEATS_PER_BOOKING}"
        )));
    }
    let pickup = validate_stop(req.pickup.as_ref(), "pickup")?;
    let dropoff = validate_stop(req.dropoff.as_ref(), "dropoff")?;
    let message = non_blank(req.message.as_deref());
    if message
        .as_deref()
        .is_some_and(|message| message.chars().count() > MAX_MESSAGE_CHARS)
    {
        return Err(ServiceError::bad_request(format!(
            "message must be at most {MAX_MESSAGE_CHARS} characters"
        )));
    }

    let ride = fetch_ride(pool, ride_id).await?;
    if ride.driver_id == passenger_id {
        return Err(ServiceError::bad_request("drivers cannot book their own ride"));
    }
    if !ride.is_active() {
        return Err(ServiceError::conflict("ride is not active"));
    }
    let now_departure = format_departure(Utc::now());
    if ride.departure_time <= now_departure {
        return Err(ServiceError::conflict("ride has already departed"));
    }

    let passenger_name = display_label(pool, passenger_id).await?;
    let public_id = carpool_auth::new_public_id();
    let now = now_timestamp();

    let mut tx = pool.begin().await?;

    let reserved = sqlx::query(
        r#"
        UPDATE rides
        SET available_seats = available_seats - ?, updated_at = ?
        WHERE id = ? AND status = 'active' AND available_seats >= ? AND departure_time > ?
        "#,
    )
    .bind(req.seats)
    .bind(&now)
    .bind(ride.id)
    .bind(req.seats)
    .bind(&now_departure)
    .execute(&mut *tx)
    .await?;

    if reserved.rows_affected() == 0 {
        return Err(ServiceError::conflict("not enough seats available"));
    }

    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM bookings WHERE ride_id = ? AND passenger_id = ? AND status IN ('pending', 'confirmed')",
    )
    .bind(ride.id)
    .bind(passenger_id)
    .fetch_optional(&mut *tx)
    .await?;

    if existing.is_some() {
        return Err(ServiceError::conflict(
            "you already have an open booking for this ride",
        ));
    }

    sqlx::query(
        r#"
        INSERT INTO bookings (
            public_id, ride_id, passenger_id, seats, status,
            pickup_address, pickup_lat, pickup_lng,
            dropoff_address, dropoff_lat, dropoff_lng,
            message, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, 'pending', ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&public_id)
    .bind(ride.id)
    .bind(passenger_id)
    .bind(req.seats)
    .bind(pickup.as_ref().map(|stop| stop.address.clone()))
    .bind(pickup.as_ref().map(|stop| stop.lat))
    .bind(pickup.as_ref().map(|stop| stop.lng))
    .bind(dropoff.as_ref().map(|stop| stop.address.clone()))
    .bind(dropoff.as_ref().map(|stop| stop.lat))
    .bind(dropoff.as_ref().map(|stop| stop.lng))
    .bind(&message)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    let seat_label = if req.seats == 1 { "seat" } else { "seats" };
    create_notification(
        &mut tx,
        NewNotification {
            profile_id: ride.driver_id,
            kind: NotificationKind::BookingRequested,
            title: "New booking request".to_string(),
            body: format!(
                "{passenger_name} requested {} {seat_label} on {}.",
                req.seats,
                ride.trip_label()
            ),
            ride_id: Some(&ride.public_id),
            booking_id: Some(&public_id),
        },
    )
    .await?;

    tx.commit().await?;

    info!(
        booking = %public_id,
        ride = %ride.public_id,
        passenger_id,
        seats = req.seats,
        "booking requested"
    );
    fetch_booking(pool, &public_id).await.map(Booking::from)
}

pub async fn list_passenger_bookings(
    pool: &SqlitePool,
    passenger_id: i64,
    status: Option<&str>,
) -> Result<Vec<Booking>, ServiceError> {
    let status = status.map(BookingStatus::parse).transpose()?.map(|s| s.as_str());

    let rows = sqlx::query_as::<_, BookingRow>(&format!(
        r#"
        {BOOKING_SELECT}
        WHERE b.passenger_id = ? AND (? IS NULL OR b.status = ?)
        ORDER BY b.created_at DESC, b.id DESC
        "#
    ))
    .bind(passenger_id)
    .bind(status)
    .bind(status)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Booking::from).collect())
}

pub async fn list_ride_bookings(
    pool: &SqlitePool,
    driver_id: i64,
    ride_id: &str,
    status: Option<&str>,
) -> Result<Vec<Booking>, ServiceError> {
    let ride = fetch_ride(pool, ride_id).await?;
    require_driver(&ride, driver_id)?;
    let status = status.map(BookingStatus::parse).transpose()?.map(|s| s.as_str());

    let rows = sqlx::query_as::<_, BookingRow>(&format!(
        r#"
        {BOOKING_SELECT}
        WHERE b.ride_id = ? AND (? IS NULL OR b.status = ?)
        ORDER BY b.created_at ASC, b.id ASC
        "#
    ))
    .bind(ride.id)
    .bind(status)
    .bind(status)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Booking::from).collect())
}

pub async fn get_booking(
    pool: &SqlitePool,
    profile_id: i64,
    booking_id: &str,
) -> Result<Booking, ServiceError> {
    let row = fetch_booking(pool, booking_id).await?;
    if row.passenger_id != profile_id && row.driver_id != profile_id {
        return Err(ServiceError::forbidden("not a participant of this booking"));
    }
    Ok(row.into())
}

pub async fn confirm_booking(
    pool: &SqlitePool,
    driver_id: i64,
    booking_id: &str,
) -> Result<Booking, ServiceError> {
    let row = fetch_pending_for_driver(pool, driver_id, booking_id, "confirmed").await?;
    let now = now_timestamp();

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE bookings SET status = 'confirmed', updated_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(&now)
    .bind(row.id)
    .execute(&mut *tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ServiceError::conflict("only pending bookings can be confirmed"));
    }

    create_notification(
        &mut tx,
        NewNotification {
            profile_id: row.passenger_id,
            kind: NotificationKind::BookingConfirmed,
            title: "Booking confirmed".to_string(),
            body: format!("Your seat on {} is confirmed.", row.trip_label()),
            ride_id: Some(&row.ride_public_id),
            booking_id: Some(&row.public_id),
        },
    )
    .await?;

    tx.commit().await?;

    info!(booking = %row.public_id, driver_id, "booking confirmed");
    fetch_booking(pool, booking_id).await.map(Booking::from)
}

pub async fn reject_booking(
    pool: &SqlitePool,
    driver_id: i64,
    booking_id: &str,
) -> Result<Booking, ServiceError> {
    let row = fetch_pending_for_driver(pool, driver_id, booking_id, "rejected").await?;
    let now = now_timestamp();

    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE bookings SET status = 'rejected', updated_at = ? WHERE id = ? AND status = 'pending'",
    )
    .bind(&now)
    .bind(row.id)
    .execute(&mut *tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ServiceError::conflict("only pending bookings can be rejected"));
    }

    release_seats(&mut tx, row.ride_id, row.seats, &now).await?;

    create_notification(
        &mut tx,
        NewNotification {
            profile_id: row.passenger_id,
            kind: NotificationKind::BookingRejected,
            title: "Booking declined".to_string(),
            body: format!("The driver declined your request for {}.", row.trip_label()),
            ride_id: Some(&row.ride_public_id),
            booking_id: Some(&row.public_id),
        },
    )
    .await?;

    tx.commit().await?;

    info!(booking = %row.public_id, driver_id, "booking rejected");
    fetch_booking(pool, booking_id).await.map(Booking::from)
}

/// Cancel a pending or confirmed booking as either the passenger or the
/// driver. The other party is notified.
pub async fn cancel_booking(
    pool: &SqlitePool,
    profile_id: i64,
    booking_id: &str,
) -> Result<Booking, ServiceError> {
    let row = fetch_booking(pool, booking_id).await?;
    let cancelled_by_driver = row.driver_id == profile_id;
    if row.passenger_id != profile_id && !cancelled_by_driver {
        return Err(ServiceError::forbidden("not a participant of this booking"));
    }
    if !row.status()?.holds_seats() {
        return Err(ServiceError::conflict(format!(
            "a {} booking cannot be cancelled",
            row.status
        )));
    }
    let canceller = display_label(pool, profile_id).await?;
    let now = now_timestamp();

    let mut tx = pool.begin().await?;

    // The ride status is checked under the write lock so a ride completed or
    // cancelled concurrently keeps its bookings and seat counts.
    let result = sqlx::query(
        r#"
        UPDATE bookings SET status = 'cancelled', updated_at = ?
        WHERE id = ? AND status IN ('pending', 'confirmed')
          AND EXISTS (SELECT 1 FROM rides WHERE id = ? AND status = 'active')
        "#,
    )
    .bind(&now)
    .bind(row.id)
    .bind(row.ride_id)
    .execute(&mut *tx)
    .await?;
    if result.rows_affected() == 0 {
        return Err(ServiceError::conflict(
            "booking is no longer open or its ride is not active",
        ));
    }

    release_seats(&mut tx, row.ride_id, row.seats, &now).await?;

    let (recipient, body) = if cancelled_by_driver {
        (
            row.passenger_id,
            format!("The driver cancelled your booking on {}.", row.trip_label()),
        )
    } else {
        (
            row.driver_id,
            format!(
                "{canceller} cancelled their booking on {}.",
                row.trip_label()
            ),
        )
    };
    create_notification(
        &mut tx,
        NewNotification {
            profile_id: recipient,
            kind: NotificationKind::BookingCancelled,
            title: "Booking cancelled".to_string(),
            body,
            ride_id: Some(&row.ride_public_id),
            booking_id: Some(&row.public_id),
        },
    )
    .await?;

    tx.commit().await?;

    info!(booking = %row.public_id, profile_id, cancelled_by_driver, "booking cancelled");
    fetch_booking(pool, booking_id).await.map(Booking::from)
}

async fn fetch_booking(pool: &SqlitePool, booking_id: &str) -> Result<BookingRow, ServiceError> {
    sqlx::query_as::<_, BookingRow>(&format!("{BOOKING_SELECT} WHERE b.public_id = ?"))
        .bind(booking_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found("booking not found"))
}

async fn fetch_pending_for_driver(
    pool: &SqlitePool,
    driver_id: i64,
    booking_id: &str,
    action: &str,
) -> Result<BookingRow, ServiceError> {
    let row = fetch_booking(pool, booking_id).await?;
    if row.driver_id != driver_id {
        return Err(ServiceError::forbidden("only the driver can do that"));
    }
    if row.status()? != BookingStatus::Pending {
        return Err(ServiceError::conflict(format!(
            "only pending bookings can be {action}"
        )));
    }
    if !row.ride_is_active() {
        return Err(ServiceError::conflict("ride is not active"));
    }
    Ok(row)
}

async fn release_seats(
    conn: &mut sqlx::SqliteConnection,
    ride_id: i64,
    seats: i64,
    now: &str,
) -> Result<(), ServiceError> {
    sqlx::query(
        "UPDATE rides SET available_seats = MIN(total_seats, available_seats + ?), updated_at = ? WHERE id = ?",
    )
    .bind(seats)
    .bind(now)
    .bind(ride_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

struct BookingStop {
    address: String,
    lat: f64,
    lng: f64,
}

fn validate_stop(location: Option<&Location>, field: &str) -> Result<Option<BookingStop>, ServiceError> {
    let Some(location) = location else {
        return Ok(None);
    };
    if !location.point().is_valid() {
        return Err(ServiceError::bad_request(format!(
            "{field} has invalid coordinates"
        )));
    }
    Ok(Some(BookingStop {
        address: location.address.trim().to_string(),
        lat: location.lat,
        lng: location.lng,
    }))
}
