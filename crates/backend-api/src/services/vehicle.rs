use chrono::{Datelike, Utc};
use sqlx::{FromRow, SqlitePool};

use super::error::ServiceError;
use crate::routes::models::{CreateVehicleRequest, UpdateVehicleRequest, Vehicle};
use crate::util::{non_blank, now_timestamp};

pub const MIN_SEATS: i64 = 1;
pub const MAX_SEATS: i64 = 8;
const MIN_YEAR: i64 = 1950;

#[derive(Debug, FromRow)]
pub(crate) struct VehicleRow {
    pub id: i64,
    pub public_id: String,
    pub owner_id: i64,
    pub make: String,
    pub model: String,
    pub year: Option<i64>,
    pub color: Option<String>,
    pub license_plate: String,
    pub seats: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<VehicleRow> for Vehicle {
    fn from(row: VehicleRow) -> Self {
        Self {
            id: row.public_id,
            make: row.make,
            model: row.model,
            year: row.year,
            color: row.color,
            license_plate: row.license_plate,
            seats: row.seats,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const VEHICLE_COLUMNS: &str =
    "id, public_id, owner_id, make, model, year, color, license_plate, seats, created_at, updated_at";

pub async fn create_vehicle(
    pool: &SqlitePool,
    owner_id: i64,
    req: CreateVehicleRequest,
) -> Result<Vehicle, ServiceError> {
    let make = required_text(&req.make, "make")?;
    let model = required_text(&req.model, "model")?;
    let license_plate = required_text(&req.license_plate, "license_plate")?;
    validate_seats(req.seats)?;
    validate_year(req.year)?;

    let public_id = carpool_auth::new_public_id();
    let now = now_timestamp();

    sqlx::query(
        r#"
        INSERT INTO vehicles (public_id, owner_id, make, model, year, color, license_plate, seats, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&public_id)
    .bind(owner_id)
    .bind(&make)
    .bind(&model)
    .bind(req.year)
    .bind(non_blank(req.color.as_deref()))
    .bind(&license_plate)
    .bind(req.seats)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    tracing::info!(vehicle = %public_id, owner_id, "vehicle registered");
    owned_vehicle(pool, owner_id, &public_id).await.map(Vehicle::from)
}

pub async fn list_vehicles(pool: &SqlitePool, owner_id: i64) -> Result<Vec<Vehicle>, ServiceError> {
    let rows = sqlx::query_as::<_, VehicleRow>(&format!(
        "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE owner_id = ? ORDER BY created_at, id"
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Vehicle::from).collect())
}

pub async fn get_vehicle(
    pool: &SqlitePool,
    owner_id: i64,
    vehicle_id: &str,
) -> Result<Vehicle, ServiceError> {
    owned_vehicle(pool, owner_id, vehicle_id).await.map(Vehicle::from)
}

pub async fn update_vehicle(
    pool: &SqlitePool,
    owner_id: i64,
    vehicle_id: &str,
    req: UpdateVehicleRequest,
) -> Result<Vehicle, ServiceError> {
    let mut row = owned_vehicle(pool, owner_id, vehicle_id).await?;

    if let Some(make) = req.make.as_deref() {
        row.make = required_text(make, "make")?;
    }
    if let Some(model) = req.model.as_deref() {
        row.model = required_text(model, "model")?;
    }
    if let Some(plate) = req.license_plate.as_deref() {
        row.license_plate = required_text(plate, "license_plate")?;
    }
    if let Some(color) = req.color.as_deref() {
        row.color = non_blank(Some(color));
    }
    if req.year.is_some() {
        validate_year(req.year)?;
        row.year = req.year;
    }
    if let Some(seats) = req.seats {
        validate_seats(seats)?;
        row.seats = seats;
    }
    row.updated_at = now_timestamp();

    // Active rides on this vehicle must still fit after the change.
    let updated = sqlx::query(
        r#"
        UPDATE vehicles
        SET make = ?, model = ?, year = ?, color = ?, license_plate = ?, seats = ?, updated_at = ?
        WHERE id = ?
          AND NOT EXISTS (
              SELECT 1 FROM rides
              WHERE vehicle_id = ? AND status = 'active' AND total_seats > ?
          )
        "#,
    )
    .bind(&row.make)
    .bind(&row.model)
    .bind(row.year)
    .bind(&row.color)
    .bind(&row.license_plate)
    .bind(row.seats)
    .bind(&row.updated_at)
    .bind(row.id)
    .bind(row.id)
    .bind(row.seats)
    .execute(pool)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(ServiceError::conflict(format!(
            "an active ride on this vehicle offers more than {} seats",
            row.seats
        )));
    }

    Ok(row.into())
}

/// Rides that used the vehicle keep existing with no vehicle attached.
pub async fn delete_vehicle(
    pool: &SqlitePool,
    owner_id: i64,
    vehicle_id: &str,
) -> Result<(), ServiceError> {
    let row = owned_vehicle(pool, owner_id, vehicle_id).await?;

    sqlx::query("DELETE FROM vehicles WHERE id = ?")
        .bind(row.id)
        .execute(pool)
        .await?;

    tracing::info!(vehicle = %row.public_id, owner_id, "vehicle deleted");
    Ok(())
}

/// Load a vehicle by public id, enforcing that `owner_id` owns it.
pub(crate) async fn owned_vehicle(
    pool: &SqlitePool,
    owner_id: i64,
    vehicle_id: &str,
) -> Result<VehicleRow, ServiceError> {
    let row = sqlx::query_as::<_, VehicleRow>(&format!(
        "SELECT {VEHICLE_COLUMNS} FROM vehicles WHERE public_id = ?"
    ))
    .bind(vehicle_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| ServiceError::not_found("vehicle not found"))?;

    if row.owner_id != owner_id {
        return Err(ServiceError::forbidden("vehicle belongs to another member"));
    }

    Ok(row)
}

fn required_text(value: &str, field: &str) -> Result<String, ServiceError> {
    non_blank(Some(value)).ok_or_else(|| ServiceError::bad_request(format!("{field} is required")))
}

pub(crate) fn validate_seats(seats: i64) -> Result<(), ServiceError> {
    if !(MIN_SEATS..=MAX_SEATS).contains(&seats) {
        return Err(ServiceError::bad_request(format!(
            "seats must be between {MIN_SEATS} and {MAX_SEATS}"
        )));
    }
    Ok(())
}

fn validate_year(year: Option<i64>) -> Result<(), ServiceError> {
    let Some(year) = year else {
        return Ok(());
    };
    let latest = i64::from(Utc::now().year()) + 1;
    if !(MIN_YEAR..=latest).contains(&year) {
        return Err(ServiceError::bad_request(format!(
            "year must be between {MIN_YEAR} and {latest}"
        )));
    }
    Ok(())
}
