use sqlx::{SqliteConnection, SqlitePool};

use super::error::ServiceError;
use crate::routes::models::{Impact, ImpactSummary};
use crate::util::now_timestamp;

#[derive(Debug, Clone, Copy)]
pub struct CarriedPassenger {
    pub profile_id: i64,
    pub seats: i64,
}

/// CO2 saved by `seats` people riding along for `distance_km` instead of
/// driving alone.
pub fn co2_saved_kg(distance_km: f64, seats: i64, co2_kg_per_km: f64) -> f64 {
    distance_km * co2_kg_per_km * seats as f64
}

/// Credit a completed ride to its passengers and, when anyone rode along,
/// to its driver.
pub async fn record_ride_impact(
    conn: &mut SqliteConnection,
    driver_id: i64,
    passengers: &[CarriedPassenger],
    distance_km: f64,
    co2_kg_per_km: f64,
) -> Result<(), ServiceError> {
    if passengers.is_empty() {
        return Ok(());
    }

    let distance_km = distance_km.max(0.0);
    for passenger in passengers {
        add_impact(
            conn,
            passenger.profile_id,
            distance_km,
            co2_saved_kg(distance_km, passenger.seats, co2_kg_per_km),
        )
        .await?;
    }

    let carried_seats: i64 = passengers.iter().map(|passenger| passenger.seats).sum();
    add_impact(
        conn,
        driver_id,
        distance_km,
        co2_saved_kg(distance_km, carried_seats, co2_kg_per_km),
    )
    .await?;

    Ok(())
}

async fn add_impact(
    conn: &mut SqliteConnection,
    profile_id: i64,
    distance_km: f64,
    co2_kg: f64,
) -> Result<(), ServiceError> {
    sqlx::query(
        r#"
        INSERT INTO environmental_impact (profile_id, rides_shared, distance_shared_km, co2_saved_kg, updated_at)
        VALUES (?, 1, ?, ?, ?)
        ON CONFLICT(profile_id) DO UPDATE SET
            rides_shared = rides_shared + 1,
            distance_shared_km = distance_shared_km + excluded.distance_shared_km,
            co2_saved_kg = co2_saved_kg + excluded.co2_saved_kg,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(profile_id)
    .bind(distance_km)
    .bind(co2_kg)
    .bind(now_timestamp())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn get_impact(pool: &SqlitePool, profile_id: i64) -> Result<Impact, ServiceError> {
    let row: Option<(i64, f64, f64, String)> = sqlx::query_as(
        "SELECT rides_shared, distance_shared_km, co2_saved_kg, updated_at FROM environmental_impact WHERE profile_id = ?",
    )
    .bind(profile_id)
    .fetch_optional(pool)
    .await?;

    Ok(match row {
        Some((rides_shared, distance_shared_km, co2_saved_kg, updated_at)) => Impact {
            rides_shared,
            distance_shared_km,
            co2_saved_kg,
            updated_at: Some(updated_at),
        },
        None => Impact {
            rides_shared: 0,
            distance_shared_km: 0.0,
            co2_saved_kg: 0.0,
            updated_at: None,
        },
    })
}

pub async fn get_summary(pool: &SqlitePool) -> Result<ImpactSummary, ServiceError> {
    let (participants, rides_shared, distance_shared_km, co2_saved_kg): (i64, i64, f64, f64) =
        sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(rides_shared), 0),
                   COALESCE(SUM(distance_shared_km), 0.0),
                   COALESCE(SUM(co2_saved_kg), 0.0)
            FROM environmental_impact
            "#,
        )
        .fetch_one(pool)
        .await?;

    let completed_rides: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM rides WHERE status = 'completed'")
            .fetch_one(pool)
            .await?;

    Ok(ImpactSummary {
        participants,
        completed_rides,
        rides_shared,
        distance_shared_km,
        co2_saved_kg,
    })
}
