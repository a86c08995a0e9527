//! Carpool database crate
//!
//! Connection management, pragmas and embedded migrations for the carpool
//! SQLite database. Domain queries live next to the services that own them.

use carpool_config::DatabaseConfig;
use sqlx::SqlitePool;
use tracing::warn;

pub mod connection;
pub mod errors;
pub mod migrations;

pub use connection::{prepare_database, DatabaseConnection};
pub use errors::{DatabaseError, DatabaseResult};
pub use migrations::run_migrations;

pub use sqlx::Pool;

/// Tables holding domain rows, in dependency order (children first).
pub const DOMAIN_TABLES: &[&str] = &[
    "environmental_impact",
    "notifications",
    "messages",
    "bookings",
    "route_segments",
    "rides",
    "vehicles",
    "sessions",
    "identities",
    "profiles",
];

/// Connect and bring the schema up to date.
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    Ok(pool)
}

/// Row counts per domain table.
pub async fn table_counts(pool: &SqlitePool) -> DatabaseResult<Vec<(String, i64)>> {
    let mut counts = Vec::with_capacity(DOMAIN_TABLES.len());
    for table in DOMAIN_TABLES.iter().rev() {
        let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(pool)
            .await?;
        counts.push((table.to_string(), count));
    }
    Ok(counts)
}

/// Delete every domain row, keeping the schema.
pub async fn clear_domain_data(pool: &SqlitePool) -> DatabaseResult<u64> {
    let mut tx = pool.begin().await?;
    let mut removed = 0;
    for table in DOMAIN_TABLES {
        let result = sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut *tx)
            .await?;
        removed += result.rows_affected();
    }
    tx.commit().await?;
    if removed == 0 {
        warn!("clear requested but database was already empty");
    }
    Ok(removed)
}
