//! Database migrations

use anyhow::Context;
use sqlx::SqlitePool;
use tracing::info;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

pub async fn run_migrations(pool: &SqlitePool) -> anyhow::Result<()> {
    MIGRATOR
        .run(pool)
        .await
        .context("database migrations failed")?;
    info!("database migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::prepare_database;
    use carpool_config::DatabaseConfig;
    use tempfile::TempDir;

    async fn migrated_pool() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = DatabaseConfig {
            url: format!("sqlite:{}", temp_dir.path().join("migrations.db").display()),
            max_connections: 1,
        };
        let pool = prepare_database(&config).await.unwrap();
        run_migrations(&pool).await.unwrap();
        (pool, temp_dir)
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let (pool, _temp_dir) = migrated_pool().await;
        run_migrations(&pool).await.unwrap();
    }

    #[tokio::test]
    async fn seat_constraints_reject_overbooked_rides() {
        let (pool, _temp_dir) = migrated_pool().await;
        let now = "2030-01-01T00:00:00Z";

        sqlx::query(
            "INSERT INTO profiles (public_id, created_at, updated_at) VALUES ('p1', ?, ?)",
        )
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await
        .unwrap();

        let insert_ride = |available: i64| {
            sqlx::query(
                r#"INSERT INTO rides (public_id, driver_id, origin_address, origin_lat, origin_lng,
                       destination_address, destination_lat, destination_lng, departure_time,
                       total_seats, available_seats, created_at, updated_at)
                   VALUES (?, 1, 'A', 0, 0, 'B', 1, 1, ?, 3, ?, ?, ?)"#,
            )
            .bind(format!("ride-{available}"))
            .bind(now)
            .bind(available)
            .bind(now)
            .bind(now)
        };

        assert!(insert_ride(3).execute(&pool).await.is_ok());
        assert!(insert_ride(4).execute(&pool).await.is_err());
        assert!(insert_ride(-1).execute(&pool).await.is_err());
    }

    #[tokio::test]
    async fn messages_to_self_are_rejected() {
        let (pool, _temp_dir) = migrated_pool().await;
        let now = "2030-01-01T00:00:00Z";

        sqlx::query(
            "INSERT INTO profiles (public_id, created_at, updated_at) VALUES ('p1', ?, ?)",
        )
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await
        .unwrap();

        let result = sqlx::query(
            "INSERT INTO messages (public_id, sender_id, recipient_id, content, created_at)
             VALUES ('m1', 1, 1, 'hi', ?)",
        )
        .bind(now)
        .execute(&pool)
        .await;
        assert!(result.is_err());
    }
}
