use axum::{extract::State, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::{ApiError, AppState};

#[derive(Debug, Serialize, ToSchema)]
pub struct TableCount {
    pub table: String,
    pub rows: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DatabaseStatus {
    pub connected: bool,
    pub tables: Vec<TableCount>,
}

#[utoipa::path(
    get,
    path = "/api/debug/db",
    tag = "Debug",
    responses(
        (status = 200, description = "Connection check and row counts", body = DatabaseStatus),
        (status = 500, description = "Database unreachable", body = crate::error::ErrorResponse)
    )
)]
pub async fn database_status(State(state): State<AppState>) -> Result<Json<DatabaseStatus>, ApiError> {
    let counts = carpool_database::table_counts(state.db_pool())
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "database status check failed");
            ApiError::internal_server_error("database unavailable")
        })?;

    Ok(Json(DatabaseStatus {
        connected: true,
        tables: counts
            .into_iter()
            .map(|(table, rows)| TableCount { table, rows })
            .collect(),
    }))
}
