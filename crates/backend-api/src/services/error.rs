use carpool_auth::AuthError;
use carpool_maps::MapsError;
use thiserror::Error;

use crate::ApiError;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error(transparent)]
    Auth(AuthError),
    #[error(transparent)]
    Maps(MapsError),
    #[error("maps integration is not configured")]
    MapsDisabled,
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(msg) => ApiError::not_found(msg),
            ServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            ServiceError::BadRequest(msg) => ApiError::bad_request(msg),
            ServiceError::Conflict(msg) => ApiError::conflict(msg),
            ServiceError::Database(db_err) => {
                tracing::error!("Database error: {}", db_err);
                ApiError::internal_server_error("Database operation failed")
            }
            ServiceError::Auth(auth_err) => ApiError::from(auth_err),
            ServiceError::Maps(maps_err) => ApiError::from(maps_err),
            ServiceError::MapsDisabled => {
                ApiError::service_unavailable("maps integration is not configured")
            }
            ServiceError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                ApiError::internal_server_error(msg)
            }
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        Self::Auth(err)
    }
}

impl From<MapsError> for ServiceError {
    fn from(err: MapsError) -> Self {
        Self::Maps(err)
    }
}
