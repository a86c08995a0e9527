use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use carpool_auth::AuthError;
use carpool_maps::MapsError;
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(error: anyhow::Error) -> Self {
        error!(error = ?error, "internal error");
        Self::internal_server_error(error.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(error: AuthError) -> Self {
        let status = match error {
            AuthError::IdentityProviderDisabled | AuthError::ClaimsDisabled => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AuthError::IdentityProvider(_) => StatusCode::BAD_GATEWAY,
            AuthError::InvalidCredentials
            | AuthError::InvalidClaims(_)
            | AuthError::SessionNotFound
            | AuthError::SessionExpired
            | AuthError::InvalidSession => StatusCode::UNAUTHORIZED,
            AuthError::UserExists => StatusCode::CONFLICT,
            AuthError::Database(_) | AuthError::PasswordHash(_) => {
                error!(error = ?error, "auth error");
                return Self::internal_server_error("authentication failed");
            }
        };
        Self::new(status, error.to_string())
    }
}

impl From<MapsError> for ApiError {
    fn from(error: MapsError) -> Self {
        let status = match error {
            MapsError::InvalidInput(_) | MapsError::InvalidPolyline(_) => StatusCode::BAD_REQUEST,
            MapsError::MissingApiKey => StatusCode::SERVICE_UNAVAILABLE,
            MapsError::NoRoute => StatusCode::UNPROCESSABLE_ENTITY,
            MapsError::Http(_) | MapsError::Decode(_) | MapsError::Provider { .. } => {
                error!(error = ?error, "maps provider error");
                StatusCode::BAD_GATEWAY
            }
        };
        Self::new(status, error.to_string())
    }
}
