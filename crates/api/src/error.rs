//! Unified error handling with Sentry integration.
//!
//! Every handler returns `Result<T, AppError>`. Responses always carry a JSON
//! body of the form `{"error": "<message>"}`.

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::verification::VerificationError;

/// Application-level error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("{0}")]
    Database(#[from] RepositoryError),

    /// Authentication or account operation failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Token redemption failed.
    #[error(transparent)]
    Verification(#[from] VerificationError),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// Missing or invalid bearer claim.
    #[error("unauthorized")]
    Unauthorized,

    /// Authenticated but not allowed.
    #[error("{0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("too many requests, please try again later")]
    RateLimited,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials | AuthError::WrongCurrentPassword => {
                    StatusCode::UNAUTHORIZED
                }
                AuthError::AdminNotFound => StatusCode::NOT_FOUND,
                AuthError::InvalidEmail(_)
                | AuthError::InvalidInput(_)
                | AuthError::SelfDelete
                | AuthError::Repository(_) => StatusCode::BAD_REQUEST,
                AuthError::PasswordHash | AuthError::Signing(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Verification(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    const fn is_server_fault(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Auth(
                    AuthError::Repository(_) | AuthError::PasswordHash | AuthError::Signing(_)
                )
                | Self::Verification(VerificationError::Repository(_))
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture storage, hashing and signing failures to Sentry
        if self.is_server_fault() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = ?self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status();
        let message = match &self {
            Self::Auth(AuthError::PasswordHash | AuthError::Signing(_)) => {
                "internal server error".to_string()
            }
            _ => self.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context from an admin ID.
pub fn set_sentry_admin(admin_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(admin_id.to_string()),
            ..Default::default()
        }));
    });
}
