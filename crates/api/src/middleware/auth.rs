//! Bearer-claim extractors for admin routes.
//!
//! Place these before any body extractor so authorization is decided before
//! the payload is looked at.

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::error::{AppError, set_sentry_admin};
use crate::services::auth::Claims;
use crate::state::AppState;

/// Extractor that requires a valid admin claim.
///
/// Missing, malformed, badly signed, or expired claims are rejected with 401.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireAdmin(claims): RequireAdmin) -> impl IntoResponse {
///     format!("Hello, {}!", claims.sub)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub Claims);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AppError::Unauthorized)?;

        let claims = state.claims().validate(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected admin claim");
            AppError::Unauthorized
        })?;

        set_sentry_admin(&claims.sub);
        Ok(Self(claims))
    }
}

/// Extractor that requires a valid admin claim with the super-admin flag.
///
/// Returns 401 like [`RequireAdmin`], and 403 when the admin is not a
/// super-admin.
#[derive(Debug, Clone)]
pub struct RequireSuperAdmin(pub Claims);

impl FromRequestParts<AppState> for RequireSuperAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAdmin(claims) = RequireAdmin::from_request_parts(parts, state).await?;

        if !claims.is_super {
            return Err(AppError::Forbidden(
                "super admin privileges required".to_string(),
            ));
        }

        Ok(Self(claims))
    }
}

/// The token of an `Authorization: Bearer <token>` header.
fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
