//! Admin login, bootstrap seeding, and self-service password change.

use axum::{Json, extract::State, http::HeaderMap};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::registrations::Success;
use crate::error::{AppError, Result};
use crate::extract::ApiJson;
use crate::middleware::RequireAdmin;
use crate::services::auth::AdminAuthService;
use crate::state::AppState;

/// Header that must carry the seed token when one is configured.
pub const SEED_TOKEN_HEADER: &str = "x-seed-token";

/// Email and password, as sent to login, seed, and grant.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub is_super_admin: bool,
}

/// Exchange admin credentials for a signed claim.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CredentialsRequest>,
) -> Result<Json<LoginResponse>> {
    let outcome = AdminAuthService::new(state.admins())
        .login(state.claims(), &req.email, &req.password)
        .await?;

    Ok(Json(LoginResponse {
        token: outcome.token,
        is_super_admin: outcome.admin.is_superadmin,
    }))
}

/// Create or reset an admin. Only the bootstrap email becomes a super-admin.
#[instrument(skip_all)]
pub async fn seed(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(req): ApiJson<CredentialsRequest>,
) -> Result<Json<Success>> {
    if let Some(expected) = &state.config().seed_token {
        let presented = headers
            .get(SEED_TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if presented != expected.expose_secret() {
            tracing::warn!("Seed request with missing or wrong seed token");
            return Err(AppError::Unauthorized);
        }
    }

    AdminAuthService::new(state.admins())
        .seed(&req.email, &req.password, &state.config().bootstrap_email)
        .await?;

    Ok(Json(Success::OK))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Change the caller's own password.
#[instrument(skip_all, fields(admin_id = %claims.sub))]
pub async fn change_password(
    RequireAdmin(claims): RequireAdmin,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> Result<Json<Success>> {
    AdminAuthService::new(state.admins())
        .change_password(claims.sub, &req.current_password, &req.new_password)
        .await?;

    Ok(Json(Success::OK))
}
