//! Admin account management routes. All of them need a super-admin.

use axum::{Json, extract::State};
use serde::Deserialize;
use tracing::instrument;

use coursereg_core::AdminId;

use super::auth::CredentialsRequest;
use super::registrations::Success;
use crate::error::Result;
use crate::extract::{ApiJson, PathId};
use crate::middleware::RequireSuperAdmin;
use crate::models::Admin;
use crate::services::auth::AdminAuthService;
use crate::state::AppState;

/// List admins, newest first. Password hashes are never included.
#[instrument(skip_all, fields(admin_id = %claims.sub))]
pub async fn list(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Admin>>> {
    let admins = AdminAuthService::new(state.admins())
        .list_admins()
        .await?;
    Ok(Json(admins))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateAdminRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Change an admin's email and/or password.
#[instrument(skip_all, fields(admin_id = %claims.sub, target_id = %id))]
pub async fn update(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    PathId(id): PathId<AdminId>,
    ApiJson(req): ApiJson<UpdateAdminRequest>,
) -> Result<Json<Admin>> {
    let admin = AdminAuthService::new(state.admins())
        .update_admin(id, req.email.as_deref(), req.password.as_deref())
        .await?;
    Ok(Json(admin))
}

/// Delete another admin.
#[instrument(skip_all, fields(admin_id = %claims.sub, target_id = %id))]
pub async fn delete(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    PathId(id): PathId<AdminId>,
) -> Result<Json<Success>> {
    AdminAuthService::new(state.admins())
        .delete_admin(claims.sub, id)
        .await?;
    Ok(Json(Success::OK))
}

/// Give a new admin access. Never grants super-admin.
#[instrument(skip_all, fields(admin_id = %claims.sub))]
pub async fn grant(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CredentialsRequest>,
) -> Result<Json<Success>> {
    AdminAuthService::new(state.admins())
        .grant(&req.email, &req.password)
        .await?;
    Ok(Json(Success::OK))
}
