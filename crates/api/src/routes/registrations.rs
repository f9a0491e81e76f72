//! Registration management routes.
//!
//! Listing needs any admin; every mutation needs a super-admin.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use coursereg_core::{Email, RegistrationId, VerificationToken};

use crate::error::{AppError, Result};
use crate::extract::{ApiJson, PathId};
use crate::middleware::{RequireAdmin, RequireSuperAdmin};
use crate::models::{Registration, RegistrationFields};
use crate::state::AppState;

/// Registration fields as submitted by a client.
///
/// Everything is optional at the serde level so that missing fields produce
/// a readable 400 from [`RegistrationInput::validate`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegistrationInput {
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub organization: Option<String>,
    pub job_title: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub heard_about_us: Option<String>,
    pub future_interests: Option<Vec<String>>,
}

impl RegistrationInput {
    /// Check required fields and normalize the rest.
    ///
    /// Strings are trimmed, empty optional strings become `None`, and
    /// interest tags are de-duplicated keeping first occurrence order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` naming the first missing or invalid field.
    pub fn validate(self) -> Result<RegistrationFields> {
        let full_name = required(self.full_name, "full name")?;
        let email = required(self.email, "email")?;
        let email = Email::parse(&email).map_err(|e| AppError::BadRequest(e.to_string()))?;
        let phone = required(self.phone, "phone")?;

        let mut future_interests: Vec<String> = Vec::new();
        for tag in self.future_interests.unwrap_or_default() {
            let tag = tag.trim();
            if !tag.is_empty() && !future_interests.iter().any(|t| t == tag) {
                future_interests.push(tag.to_string());
            }
        }

        Ok(RegistrationFields {
            full_name,
            email,
            phone,
            organization: optional(self.organization),
            job_title: optional(self.job_title),
            street_address: optional(self.street_address),
            city: optional(self.city),
            country: optional(self.country),
            heard_about_us: optional(self.heard_about_us),
            future_interests,
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    optional(value).ok_or_else(|| AppError::BadRequest(format!("{field} is required")))
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// `{"success": true}`.
#[derive(Debug, Serialize)]
pub struct Success {
    pub success: bool,
}

impl Success {
    pub const OK: Self = Self { success: true };
}

/// List all registrations, newest first.
#[instrument(skip_all)]
pub async fn list(
    RequireAdmin(_claims): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Registration>>> {
    Ok(Json(state.registrations().list().await?))
}

/// Create a registration on someone's behalf. It starts unverified.
#[instrument(skip_all, fields(admin_id = %claims.sub))]
pub async fn create(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    ApiJson(input): ApiJson<RegistrationInput>,
) -> Result<Json<Registration>> {
    let fields = input.validate()?;
    let token = VerificationToken::generate();
    let registration = state.registrations().insert(&fields, &token).await?;

    tracing::info!(registration_id = %registration.id, "Registration created by admin");
    Ok(Json(registration))
}

/// Replace the editable fields of a registration.
#[instrument(skip_all, fields(admin_id = %claims.sub, registration_id = %id))]
pub async fn update(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    PathId(id): PathId<RegistrationId>,
    ApiJson(input): ApiJson<RegistrationInput>,
) -> Result<Json<Registration>> {
    let fields = input.validate()?;
    let registration = state
        .registrations()
        .update(id, &fields)
        .await?
        .ok_or_else(|| AppError::NotFound("not found".to_string()))?;

    tracing::info!("Registration updated");
    Ok(Json(registration))
}

/// Delete a registration. Unknown IDs still succeed.
#[instrument(skip_all, fields(admin_id = %claims.sub, registration_id = %id))]
pub async fn delete(
    RequireSuperAdmin(claims): RequireSuperAdmin,
    State(state): State<AppState>,
    PathId(id): PathId<RegistrationId>,
) -> Result<Json<Success>> {
    if state.registrations().delete(id).await? {
        tracing::info!("Registration deleted");
    }
    Ok(Json(Success::OK))
}
