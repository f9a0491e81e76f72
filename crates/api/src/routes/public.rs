//! Public registration and email verification routes.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use coursereg_core::{RegistrationId, VerificationToken};

use super::registrations::RegistrationInput;
use crate::error::{AppError, Result};
use crate::extract::ApiJson;
use crate::middleware::AllowedAttempt;
use crate::services::email::verification_link;
use crate::services::verification::VerificationService;
use crate::state::AppState;

/// Public sign-up form body.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
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

impl From<RegisterRequest> for RegistrationInput {
    fn from(req: RegisterRequest) -> Self {
        Self {
            full_name: req.full_name,
            email: req.email,
            phone: req.phone,
            organization: req.organization,
            job_title: req.job_title,
            street_address: req.street_address,
            city: req.city,
            country: req.country,
            heard_about_us: req.heard_about_us,
            future_interests: req.future_interests,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub id: RegistrationId,
    pub email_sent: bool,
    /// Only present when the email could not be sent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_link: Option<String>,
}

/// Create an unverified registration and try to email its verification link.
///
/// Registration succeeds whether or not the email goes out; when it does not,
/// the link is returned in the response instead.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<Json<RegisterResponse>> {
    let fields = RegistrationInput::from(req).validate()?;
    let token = VerificationToken::generate();
    let registration = state.registrations().insert(&fields, &token).await?;
    tracing::info!(registration_id = %registration.id, "Registration received");

    let link = verification_link(&state.config().base_url, &token);
    let email_sent = state
        .notifications()
        .notify(&registration.email, &registration.full_name, &link)
        .await;

    Ok(Json(RegisterResponse {
        id: registration.id,
        email_sent,
        verification_link: (!email_sent).then(|| link.to_string()),
    }))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyRequest {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub message: &'static str,
}

/// Redeem a verification token.
///
/// Throttled per client address before the body is read.
#[instrument(skip_all, fields(client = %client))]
pub async fn verify_email(
    State(state): State<AppState>,
    AllowedAttempt(client): AllowedAttempt,
    ApiJson(req): ApiJson<VerifyRequest>,
) -> Result<Json<VerifyResponse>> {
    let token = req.token.unwrap_or_default();
    if token.is_empty() {
        return Err(AppError::BadRequest("token is required".to_string()));
    }

    let redeemed = VerificationService::new(state.registrations(), state.config().verification_ttl)
        .redeem(&token)
        .await?;

    Ok(Json(VerifyResponse {
        success: true,
        message: redeemed.message(),
    }))
}
