//! Registration domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use coursereg_core::{Email, RegistrationId};

/// A course registration.
///
/// Serialized with snake_case keys for the management API. The digest of a
/// redeemed token stays internal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub id: RegistrationId,
    pub full_name: String,
    pub email: Email,
    pub phone: String,
    pub organization: Option<String>,
    pub job_title: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub heard_about_us: Option<String>,
    pub future_interests: Vec<String>,
    /// Present until the registration is verified.
    pub verification_token: Option<String>,
    pub verified: bool,
    /// Set exactly when `verified` is true.
    pub verified_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub redeemed_token_digest: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The editable part of a registration, already validated.
///
/// Used for inserts and for full-replacement edits. Verification state is
/// never part of an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationFields {
    pub full_name: String,
    pub email: Email,
    pub phone: String,
    pub organization: Option<String>,
    pub job_title: Option<String>,
    pub street_address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub heard_about_us: Option<String>,
    pub future_interests: Vec<String>,
}
