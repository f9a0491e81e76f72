//! Admin account domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use coursereg_core::{AdminId, Email};

/// An admin account as exposed by the management API.
///
/// The password hash is not part of this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Admin {
    /// Unique admin ID.
    pub id: AdminId,
    /// Lower-cased login email.
    pub email: Email,
    /// Whether this admin may perform management operations.
    pub is_superadmin: bool,
    /// When the admin was created.
    pub created_at: DateTime<Utc>,
}

/// An admin together with the stored password hash, for login checks.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub admin: Admin,
    /// PHC-formatted password hash.
    pub password_hash: String,
}
