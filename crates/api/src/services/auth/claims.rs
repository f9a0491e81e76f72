//! Signed admin claims (HS256 JWT).

use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use coursereg_core::AdminId;

use crate::models::Admin;

/// Role carried by every admin claim.
pub const ADMIN_ROLE: &str = "admin";

/// Lifetime of an issued claim.
pub const CLAIM_TTL_SECS: i64 = 2 * 60 * 60;

/// Claims embedded in admin bearer tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (admin ID).
    pub sub: AdminId,
    /// Always `"admin"`.
    pub role: String,
    /// Whether the admin may use super-admin routes.
    #[serde(rename = "super")]
    pub is_super: bool,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration (unix timestamp).
    pub exp: i64,
    /// Claim ID (unique per token).
    pub jti: String,
}

/// Issues and validates admin claims with a process-wide secret.
///
/// Rotating the secret invalidates every outstanding claim.
#[derive(Clone)]
pub struct ClaimsManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_secs: i64,
}

impl std::fmt::Debug for ClaimsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimsManager")
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl ClaimsManager {
    /// Create a manager with the standard two-hour lifetime.
    #[must_use]
    pub fn new(secret: &[u8]) -> Self {
        Self::with_ttl(secret, CLAIM_TTL_SECS)
    }

    /// Create a manager with a custom lifetime in seconds.
    #[must_use]
    pub fn with_ttl(secret: &[u8], ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    /// Issue a signed claim for `admin`.
    ///
    /// # Errors
    ///
    /// Returns an error if the claim cannot be encoded.
    pub fn issue(&self, admin: &Admin) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: admin.id,
            role: ADMIN_ROLE.to_string(),
            is_super: admin.is_superadmin,
            iat: now,
            exp: now + self.ttl_secs,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
    }

    /// Validate a bearer token and return its claims.
    ///
    /// # Errors
    ///
    /// Returns an error if the signature, expiry, or role is invalid.
    pub fn validate(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let claims = jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &validation)?.claims;
        if claims.role != ADMIN_ROLE {
            return Err(ErrorKind::InvalidToken.into());
        }
        Ok(claims)
    }
}
