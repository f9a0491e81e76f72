//! Registration email verification.
//!
//! A token is issued with every registration and redeemed at most once.
//! Redemption is a single conditional update; a repeat of an already
//! redeemed token is recognised by its digest and succeeds without writing.

use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use coursereg_core::{RegistrationId, TokenError, VerificationToken};

use crate::db::{RegistrationStore, RepositoryError};

/// Outcome of a successful redemption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Redeemed {
    /// The registration was verified by this call.
    Verified(RegistrationId),
    /// The token had already been redeemed; nothing changed.
    AlreadyVerified(RegistrationId),
}

impl Redeemed {
    /// User-facing confirmation message.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Verified(_) => "Email verified successfully",
            Self::AlreadyVerified(_) => "Email already verified",
        }
    }
}

/// Errors that can occur while redeeming a token.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// Token failed boundary validation.
    #[error(transparent)]
    Malformed(#[from] TokenError),

    /// No registration holds or has redeemed this token.
    #[error("invalid or expired verification link")]
    NotFound,

    /// The registration is older than the verification window.
    #[error("invalid or expired verification link")]
    Expired,

    /// Repository/database error.
    #[error("{0}")]
    Repository(#[from] RepositoryError),
}

/// Verification service.
pub struct VerificationService<'a> {
    registrations: &'a dyn RegistrationStore,
    ttl: Option<Duration>,
}

impl<'a> VerificationService<'a> {
    /// Create a new verification service. `ttl` of `None` disables expiry.
    #[must_use]
    pub const fn new(registrations: &'a dyn RegistrationStore, ttl: Option<Duration>) -> Self {
        Self { registrations, ttl }
    }

    /// Redeem a raw token string.
    ///
    /// # Errors
    ///
    /// Returns `VerificationError::Malformed` before any storage access when
    /// the token has the wrong shape, `NotFound`/`Expired` when it cannot be
    /// redeemed, and `Repository` on storage failure.
    pub async fn redeem(&self, raw_token: &str) -> Result<Redeemed, VerificationError> {
        let token = VerificationToken::parse(raw_token)?;

        let issued_after = self
            .ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .map(|ttl| Utc::now() - ttl);

        if let Some(id) = self.registrations.consume_token(&token, issued_after).await? {
            tracing::info!(registration_id = %id, "Registration verified");
            return Ok(Redeemed::Verified(id));
        }

        if let Some(existing) = self
            .registrations
            .find_by_redeemed_digest(&token.digest())
            .await?
        {
            tracing::debug!(registration_id = %existing.id, "Token already redeemed");
            return Ok(Redeemed::AlreadyVerified(existing.id));
        }

        if let Some(stale) = self.registrations.find_by_token(&token).await? {
            tracing::info!(registration_id = %stale.id, "Verification link expired");
            return Err(VerificationError::Expired);
        }

        Err(VerificationError::NotFound)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::RegistrationFields;
    use coursereg_core::Email;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn fields() -> RegistrationFields {
        RegistrationFields {
            full_name: "Jane Doe".to_string(),
            email: Email::parse("jane@x.com").unwrap(),
            phone: "+15551234567".to_string(),
            organization: None,
            job_title: None,
            street_address: None,
            city: None,
            country: None,
            heard_about_us: None,
            future_interests: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_redeem_then_repeat() {
        let store = MemoryStore::new();
        let token = VerificationToken::generate();
        let reg = store.insert(&fields(), &token).await.unwrap();
        let service = VerificationService::new(&store, Some(DAY));

        let first = service.redeem(token.as_str()).await.unwrap();
        assert_eq!(first, Redeemed::Verified(reg.id));
        let verified_at = store.list().await.unwrap()[0].verified_at;

        let second = service.redeem(token.as_str()).await.unwrap();
        assert_eq!(second, Redeemed::AlreadyVerified(reg.id));
        assert_eq!(store.list().await.unwrap()[0].verified_at, verified_at);
    }

    #[tokio::test]
    async fn test_unknown_token() {
        let store = MemoryStore::new();
        let service = VerificationService::new(&store, None);
        let err = service
            .redeem(VerificationToken::generate().as_str())
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::NotFound));
    }

    #[tokio::test]
    async fn test_malformed_token() {
        let store = MemoryStore::new();
        let service = VerificationService::new(&store, None);
        let err = service.redeem("x' OR 1=1 --").await.unwrap_err();
        assert!(matches!(err, VerificationError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_expired_token_leaves_row_unverified() {
        let store = MemoryStore::new();
        let token = VerificationToken::generate();
        let reg = store.insert(&fields(), &token).await.unwrap();
        store.set_registration_created_at(reg.id, Utc::now() - chrono::Duration::hours(25));

        let err = VerificationService::new(&store, Some(DAY))
            .redeem(token.as_str())
            .await
            .unwrap_err();
        assert!(matches!(err, VerificationError::Expired));
        assert!(!store.list().await.unwrap()[0].verified);

        // Without a window the same token still works.
        let ok = VerificationService::new(&store, None)
            .redeem(token.as_str())
            .await
            .unwrap();
        assert_eq!(ok, Redeemed::Verified(reg.id));
    }
}
