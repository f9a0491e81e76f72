//! Application state shared across handlers.

use std::sync::Arc;

use secrecy::ExposeSecret;

use crate::config::AppConfig;
use crate::db::{AdminStore, RegistrationStore};
use crate::middleware::rate_limit::{AttemptLimiter, KeyedAttemptLimiter};
use crate::services::auth::ClaimsManager;
use crate::services::email::NotificationService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc`. Storage, the attempt limiter,
/// and the mailer are injected so tests can swap them.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    registrations: Arc<dyn RegistrationStore>,
    admins: Arc<dyn AdminStore>,
    claims: ClaimsManager,
    limiter: Arc<dyn AttemptLimiter>,
    notifications: NotificationService,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Uses the SMTP relay from `config` and a per-address limiter sized by
    /// `config.verify_rate_limit`.
    #[must_use]
    pub fn new(
        config: AppConfig,
        registrations: Arc<dyn RegistrationStore>,
        admins: Arc<dyn AdminStore>,
    ) -> Self {
        let notifications = NotificationService::from_config(config.email.as_ref())
            .with_link_ttl(config.verification_ttl);
        let limiter = Arc::new(KeyedAttemptLimiter::per_minute(config.verify_rate_limit));
        Self::with_services(config, registrations, admins, limiter, notifications)
    }

    /// Create a state with explicit limiter and notification services.
    #[must_use]
    pub fn with_services(
        config: AppConfig,
        registrations: Arc<dyn RegistrationStore>,
        admins: Arc<dyn AdminStore>,
        limiter: Arc<dyn AttemptLimiter>,
        notifications: NotificationService,
    ) -> Self {
        let claims = ClaimsManager::new(config.jwt_secret.expose_secret().as_bytes());

        Self {
            inner: Arc::new(AppStateInner {
                config,
                registrations,
                admins,
                claims,
                limiter,
                notifications,
            }),
        }
    }

    /// Get a reference to the configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Registration storage.
    #[must_use]
    pub fn registrations(&self) -> &dyn RegistrationStore {
        self.inner.registrations.as_ref()
    }

    /// Admin storage.
    #[must_use]
    pub fn admins(&self) -> &dyn AdminStore {
        self.inner.admins.as_ref()
    }

    /// Claim issuer and validator.
    #[must_use]
    pub fn claims(&self) -> &ClaimsManager {
        &self.inner.claims
    }

    /// Verification attempt limiter.
    #[must_use]
    pub fn limiter(&self) -> &dyn AttemptLimiter {
        self.inner.limiter.as_ref()
    }

    /// Verification email sender.
    #[must_use]
    pub fn notifications(&self) -> &NotificationService {
        &self.inner.notifications
    }
}
