//! End-to-end tests for the course registration API.
//!
//! Each test spawns the real router on an ephemeral port, backed by the
//! in-memory store and a recording mailer, and talks to it over HTTP.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p coursereg-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `registration_flow` - Sign-up, verification, and registration management
//! - `admin_authz` - Login, seeding, and admin account management

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::missing_panics_doc)]

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use secrecy::SecretString;
use serde_json::{Value, json};
use url::Url;

use coursereg_api::config::AppConfig;
use coursereg_api::db::MemoryStore;
use coursereg_api::middleware::{AttemptLimiter, KeyedAttemptLimiter, Unlimited};
use coursereg_api::services::{MailerError, NotificationService, VerificationMailer};
use coursereg_api::state::AppState;
use coursereg_core::Email;

/// Email the seed path turns into a super-admin.
pub const BOOTSTRAP_EMAIL: &str = "root@example.com";

/// Password used for every seeded test admin.
pub const ADMIN_PASSWORD: &str = "correct horse battery staple";

/// One verification email captured by [`RecordingMailer`].
#[derive(Debug, Clone)]
pub struct SentEmail {
    pub to: String,
    pub full_name: String,
    pub link: Url,
    pub expires_in_hours: Option<u64>,
}

impl SentEmail {
    /// The `token` query parameter of the verification link.
    pub fn token(&self) -> String {
        token_from_link(self.link.as_str())
    }
}

/// Mailer that records messages instead of sending them.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
    failing: bool,
}

impl RecordingMailer {
    /// A mailer whose every send fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl VerificationMailer for RecordingMailer {
    async fn send_verification(
        &self,
        to: &Email,
        full_name: &str,
        link: &Url,
        expires_in_hours: Option<u64>,
    ) -> Result<(), MailerError> {
        if self.failing {
            return Err(MailerError::InvalidAddress("relay unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(SentEmail {
                to: to.to_string(),
                full_name: full_name.to_string(),
                link: link.clone(),
                expires_in_hours,
            });
        Ok(())
    }
}

/// Extract the `token` query parameter from a verification link.
pub fn token_from_link(link: &str) -> String {
    Url::parse(link)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "token")
        .map(|(_, v)| v.into_owned())
        .expect("verification link has a token")
}

/// Knobs for a test server.
pub struct TestAppBuilder {
    seed_token: Option<String>,
    verification_ttl: Option<Duration>,
    verify_rate_limit: Option<u32>,
    mailer: Option<Arc<RecordingMailer>>,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self {
            seed_token: None,
            verification_ttl: Some(Duration::from_secs(24 * 3600)),
            verify_rate_limit: None,
            mailer: Some(Arc::new(RecordingMailer::default())),
        }
    }
}

impl TestAppBuilder {
    /// Require this `x-seed-token` on the seed route.
    pub fn seed_token(mut self, token: &str) -> Self {
        self.seed_token = Some(token.to_string());
        self
    }

    /// Throttle verification to `attempts` per minute per client.
    pub const fn verify_rate_limit(mut self, attempts: u32) -> Self {
        self.verify_rate_limit = Some(attempts);
        self
    }

    /// Issue links that never expire.
    pub const fn without_expiry(mut self) -> Self {
        self.verification_ttl = None;
        self
    }

    /// Run without a mail relay.
    pub fn without_email(mut self) -> Self {
        self.mailer = None;
        self
    }

    /// Use a mail relay that rejects every message.
    pub fn failing_email(mut self) -> Self {
        self.mailer = Some(Arc::new(RecordingMailer::failing()));
        self
    }

    pub async fn spawn(self) -> TestApp {
        let config = AppConfig {
            database_url: SecretString::from("postgres://unused/unused"),
            host: [127, 0, 0, 1].into(),
            port: 0,
            base_url: Url::parse("http://course.test").unwrap(),
            jwt_secret: SecretString::from("integration-test-secret-integration-test-secret"),
            bootstrap_email: Email::parse_normalized(BOOTSTRAP_EMAIL).unwrap(),
            seed_token: self.seed_token.map(SecretString::from),
            verification_ttl: self.verification_ttl,
            verify_rate_limit: NonZeroU32::new(self.verify_rate_limit.unwrap_or(100)).unwrap(),
            email: None,
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
        };

        let limiter: Arc<dyn AttemptLimiter> = match self.verify_rate_limit {
            Some(n) => Arc::new(KeyedAttemptLimiter::per_minute(NonZeroU32::new(n).unwrap())),
            None => Arc::new(Unlimited),
        };
        let notifications = NotificationService::new(
            self.mailer
                .clone()
                .map(|m| m as Arc<dyn VerificationMailer>),
        )
        .with_link_ttl(self.verification_ttl);

        let store = Arc::new(MemoryStore::new());
        let state = AppState::with_services(
            config,
            store.clone(),
            store.clone(),
            limiter,
            notifications,
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = coursereg_api::app(state);
        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .unwrap();
        });

        TestApp {
            base_url: format!("http://{addr}"),
            client: Client::new(),
            store,
            mailer: self.mailer,
        }
    }
}

/// A running API server.
pub struct TestApp {
    pub base_url: String,
    pub client: Client,
    pub store: Arc<MemoryStore>,
    pub mailer: Option<Arc<RecordingMailer>>,
}

impl TestApp {
    /// Server with a recording mailer and no verification throttling.
    pub async fn spawn() -> Self {
        TestAppBuilder::default().spawn().await
    }

    pub fn builder() -> TestAppBuilder {
        TestAppBuilder::default()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Emails captured so far.
    pub fn sent_emails(&self) -> Vec<SentEmail> {
        self.mailer.as_ref().map(|m| m.sent()).unwrap_or_default()
    }

    pub async fn post(&self, path: &str, body: &Value) -> Response {
        self.client.post(self.url(path)).json(body).send().await.unwrap()
    }

    pub async fn post_as(&self, token: &str, path: &str, body: &Value) -> Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn put_as(&self, token: &str, path: &str, body: &Value) -> Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    pub async fn get_as(&self, token: &str, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    pub async fn delete_as(&self, token: &str, path: &str) -> Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    /// Submit the public sign-up form.
    pub async fn register(&self, full_name: &str, email: &str) -> Response {
        self.post(
            "/api/register",
            &json!({
                "fullName": full_name,
                "email": email,
                "phone": "+1 555 0100",
                "organization": "Acme",
                "futureInterests": ["rust", "databases"],
            }),
        )
        .await
    }

    pub async fn verify(&self, token: &str) -> Response {
        self.post("/api/verify-email", &json!({ "token": token })).await
    }

    /// Seed an admin through the HTTP seed route.
    pub async fn seed(&self, email: &str) -> Response {
        self.post(
            "/api/admin/seed",
            &json!({ "email": email, "password": ADMIN_PASSWORD }),
        )
        .await
    }

    /// Log in and return the bearer claim.
    pub async fn login(&self, email: &str, password: &str) -> String {
        let resp = self
            .post(
                "/api/admin/login",
                &json!({ "email": email, "password": password }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::OK, "login as {email} failed");
        let body: Value = resp.json().await.unwrap();
        body["token"].as_str().unwrap().to_string()
    }

    /// Seed the bootstrap super-admin and log in as them.
    pub async fn super_admin(&self) -> String {
        assert_eq!(self.seed(BOOTSTRAP_EMAIL).await.status(), StatusCode::OK);
        self.login(BOOTSTRAP_EMAIL, ADMIN_PASSWORD).await
    }

    /// Grant plain admin access as `super_token`, then log in as the new admin.
    pub async fn plain_admin(&self, super_token: &str, email: &str) -> String {
        let resp = self
            .post_as(
                super_token,
                "/api/admin/grant",
                &json!({ "email": email, "password": ADMIN_PASSWORD }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        self.login(email, ADMIN_PASSWORD).await
    }
}

/// Status and JSON body of a response.
pub async fn status_and_json(resp: Response) -> (StatusCode, Value) {
    let status = resp.status();
    let body = resp.json().await.unwrap_or(Value::Null);
    (status, body)
}
