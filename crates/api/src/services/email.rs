//! Verification email delivery.
//!
//! Uses SMTP via lettre with Askama templates. Delivery is best effort:
//! [`NotificationService::notify`] reports whether a message went out and
//! never fails the caller.

use std::sync::Arc;
use std::time::Duration;

use askama::Template;
use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;
use url::Url;

use coursereg_core::{Email, VerificationToken};

use crate::config::EmailConfig;

const VERIFY_SUBJECT: &str = "Verify your email for course registration";

/// HTML template for the verification email.
#[derive(Template)]
#[template(path = "email/verify_email.html")]
struct VerifyEmailHtml<'a> {
    full_name: &'a str,
    link: &'a str,
    expires_in: Option<&'a str>,
}

/// Plain text template for the verification email.
#[derive(Template)]
#[template(path = "email/verify_email.txt")]
struct VerifyEmailText<'a> {
    full_name: &'a str,
    link: &'a str,
    expires_in: Option<&'a str>,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum MailerError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Something that can deliver a verification link to a registrant.
#[async_trait]
pub trait VerificationMailer: Send + Sync {
    /// Send one verification email. `expires_in_hours` is `None` when the
    /// link never expires.
    async fn send_verification(
        &self,
        to: &Email,
        full_name: &str,
        link: &Url,
        expires_in_hours: Option<u64>,
    ) -> Result<(), MailerError>;
}

/// Human wording of a link lifetime, e.g. `24 hours`.
fn expiry_phrase(hours: u64) -> String {
    if hours == 1 {
        "1 hour".to_string()
    } else {
        format!("{hours} hours")
    }
}

/// SMTP relay mailer.
#[derive(Clone)]
pub struct SmtpMailer {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpMailer {
    /// Create a new mailer from configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the relay transport cannot be built.
    pub fn new(config: &EmailConfig) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
        })
    }
}

#[async_trait]
impl VerificationMailer for SmtpMailer {
    async fn send_verification(
        &self,
        to: &Email,
        full_name: &str,
        link: &Url,
        expires_in_hours: Option<u64>,
    ) -> Result<(), MailerError> {
        let link = link.as_str();
        let expires_in = expires_in_hours.map(expiry_phrase);
        let expires_in = expires_in.as_deref();
        let html = VerifyEmailHtml {
            full_name,
            link,
            expires_in,
        }
        .render()?;
        let text = VerifyEmailText {
            full_name,
            link,
            expires_in,
        }
        .render()?;

        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| MailerError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .as_str()
                .parse()
                .map_err(|_| MailerError::InvalidAddress(to.to_string()))?)
            .subject(VERIFY_SUBJECT)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html),
                    ),
            )?;

        self.mailer.send(email).await?;
        Ok(())
    }
}

/// Best-effort notification sender.
#[derive(Clone, Default)]
pub struct NotificationService {
    mailer: Option<Arc<dyn VerificationMailer>>,
    expires_in_hours: Option<u64>,
}

impl NotificationService {
    /// Wrap a mailer. `None` disables delivery.
    #[must_use]
    pub fn new(mailer: Option<Arc<dyn VerificationMailer>>) -> Self {
        Self {
            mailer,
            expires_in_hours: None,
        }
    }

    /// Tell recipients how long their link stays valid. `None` omits the
    /// expiry sentence.
    #[must_use]
    pub fn with_link_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.expires_in_hours = ttl.map(|ttl| ttl.as_secs().div_ceil(3600));
        self
    }

    /// Build from configuration; missing credentials or a broken relay
    /// setting disable delivery.
    #[must_use]
    pub fn from_config(config: Option<&EmailConfig>) -> Self {
        let mailer = config.and_then(|config| match SmtpMailer::new(config) {
            Ok(mailer) => Some(Arc::new(mailer) as Arc<dyn VerificationMailer>),
            Err(e) => {
                tracing::warn!(error = %e, "SMTP relay unavailable, email delivery disabled");
                None
            }
        });
        Self::new(mailer)
    }

    /// Whether a mailer is configured.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.mailer.is_some()
    }

    /// Try once to send the verification link. Returns whether it was sent.
    pub async fn notify(&self, to: &Email, full_name: &str, link: &Url) -> bool {
        let Some(mailer) = &self.mailer else {
            return false;
        };

        match mailer
            .send_verification(to, full_name, link, self.expires_in_hours)
            .await
        {
            Ok(()) => {
                tracing::info!(domain = %to.domain(), "Verification email sent");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, domain = %to.domain(), "Verification email failed");
                false
            }
        }
    }
}

/// Build `{base}/verify-email?token=<token>`.
#[must_use]
pub fn verification_link(base_url: &Url, token: &VerificationToken) -> Url {
    let mut link = base_url.clone();
    let path = format!("{}/verify-email", base_url.path().trim_end_matches('/'));
    link.set_path(&path);
    link.set_fragment(None);
    link.query_pairs_mut()
        .clear()
        .append_pair("token", token.as_str());
    link
}
