//! API configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `COURSEREG_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `COURSEREG_JWT_SECRET` - Claim signing secret (min 32 chars, high entropy)
//! - `COURSEREG_BOOTSTRAP_EMAIL` - The only email the seed path makes a super-admin
//!
//! ## Optional
//! - `COURSEREG_HOST` - Bind address (default: 127.0.0.1)
//! - `COURSEREG_PORT` - Listen port (default: 3000)
//! - `COURSEREG_BASE_URL` - Public URL used in verification links (default: http://localhost:3000)
//! - `COURSEREG_ADMIN_SEED_TOKEN` - When set, `POST /api/admin/seed` requires a matching `x-seed-token` header
//! - `COURSEREG_VERIFICATION_TTL_HOURS` - Verification link lifetime (default: 24, `0` disables expiry)
//! - `COURSEREG_VERIFY_RATE_LIMIT` - Verification attempts per minute per address (default: 10)
//! - `COURSEREG_LOG_JSON` - Emit JSON logs when set
//! - `SMTP_LOGIN` / `SMTP_PASSWORD` - Mail relay credentials; email is disabled when either is missing
//! - `SMTP_HOST` - Mail relay host (default: smtp-relay.brevo.com)
//! - `SMTP_PORT` - Mail relay port (default: 587)
//! - `SMTP_FROM` - Sender address
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::time::Duration;

use coursereg_core::Email;
use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_JWT_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_SMTP_FROM: &str = "Digital Skills Training <noreply@example.com>";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "change-me",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// API configuration, assembled once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL, used to build verification links
    pub base_url: Url,
    /// Claim signing secret
    pub jwt_secret: SecretString,
    /// Email that the seed path grants super-admin
    pub bootstrap_email: Email,
    /// Shared secret guarding the seed endpoint
    pub seed_token: Option<SecretString>,
    /// Verification link lifetime, `None` for no expiry
    pub verification_ttl: Option<Duration>,
    /// Verification attempts allowed per minute per client address
    pub verify_rate_limit: NonZeroU32,
    /// Mail relay settings, `None` when credentials are absent
    pub email: Option<EmailConfig>,
    /// Emit JSON-formatted logs
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
}

/// SMTP relay configuration.
///
/// Implements `Debug` manually to redact the password.
#[derive(Clone)]
pub struct EmailConfig {
    /// SMTP server hostname
    pub smtp_host: String,
    /// SMTP server port
    pub smtp_port: u16,
    /// SMTP authentication username
    pub smtp_username: String,
    /// SMTP authentication password
    pub smtp_password: SecretString,
    /// Email sender address (From header)
    pub from_address: String,
}

impl std::fmt::Debug for EmailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailConfig")
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field("smtp_username", &self.smtp_username)
            .field("smtp_password", &"[REDACTED]")
            .field("from_address", &self.from_address)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if the JWT secret fails validation (length, placeholder, entropy).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("COURSEREG_DATABASE_URL")?;
        let host = parse_env("COURSEREG_HOST", "127.0.0.1")?;
        let port = parse_env("COURSEREG_PORT", "3000")?;
        let base_url = parse_env("COURSEREG_BASE_URL", "http://localhost:3000")?;

        let jwt_secret = get_validated_secret("COURSEREG_JWT_SECRET")?;
        validate_secret_length(&jwt_secret, "COURSEREG_JWT_SECRET")?;

        let bootstrap_email = Email::parse_normalized(&get_required_env(
            "COURSEREG_BOOTSTRAP_EMAIL",
        )?)
        .map_err(|e| {
            ConfigError::InvalidEnvVar("COURSEREG_BOOTSTRAP_EMAIL".to_string(), e.to_string())
        })?;

        let seed_token = get_optional_env("COURSEREG_ADMIN_SEED_TOKEN").map(SecretString::from);

        let ttl_hours: u64 = parse_env("COURSEREG_VERIFICATION_TTL_HOURS", "24")?;
        let verification_ttl = (ttl_hours > 0).then(|| Duration::from_secs(ttl_hours * 3600));

        let verify_rate_limit = parse_env("COURSEREG_VERIFY_RATE_LIMIT", "10")?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            jwt_secret,
            bootstrap_email,
            seed_token,
            verification_ttl,
            verify_rate_limit,
            email: EmailConfig::from_env()?,
            log_json: get_optional_env("COURSEREG_LOG_JSON").is_some(),
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl EmailConfig {
    /// Returns `None` when the relay login or password is missing; email
    /// delivery is then disabled and links are returned to the caller.
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let (Some(smtp_username), Some(smtp_password)) =
            (get_optional_env("SMTP_LOGIN"), get_optional_env("SMTP_PASSWORD"))
        else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host: get_env_or_default("SMTP_HOST", "smtp-relay.brevo.com"),
            smtp_port: parse_env("SMTP_PORT", "587")?,
            smtp_username,
            smtp_password: SecretString::from(smtp_password),
            from_address: get_env_or_default("SMTP_FROM", DEFAULT_SMTP_FROM),
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL`.
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional, non-empty environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env_or_default(key, default)
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Validate that a signing secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_JWT_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_JWT_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_shannon_entropy_edges() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_rejects_original_default() {
        let err = validate_secret_strength("change-me", "COURSEREG_JWT_SECRET").unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength(&"ab".repeat(20), "COURSEREG_JWT_SECRET");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length() {
        assert!(validate_secret_length(&SecretString::from("short"), "TEST").is_err());
        assert!(validate_secret_length(&SecretString::from("k".repeat(32)), "TEST").is_ok());
    }

    #[test]
    fn test_email_config_debug_redacts_password() {
        let config = EmailConfig {
            smtp_host: "smtp-relay.brevo.com".to_string(),
            smtp_port: 587,
            smtp_username: "relay-login".to_string(),
            smtp_password: SecretString::from("super_secret_smtp_password"),
            from_address: DEFAULT_SMTP_FROM.to_string(),
        };

        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("relay-login"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("super_secret_smtp_password"));
    }
}
