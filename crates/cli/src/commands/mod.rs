//! CLI command implementations.

pub mod admin;
pub mod db;
pub mod migrate;

use secrecy::SecretString;
use thiserror::Error;

/// Errors shared by all commands.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Connection string could not be parsed.
    #[error("Invalid database URL: {0}")]
    InvalidUrl(String),

    /// Admin account operation failed.
    #[error("{0}")]
    Auth(#[from] coursereg_api::services::AuthError),
}

/// Database URL from `COURSEREG_DATABASE_URL`, falling back to `DATABASE_URL`.
pub fn database_url() -> Result<SecretString, CommandError> {
    dotenvy::dotenv().ok();

    std::env::var("COURSEREG_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("COURSEREG_DATABASE_URL"))
}
