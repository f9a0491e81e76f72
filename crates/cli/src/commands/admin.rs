//! Admin account commands.
//!
//! # Usage
//!
//! ```bash
//! # Create or reset the bootstrap super-admin
//! cr-cli admin seed --password 'S3cret!'
//!
//! # Give someone plain admin access
//! cr-cli admin grant --email staff@example.com --password 'S3cret!'
//! ```
//!
//! # Environment Variables
//!
//! - `COURSEREG_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//! - `COURSEREG_BOOTSTRAP_EMAIL` - The only email `seed` makes a super-admin

use coursereg_api::db::{PgStore, create_pool};
use coursereg_api::services::{AdminAuthService, AuthError};
use coursereg_core::Email;

use super::{CommandError, database_url};

async fn store() -> Result<PgStore, CommandError> {
    let url = database_url()?;
    tracing::info!("Connecting to database...");
    Ok(PgStore::new(create_pool(&url).await?))
}

fn bootstrap_email() -> Result<Email, CommandError> {
    let raw = std::env::var("COURSEREG_BOOTSTRAP_EMAIL")
        .map_err(|_| CommandError::MissingEnvVar("COURSEREG_BOOTSTRAP_EMAIL"))?;
    Email::parse_normalized(&raw)
        .map_err(|e| CommandError::Auth(AuthError::InvalidEmail(e)))
}

/// Upsert an admin through the seed path.
///
/// `email` defaults to the bootstrap email, which is the only one that ends
/// up a super-admin.
///
/// # Errors
///
/// Returns an error for missing configuration, bad input, or storage failure.
pub async fn seed(email: Option<&str>, password: &str) -> Result<(), CommandError> {
    let bootstrap = bootstrap_email()?;
    let email = email.unwrap_or(bootstrap.as_str());

    let store = store().await?;
    let admin = AdminAuthService::new(&store)
        .seed(email, password, &bootstrap)
        .await?;

    tracing::info!(
        "Admin seeded. ID: {}, Email: {}, Super admin: {}",
        admin.id,
        admin.email,
        admin.is_superadmin
    );
    Ok(())
}

/// Grant plain admin access.
///
/// # Errors
///
/// Returns an error for missing configuration, bad input, or storage failure.
pub async fn grant(email: &str, password: &str) -> Result<(), CommandError> {
    let store = store().await?;
    let admin = AdminAuthService::new(&store)
        .grant(email, password)
        .await?;

    tracing::info!(
        "Admin access granted. ID: {}, Email: {}, Super admin: {}",
        admin.id,
        admin.email,
        admin.is_superadmin
    );
    Ok(())
}
