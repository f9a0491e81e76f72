//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! cr-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `COURSEREG_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! `crates/api/migrations/`:
//! ```text
//! migrations/
//! ├── 20260101000001_create_admins.sql
//! └── 20260101000002_create_registrations.sql
//! ```

use super::{CommandError, database_url};

/// Run all pending migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), CommandError> {
    let url = database_url()?;

    tracing::info!("Connecting to database...");
    let pool = coursereg_api::db::create_pool(&url).await?;

    tracing::info!("Running migrations...");
    sqlx::migrate!("../api/migrations").run(&pool).await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
