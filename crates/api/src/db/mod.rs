//! Persistence layer.
//!
//! # Tables
//!
//! - `registrations` - Course sign-ups and their verification state
//! - `admins` - Admin accounts (lower-cased email, password hash, super-admin flag)
//!
//! Handlers never talk to a database directly. They go through the
//! [`RegistrationStore`] and [`AdminStore`] traits, implemented by
//! [`PgStore`] for `PostgreSQL` and [`MemoryStore`] for tests and local runs.
//!
//! # Migrations
//!
//! Migrations live in `crates/api/migrations/` and are applied via:
//! ```bash
//! cargo run -p coursereg-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use coursereg_core::{AdminId, Email, RegistrationId, VerificationToken};

use crate::models::{Admin, AdminCredentials, Registration, RegistrationFields};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// How an admin upsert treats the super-admin flag of an existing row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleOnConflict {
    /// Replace the stored flag (bootstrap seeding).
    Overwrite,
    /// Leave the stored flag alone, only replace the password (grant).
    Keep,
}

/// Storage for course registrations.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Check that the backing store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;

    /// Insert an unverified registration holding `token`.
    async fn insert(
        &self,
        fields: &RegistrationFields,
        token: &VerificationToken,
    ) -> Result<Registration, RepositoryError>;

    /// All registrations, newest first.
    async fn list(&self) -> Result<Vec<Registration>, RepositoryError>;

    /// Replace the editable fields of a registration.
    ///
    /// Returns `None` when no registration has this ID.
    async fn update(
        &self,
        id: RegistrationId,
        fields: &RegistrationFields,
    ) -> Result<Option<Registration>, RepositoryError>;

    /// Delete a registration. Returns whether a row was removed.
    async fn delete(&self, id: RegistrationId) -> Result<bool, RepositoryError>;

    /// Atomically mark the unverified registration holding `token` as
    /// verified, clear the token, and record its digest.
    ///
    /// Registrations created before `issued_after` are left untouched.
    /// Returns the ID of the verified registration, if any.
    async fn consume_token(
        &self,
        token: &VerificationToken,
        issued_after: Option<DateTime<Utc>>,
    ) -> Result<Option<RegistrationId>, RepositoryError>;

    /// The registration still holding `token`, if any.
    async fn find_by_token(
        &self,
        token: &VerificationToken,
    ) -> Result<Option<Registration>, RepositoryError>;

    /// The registration verified with the token whose digest is `digest`.
    async fn find_by_redeemed_digest(
        &self,
        digest: &str,
    ) -> Result<Option<Registration>, RepositoryError>;
}

/// Storage for admin accounts.
#[async_trait]
pub trait AdminStore: Send + Sync {
    /// Look up an admin and password hash by (already normalized) email.
    async fn find_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<AdminCredentials>, RepositoryError>;

    /// Look up an admin and password hash by ID.
    async fn find_by_id(&self, id: AdminId) -> Result<Option<AdminCredentials>, RepositoryError>;

    /// All admins, newest first.
    async fn list(&self) -> Result<Vec<Admin>, RepositoryError>;

    /// Insert an admin, or update the existing one with the same email.
    async fn upsert(
        &self,
        email: &Email,
        password_hash: &str,
        is_superadmin: bool,
        on_conflict: RoleOnConflict,
    ) -> Result<Admin, RepositoryError>;

    /// Change the email and/or password hash of an admin.
    ///
    /// Returns `None` when no admin has this ID.
    async fn update(
        &self,
        id: AdminId,
        email: Option<&Email>,
        password_hash: Option<&str>,
    ) -> Result<Option<Admin>, RepositoryError>;

    /// Delete an admin. Returns whether a row was removed.
    async fn delete(&self, id: AdminId) -> Result<bool, RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// Connections are checked out per query and returned on every exit path.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
