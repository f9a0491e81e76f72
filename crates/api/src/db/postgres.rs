//! `PostgreSQL` implementation of the store traits.
//!
//! Queries are parameterized runtime statements; every mutation is a single
//! statement so no partial state is ever left behind.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use coursereg_core::{AdminId, Email, RegistrationId, VerificationToken};

use super::{AdminStore, RegistrationStore, RepositoryError, RoleOnConflict};
use crate::models::{Admin, AdminCredentials, Registration, RegistrationFields};

const ADMIN_COLUMNS: &str = "id, email, is_superadmin, created_at";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for registration queries.
#[derive(Debug, sqlx::FromRow)]
struct RegistrationRow {
    id: Uuid,
    full_name: String,
    email: String,
    phone: String,
    organization: Option<String>,
    job_title: Option<String>,
    street_address: Option<String>,
    city: Option<String>,
    country: Option<String>,
    heard_about_us: Option<String>,
    future_interests: Vec<String>,
    verification_token: Option<String>,
    verified: bool,
    verified_at: Option<DateTime<Utc>>,
    redeemed_token_digest: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<RegistrationRow> for Registration {
    type Error = RepositoryError;

    fn try_from(row: RegistrationRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid registration email in database: {e}"))
        })?;

        Ok(Self {
            id: RegistrationId::new(row.id),
            full_name: row.full_name,
            email,
            phone: row.phone,
            organization: row.organization,
            job_title: row.job_title,
            street_address: row.street_address,
            city: row.city,
            country: row.country,
            heard_about_us: row.heard_about_us,
            future_interests: row.future_interests,
            verification_token: row.verification_token,
            verified: row.verified,
            verified_at: row.verified_at,
            redeemed_token_digest: row.redeemed_token_digest,
            created_at: row.created_at,
        })
    }
}

/// Internal row type for admin queries.
#[derive(Debug, sqlx::FromRow)]
struct AdminRow {
    id: Uuid,
    email: String,
    is_superadmin: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<AdminRow> for Admin {
    type Error = RepositoryError;

    fn try_from(row: AdminRow) -> Result<Self, Self::Error> {
        let email = Email::parse_normalized(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid admin email in database: {e}"))
        })?;

        Ok(Self {
            id: AdminId::new(row.id),
            email,
            is_superadmin: row.is_superadmin,
            created_at: row.created_at,
        })
    }
}

/// Internal row type for admin queries that need the password hash.
#[derive(Debug, sqlx::FromRow)]
struct AdminCredentialsRow {
    #[sqlx(flatten)]
    admin: AdminRow,
    password_hash: String,
}

impl TryFrom<AdminCredentialsRow> for AdminCredentials {
    type Error = RepositoryError;

    fn try_from(row: AdminCredentialsRow) -> Result<Self, Self::Error> {
        Ok(Self {
            admin: row.admin.try_into()?,
            password_hash: row.password_hash,
        })
    }
}

/// Map unique-constraint violations to `Conflict`.
fn conflict_on_unique(what: &'static str) -> impl FnOnce(sqlx::Error) -> RepositoryError {
    move |e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_unique_violation()
        {
            return RepositoryError::Conflict(format!("{what} already exists"));
        }
        RepositoryError::Database(e)
    }
}

// =============================================================================
// Store
// =============================================================================

/// Store backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl RegistrationStore for PgStore {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert(
        &self,
        fields: &RegistrationFields,
        token: &VerificationToken,
    ) -> Result<Registration, RepositoryError> {
        let row = sqlx::query_as::<_, RegistrationRow>(
            r"
            INSERT INTO registrations (
                full_name, email, phone, organization, job_title, street_address,
                city, country, heard_about_us, future_interests, verification_token, verified
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, FALSE)
            RETURNING *
            ",
        )
        .bind(&fields.full_name)
        .bind(fields.email.as_str())
        .bind(&fields.phone)
        .bind(fields.organization.as_deref())
        .bind(fields.job_title.as_deref())
        .bind(fields.street_address.as_deref())
        .bind(fields.city.as_deref())
        .bind(fields.country.as_deref())
        .bind(fields.heard_about_us.as_deref())
        .bind(&fields.future_interests)
        .bind(token.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(conflict_on_unique("verification token"))?;

        row.try_into()
    }

    async fn list(&self) -> Result<Vec<Registration>, RepositoryError> {
        let rows = sqlx::query_as::<_, RegistrationRow>(
            "SELECT * FROM registrations ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn update(
        &self,
        id: RegistrationId,
        fields: &RegistrationFields,
    ) -> Result<Option<Registration>, RepositoryError> {
        let row = sqlx::query_as::<_, RegistrationRow>(
            r"
            UPDATE registrations
            SET full_name = $1, email = $2, phone = $3, organization = $4, job_title = $5,
                street_address = $6, city = $7, country = $8, heard_about_us = $9,
                future_interests = $10
            WHERE id = $11
            RETURNING *
            ",
        )
        .bind(&fields.full_name)
        .bind(fields.email.as_str())
        .bind(&fields.phone)
        .bind(fields.organization.as_deref())
        .bind(fields.job_title.as_deref())
        .bind(fields.street_address.as_deref())
        .bind(fields.city.as_deref())
        .bind(fields.country.as_deref())
        .bind(fields.heard_about_us.as_deref())
        .bind(&fields.future_interests)
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn delete(&self, id: RegistrationId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM registrations WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn consume_token(
        &self,
        token: &VerificationToken,
        issued_after: Option<DateTime<Utc>>,
    ) -> Result<Option<RegistrationId>, RepositoryError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r"
            UPDATE registrations
            SET verified = TRUE,
                verified_at = NOW(),
                verification_token = NULL,
                redeemed_token_digest = $2
            WHERE verification_token = $1
              AND verified = FALSE
              AND ($3::timestamptz IS NULL OR created_at >= $3)
            RETURNING id
            ",
        )
        .bind(token.as_str())
        .bind(token.digest())
        .bind(issued_after)
        .fetch_optional(&self.pool)
        .await?;

        Ok(id.map(RegistrationId::new))
    }

    async fn find_by_token(
        &self,
        token: &VerificationToken,
    ) -> Result<Option<Registration>, RepositoryError> {
        let row = sqlx::query_as::<_, RegistrationRow>(
            "SELECT * FROM registrations WHERE verification_token = $1",
        )
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_redeemed_digest(
        &self,
        digest: &str,
    ) -> Result<Option<Registration>, RepositoryError> {
        let row = sqlx::query_as::<_, RegistrationRow>(
            "SELECT * FROM registrations WHERE redeemed_token_digest = $1 AND verified = TRUE",
        )
        .bind(digest)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }
}

#[async_trait]
impl AdminStore for PgStore {
    async fn find_by_email(
        &self,
        email: &Email,
    ) -> Result<Option<AdminCredentials>, RepositoryError> {
        let row = sqlx::query_as::<_, AdminCredentialsRow>(&format!(
            "SELECT {ADMIN_COLUMNS}, password_hash FROM admins WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn find_by_id(&self, id: AdminId) -> Result<Option<AdminCredentials>, RepositoryError> {
        let row = sqlx::query_as::<_, AdminCredentialsRow>(&format!(
            "SELECT {ADMIN_COLUMNS}, password_hash FROM admins WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    async fn list(&self) -> Result<Vec<Admin>, RepositoryError> {
        let rows = sqlx::query_as::<_, AdminRow>(&format!(
            "SELECT {ADMIN_COLUMNS} FROM admins ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn upsert(
        &self,
        email: &Email,
        password_hash: &str,
        is_superadmin: bool,
        on_conflict: RoleOnConflict,
    ) -> Result<Admin, RepositoryError> {
        let on_conflict_set = match on_conflict {
            RoleOnConflict::Overwrite => {
                "password_hash = EXCLUDED.password_hash, is_superadmin = EXCLUDED.is_superadmin"
            }
            RoleOnConflict::Keep => "password_hash = EXCLUDED.password_hash",
        };

        let row = sqlx::query_as::<_, AdminRow>(&format!(
            r"
            INSERT INTO admins (email, password_hash, is_superadmin)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE SET {on_conflict_set}
            RETURNING {ADMIN_COLUMNS}
            "
        ))
        .bind(email.as_str())
        .bind(password_hash)
        .bind(is_superadmin)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn update(
        &self,
        id: AdminId,
        email: Option<&Email>,
        password_hash: Option<&str>,
    ) -> Result<Option<Admin>, RepositoryError> {
        let row = sqlx::query_as::<_, AdminRow>(&format!(
            r"
            UPDATE admins
            SET email = COALESCE($1, email),
                password_hash = COALESCE($2, password_hash)
            WHERE id = $3
            RETURNING {ADMIN_COLUMNS}
            "
        ))
        .bind(email.map(Email::as_str))
        .bind(password_hash)
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(conflict_on_unique("admin email"))?;

        row.map(TryInto::try_into).transpose()
    }

    async fn delete(&self, id: AdminId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM admins WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
