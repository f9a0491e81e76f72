//! Admin authentication service.
//!
//! Password login, claim issuance, and admin account management. Emails are
//! trimmed and lower-cased before every lookup or write.

mod claims;
mod error;
pub mod password;

pub use claims::{ADMIN_ROLE, CLAIM_TTL_SECS, Claims, ClaimsManager};
pub use error::AuthError;

use coursereg_core::{AdminId, Email};

use crate::db::{AdminStore, RoleOnConflict};
use crate::models::Admin;

use password::{hash_password, verify_against_dummy, verify_password};

/// A successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Signed bearer claim.
    pub token: String,
    /// The admin that logged in.
    pub admin: Admin,
}

/// Admin authentication service.
pub struct AdminAuthService<'a> {
    admins: &'a dyn AdminStore,
}

impl<'a> AdminAuthService<'a> {
    /// Create a new authentication service.
    #[must_use]
    pub const fn new(admins: &'a dyn AdminStore) -> Self {
        Self { admins }
    }

    // =========================================================================
    // Login
    // =========================================================================

    /// Login with email and password and issue a claim signed by `claims`.
    ///
    /// Unknown emails and wrong passwords fail identically.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email/password is wrong.
    pub async fn login(
        &self,
        claims: &ClaimsManager,
        email: &str,
        password: &str,
    ) -> Result<LoginOutcome, AuthError> {
        let credentials = match Email::parse_normalized(email) {
            Ok(email) => self.admins.find_by_email(&email).await?,
            Err(_) => None,
        };

        let Some(credentials) = credentials else {
            verify_against_dummy(password);
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password, &credentials.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let token = claims.issue(&credentials.admin)?;
        tracing::info!(admin_id = %credentials.admin.id, "Admin logged in");

        Ok(LoginOutcome {
            token,
            admin: credentials.admin,
        })
    }

    // =========================================================================
    // Account Creation
    // =========================================================================

    /// Create or reset an admin through the bootstrap path.
    ///
    /// Only `bootstrap_email` receives the super-admin flag. The flag and the
    /// password of an existing account are overwritten.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` or `AuthError::InvalidInput` for bad
    /// input, `AuthError::Repository` if the upsert fails.
    pub async fn seed(
        &self,
        email: &str,
        password: &str,
        bootstrap_email: &Email,
    ) -> Result<Admin, AuthError> {
        require_credentials(email, password)?;
        let email = Email::parse_normalized(email)?;

        let is_superadmin = email == *bootstrap_email;
        let hash = hash_password(password)?;
        let admin = self
            .admins
            .upsert(&email, &hash, is_superadmin, RoleOnConflict::Overwrite)
            .await?;

        tracing::info!(admin_id = %admin.id, is_superadmin, "Admin seeded");
        Ok(admin)
    }

    /// Grant admin access to an email.
    ///
    /// New accounts are never super-admins; an existing account only gets
    /// its password replaced.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidEmail` or `AuthError::InvalidInput` for bad
    /// input, `AuthError::Repository` if the upsert fails.
    pub async fn grant(&self, email: &str, password: &str) -> Result<Admin, AuthError> {
        require_credentials(email, password)?;
        let email = Email::parse_normalized(email)?;

        let hash = hash_password(password)?;
        let admin = self
            .admins
            .upsert(&email, &hash, false, RoleOnConflict::Keep)
            .await?;

        tracing::info!(admin_id = %admin.id, "Admin access granted");
        Ok(admin)
    }

    // =========================================================================
    // Account Management
    // =========================================================================

    /// Change the caller's own password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidInput` if either password is empty,
    /// `AuthError::AdminNotFound` if the account is gone, and
    /// `AuthError::WrongCurrentPassword` if the proof does not match.
    pub async fn change_password(
        &self,
        admin_id: AdminId,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if current_password.is_empty() || new_password.is_empty() {
            return Err(AuthError::InvalidInput(
                "missing current or new password".to_string(),
            ));
        }

        let credentials = self
            .admins
            .find_by_id(admin_id)
            .await?
            .ok_or(AuthError::AdminNotFound)?;

        if !verify_password(current_password, &credentials.password_hash) {
            return Err(AuthError::WrongCurrentPassword);
        }

        let hash = hash_password(new_password)?;
        self.admins
            .update(admin_id, None, Some(&hash))
            .await?
            .ok_or(AuthError::AdminNotFound)?;

        tracing::info!(admin_id = %admin_id, "Admin password changed");
        Ok(())
    }

    /// Change the email and/or password of any admin.
    ///
    /// Empty values count as absent.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidInput` when there is nothing to change,
    /// `AuthError::InvalidEmail` for a malformed email, and
    /// `AuthError::AdminNotFound` if no admin has this ID.
    pub async fn update_admin(
        &self,
        admin_id: AdminId,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<Admin, AuthError> {
        let email = email
            .filter(|e| !e.trim().is_empty())
            .map(Email::parse_normalized)
            .transpose()?;
        let password = password.filter(|p| !p.is_empty());

        if email.is_none() && password.is_none() {
            return Err(AuthError::InvalidInput("no changes".to_string()));
        }

        let hash = password.map(hash_password).transpose()?;
        let admin = self
            .admins
            .update(admin_id, email.as_ref(), hash.as_deref())
            .await?
            .ok_or(AuthError::AdminNotFound)?;

        tracing::info!(admin_id = %admin.id, "Admin updated");
        Ok(admin)
    }

    /// Delete an admin other than the caller.
    ///
    /// Deleting an ID that does not exist succeeds.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SelfDelete` if `target` is the caller.
    pub async fn delete_admin(&self, caller: AdminId, target: AdminId) -> Result<(), AuthError> {
        if caller == target {
            return Err(AuthError::SelfDelete);
        }

        if self.admins.delete(target).await? {
            tracing::info!(admin_id = %target, "Admin deleted");
        }
        Ok(())
    }

    /// All admins, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Repository` if the query fails.
    pub async fn list_admins(&self) -> Result<Vec<Admin>, AuthError> {
        Ok(self.admins.list().await?)
    }
}

fn require_credentials(email: &str, password: &str) -> Result<(), AuthError> {
    if email.trim().is_empty() || password.is_empty() {
        return Err(AuthError::InvalidInput(
            "missing email or password".to_string(),
        ));
    }
    Ok(())
}
