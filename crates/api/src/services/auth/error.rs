//! Authentication error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors that can occur during admin authentication and account management.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] coursereg_core::EmailError),

    /// Invalid credentials (wrong password or admin not found).
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Current password proof did not match.
    #[error("current password is incorrect")]
    WrongCurrentPassword,

    /// Admin not found.
    #[error("admin not found")]
    AdminNotFound,

    /// Missing or malformed input.
    #[error("{0}")]
    InvalidInput(String),

    /// An admin tried to delete their own account.
    #[error("cannot delete your own account")]
    SelfDelete,

    /// Repository/database error.
    #[error("{0}")]
    Repository(#[from] RepositoryError),

    /// Password hashing error.
    #[error("password hashing error")]
    PasswordHash,

    /// Claim signing error.
    #[error("token signing error: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}
