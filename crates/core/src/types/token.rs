//! Email verification tokens.
//!
//! A token is issued once per registration and redeemed at most once. Inbound
//! tokens are validated here, before anything touches storage.

use core::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Errors returned when an inbound token is malformed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Token length is outside the accepted bounds.
    #[error("verification token must be between {min} and {max} characters")]
    Length {
        /// Minimum accepted length.
        min: usize,
        /// Maximum accepted length.
        max: usize,
    },
    /// Token contains a character outside `[A-Za-z0-9-]`.
    #[error("verification token contains invalid characters")]
    InvalidCharacter,
}

/// An opaque, single-use email verification token.
///
/// Issued tokens are random v4 UUIDs in hyphenated form. Parsed tokens only
/// need to fit the accepted shape; whether they exist is a storage question.
///
/// ```
/// use coursereg_core::VerificationToken;
///
/// let token = VerificationToken::generate();
/// assert_eq!(token.as_str().len(), 36);
///
/// assert!(VerificationToken::parse("short").is_err());
/// assert!(VerificationToken::parse("abc$def1234").is_err());
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VerificationToken(String);

impl VerificationToken {
    /// Shortest token accepted at the boundary.
    pub const MIN_LENGTH: usize = 10;
    /// Longest token accepted at the boundary.
    pub const MAX_LENGTH: usize = 100;

    /// Issue a fresh random token.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().hyphenated().to_string())
    }

    /// Validate an inbound token.
    ///
    /// # Errors
    ///
    /// Returns [`TokenError::Length`] when the token is shorter than 10 or
    /// longer than 100 characters, and [`TokenError::InvalidCharacter`] when
    /// it contains anything other than ASCII letters, digits, and `-`.
    pub fn parse(s: &str) -> Result<Self, TokenError> {
        if !(Self::MIN_LENGTH..=Self::MAX_LENGTH).contains(&s.len()) {
            return Err(TokenError::Length {
                min: Self::MIN_LENGTH,
                max: Self::MAX_LENGTH,
            });
        }

        if !s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err(TokenError::InvalidCharacter);
        }

        Ok(Self(s.to_owned()))
    }

    /// Returns the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercase hex SHA-256 of the token.
    ///
    /// Stored once the token is redeemed so a repeat redemption can be
    /// recognised without keeping the token itself.
    #[must_use]
    pub fn digest(&self) -> String {
        hex::encode(Sha256::digest(self.0.as_bytes()))
    }
}

// Tokens are bearer secrets; keep them out of logs.
impl fmt::Debug for VerificationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VerificationToken([REDACTED])")
    }
}

impl AsRef<str> for VerificationToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
