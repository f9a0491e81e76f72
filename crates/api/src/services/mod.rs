//! Business logic services.
//!
//! # Services
//!
//! - `auth` - Admin login, claims, and account management
//! - `email` - Verification email delivery via SMTP
//! - `verification` - One-time registration token redemption

pub mod auth;
pub mod email;
pub mod verification;

pub use auth::{AdminAuthService, AuthError, ClaimsManager};
pub use email::{MailerError, NotificationService, SmtpMailer, VerificationMailer};
pub use verification::{Redeemed, VerificationError, VerificationService};
