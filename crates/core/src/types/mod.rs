//! Core types for course registration.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod token;

pub use email::{Email, EmailError};
pub use id::*;
pub use token::{TokenError, VerificationToken};
