//! Course registration core - shared domain types.
//!
//! This crate provides the types used across all course registration components:
//! - `api` - Public registration, email verification, and the admin JSON API
//! - `cli` - Command-line tools for migrations and admin bootstrapping
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Database encoding is opt-in through the `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, email addresses, and verification tokens

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
