//! Domain models for the registration API.

pub mod admin;
pub mod registration;

pub use admin::{Admin, AdminCredentials};
pub use registration::{Registration, RegistrationFields};
