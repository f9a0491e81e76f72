//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                    - Liveness
//! GET    /health/ready              - Readiness (storage reachable)
//!
//! # Public
//! POST   /api/register              - Sign up for the course
//! POST   /api/verify-email          - Redeem a verification token (rate limited)
//!
//! # Admin auth
//! POST   /api/admin/login           - Exchange credentials for a bearer claim
//! POST   /api/admin/seed            - Bootstrap seeding (optional x-seed-token)
//! PUT    /api/admin/change-password - Change own password (admin)
//!
//! # Registrations
//! GET    /api/registrations         - List (admin)
//! POST   /api/registrations         - Create (super)
//! PUT    /api/registrations/{id}    - Update (super)
//! DELETE /api/registrations/{id}    - Delete (super)
//!
//! # Admins
//! GET    /api/admins                - List (super)
//! POST   /api/admin/grant           - Grant admin access (super)
//! PUT    /api/admin/{id}            - Update email/password (super)
//! DELETE /api/admin/{id}            - Delete, never self (super)
//! ```

pub mod admins;
pub mod auth;
pub mod public;
pub mod registrations;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
};

use crate::state::AppState;

/// All application routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .route("/api/register", post(public::register))
        .route("/api/verify-email", post(public::verify_email))
        .route("/api/admin/login", post(auth::login))
        .route("/api/admin/seed", post(auth::seed))
        .route("/api/admin/change-password", put(auth::change_password))
        .route("/api/admin/grant", post(admins::grant))
        .route(
            "/api/admin/{id}",
            put(admins::update).delete(admins::delete),
        )
        .route("/api/admins", get(admins::list))
        .route(
            "/api/registrations",
            get(registrations::list).post(registrations::create),
        )
        .route(
            "/api/registrations/{id}",
            put(registrations::update).delete(registrations::delete),
        )
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if storage is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.registrations().ping().await {
        Ok(()) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
