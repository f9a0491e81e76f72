//! HTTP middleware and request extractors.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, HTTP context)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (permissive)

pub mod auth;
pub mod rate_limit;
pub mod request_id;

pub use auth::{RequireAdmin, RequireSuperAdmin};
pub use rate_limit::{AllowedAttempt, AttemptLimiter, KeyedAttemptLimiter, Unlimited};
pub use request_id::{RequestId, request_id_middleware};
