//! Per-client attempt limiting for the verification endpoint.
//!
//! Handlers consult an [`AttemptLimiter`] from the application state, so the
//! in-process governor limiter can be replaced without touching routes.

use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::error::AppError;
use crate::state::AppState;

/// Key used when no client address can be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Checks between sweeps of idle client keys.
const PRUNE_EVERY: u64 = 1024;

/// Decides whether another attempt from a client is allowed.
pub trait AttemptLimiter: Send + Sync {
    /// Record an attempt for `key`; returns `false` when over quota.
    fn check(&self, key: &str) -> bool;
}

/// Governor-backed limiter keyed by client address.
///
/// Counters live in process memory and reset on restart. Keys whose quota has
/// fully replenished are dropped every [`PRUNE_EVERY`] checks, so a stream of
/// distinct addresses cannot grow the map without bound.
pub struct KeyedAttemptLimiter {
    limiter: DefaultKeyedRateLimiter<String>,
    checks: AtomicU64,
    prune_every: u64,
}

impl KeyedAttemptLimiter {
    /// Allow `attempts` per minute per key, all of them available at once.
    #[must_use]
    pub fn per_minute(attempts: NonZeroU32) -> Self {
        Self::with_quota(Quota::per_minute(attempts), PRUNE_EVERY)
    }

    fn with_quota(quota: Quota, prune_every: u64) -> Self {
        Self {
            limiter: RateLimiter::keyed(quota),
            checks: AtomicU64::new(0),
            prune_every: prune_every.max(1),
        }
    }

    /// Forget keys that are back at full quota.
    pub fn prune(&self) {
        let before = self.limiter.len();
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
        tracing::debug!(before, after = self.limiter.len(), "Pruned attempt limiter");
    }

    /// Number of client keys currently tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.limiter.len()
    }

    /// Whether no client keys are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.limiter.is_empty()
    }
}

impl AttemptLimiter for KeyedAttemptLimiter {
    fn check(&self, key: &str) -> bool {
        let seen = self.checks.fetch_add(1, Ordering::Relaxed) + 1;
        if seen % self.prune_every == 0 {
            self.prune();
        }

        let allowed = self.limiter.check_key(&key.to_owned()).is_ok();
        if !allowed {
            tracing::warn!(client = %key, "Verification attempts throttled");
        }
        allowed
    }
}

/// Limiter that never throttles.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unlimited;

impl AttemptLimiter for Unlimited {
    fn check(&self, _key: &str) -> bool {
        true
    }
}

// =============================================================================
// Client Key Extraction (Cloudflare + Fly.io)
// =============================================================================

/// Client key of a verification attempt that is within quota.
///
/// The key is the best-effort client address: Cloudflare's
/// `CF-Connecting-IP` first, then standard proxy headers, then the socket
/// peer. The attempt is counted before the body is read, so malformed
/// payloads use up quota too. Rejects with 429 when over quota.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedAttempt(pub String);

impl FromRequestParts<AppState> for AllowedAttempt {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip());
        let client = client_key(&parts.headers, peer);

        if !state.limiter().check(&client) {
            return Err(AppError::RateLimited);
        }
        Ok(Self(client))
    }
}

/// Resolve the client address from proxy headers or the socket peer.
#[must_use]
pub fn client_key(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    let header_ip = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.split(',').next())
            .and_then(|s| s.trim().parse::<IpAddr>().ok())
    };

    header_ip("cf-connecting-ip")
        .or_else(|| header_ip("x-forwarded-for"))
        .or_else(|| header_ip("x-real-ip"))
        .or_else(|| header_ip("fly-client-ip"))
        .or(peer)
        .map_or_else(|| UNKNOWN_CLIENT.to_string(), |ip| ip.to_string())
}
