//! Redis-backed services: token revocation lookups and upgrade rate limiting.

use redis::AsyncCommands;

/// Redis key prefix for revoked JWT ids, written by the auth service on logout.
const BLACKLIST_PREFIX: &str = "ivm:blacklist:";

/// Redis key prefix for rate limiting.
const RATE_PREFIX: &str = "ivm:rate:";

// ─── JWT Token Blacklist ─────────────────────────────────────

/// Check if a token ID has been revoked. Lookup failures count as not revoked.
pub async fn is_token_blacklisted(redis: &mut redis::aio::ConnectionManager, jti: &str) -> bool {
    let key = format!("{}{}", BLACKLIST_PREFIX, jti);
    redis.exists::<_, bool>(&key).await.unwrap_or(false)
}

// ─── Rate Limiting ───────────────────────────────────────────

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    pub allowed: bool,
    pub remaining: u64,
    pub limit: u64,
}

impl RateLimitResult {
    fn from_count(count: u64, max_requests: u64) -> Self {
        Self {
            allowed: count <= max_requests,
            remaining: max_requests.saturating_sub(count),
            limit: max_requests,
        }
    }
}

/// Check and increment a fixed-window rate limit counter.
///
/// - `identifier`: usually the client IP address
/// - `endpoint`: the endpoint being rate-limited (e.g. "ws_upgrade")
/// - `max_requests`: maximum allowed requests in the window
/// - `window_secs`: window size in seconds
pub async fn check_rate_limit(
    redis: &mut redis::aio::ConnectionManager,
    identifier: &str,
    endpoint: &str,
    max_requests: u64,
    window_secs: u64,
) -> RateLimitResult {
    let key = format!("{}{}:{}", RATE_PREFIX, endpoint, identifier);

    let count: u64 = match redis.incr::<_, _, u64>(&key, 1u64).await {
        Ok(c) => c,
        Err(e) => {
            // Fail open: a Redis outage must not lock every client out.
            tracing::warn!("Rate limit check failed, allowing request: {}", e);
            return RateLimitResult::from_count(0, max_requests);
        }
    };

    // Set expiry only on first increment
    if count == 1 {
        let _ = redis.expire::<_, ()>(&key, window_secs as i64).await;
    }

    RateLimitResult::from_count(count, max_requests)
}
