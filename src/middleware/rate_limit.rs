// Tier-keyed rate limiting over Redis
// One counter per (user, hour bucket): INCR, with TTL set on the first hit.
// Redis being unreachable admits the request; the limiter is telemetry, not
// an authorization gate.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use redis::AsyncCommands;
use serde_json::json;
use tracing::warn;

use crate::app::AppState;
use crate::app_config::RateLimitSettings;
use crate::middleware::auth::CurrentUser;
use crate::models::UserTier;

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let Some(CurrentUser(user)) = request.extensions().get::<CurrentUser>().cloned() else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized" })),
        )
            .into_response();
    };

    let settings = &state.config.rate_limit;
    let limit = limit_for_tier(settings, user.tier);
    let window_secs = settings.window.as_secs();
    let key = format!(
        "ratelimit:{}:{}",
        user.id,
        Utc::now().format("%Y-%m-%d-%H")
    );

    let mut conn = state.redis.connection();
    let count: i64 = match conn.incr(&key, 1).await {
        Ok(count) => count,
        Err(e) => {
            // Fail open: don't block requests on the telemetry path
            warn!(error = %e, "Rate limit store unreachable, admitting request");
            return next.run(request).await;
        }
    };

    if count == 1 {
        if let Err(e) = conn.expire::<_, ()>(&key, window_secs as i64).await {
            warn!(error = %e, "Failed to set rate limit window TTL");
        }
    }

    if count > limit as i64 {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "error": "Rate limit exceeded",
                "limit": limit,
                "window": format!("{}s", window_secs),
                "retry_after": window_secs,
            })),
        )
            .into_response();
    }

    let remaining = (limit as i64 - count).max(0);
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", header_value(limit as i64));
    headers.insert("X-RateLimit-Remaining", header_value(remaining));
    response
}

/// Requests allowed per window for a tier. Enterprise is not separately
/// configured and shares the pro limit.
pub fn limit_for_tier(settings: &RateLimitSettings, tier: UserTier) -> u32 {
    match tier {
        UserTier::Free => settings.free,
        UserTier::Pro | UserTier::Enterprise => settings.pro,
    }
}

fn header_value(n: i64) -> HeaderValue {
    HeaderValue::from_str(&n.to_string()).unwrap_or_else(|_| HeaderValue::from_static("0"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn settings() -> RateLimitSettings {
        RateLimitSettings {
            free: 10,
            pro: 100,
            window: Duration::from_secs(60),
        }
    }

    #[test]
    fn tier_limits() {
        let settings = settings();
        assert_eq!(limit_for_tier(&settings, UserTier::Free), 10);
        assert_eq!(limit_for_tier(&settings, UserTier::Pro), 100);
        assert_eq!(limit_for_tier(&settings, UserTier::Enterprise), 100);
    }
}
