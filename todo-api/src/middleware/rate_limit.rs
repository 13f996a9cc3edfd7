/// Rate limiting middleware
///
/// Fixed-window ceilings per client address, checked before authentication so
/// a rejected request never reaches a handler.
///
/// # Route Groups
///
/// - **Users** (`POST /users`, `GET /users/token`): one shared ceiling,
///   `USERS_RATE` (default 40/day), key `users:{ip}`
/// - **Todos**: `DEFAULT_RATE` (default 100/hour) counted separately for
///   POST, PUT and DELETE, key `todos:{METHOD}:{ip}`. GET is never limited.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: Requests allowed per window
/// - `X-RateLimit-Remaining`: Requests left in the current window
/// - `X-RateLimit-Reset`: Unix timestamp when the window ends
/// - `Retry-After`: Seconds to wait (429 responses only)
///
/// # Client Address
///
/// The peer address, else `unknown`. With `TRUST_FORWARDED_FOR` set, the first
/// `X-Forwarded-For` entry wins; that header is client-controlled unless a
/// proxy in front rewrites it.

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::Duration;
use todo_shared::rate_limit::{RateLimit, RateLimitDecision};

/// Ceiling for the users route group
pub async fn users_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let address = client_address(&request, state.config.rate_limit.trust_forwarded_for);
    let key = format!("users:{}", address);
    let limit = state.config.rate_limit.users;

    enforce(&state, &key, &limit, request, next).await
}

/// Per-method ceiling for todo mutations
pub async fn todos_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !is_limited_method(request.method()) {
        return Ok(next.run(request).await);
    }

    let address = client_address(&request, state.config.rate_limit.trust_forwarded_for);
    let key = format!("todos:{}:{}", request.method(), address);
    let limit = state.config.rate_limit.todos;

    enforce(&state, &key, &limit, request, next).await
}

async fn enforce(
    state: &AppState,
    key: &str,
    limit: &RateLimit,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match state.limiter.check(key, limit).await? {
        RateLimitDecision::Exceeded { retry_after } => Err(ApiError::RateLimitExceeded {
            retry_after: whole_seconds(retry_after),
            message: format!("Too many requests: limit is {}", limit),
        }),
        RateLimitDecision::Allowed {
            remaining,
            reset_after,
        } => {
            let mut response = next.run(request).await;
            insert_limit_headers(response.headers_mut(), limit, remaining, reset_after);
            Ok(response)
        }
    }
}

fn is_limited_method(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::DELETE)
}

/// Resolves the address a request is counted against
pub fn client_address(request: &Request, trust_forwarded_for: bool) -> String {
    if let Some(forwarded) = trust_forwarded_for
        .then(|| request.headers().get("X-Forwarded-For"))
        .flatten()
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn insert_limit_headers(headers: &mut HeaderMap, limit: &RateLimit, remaining: u64, reset_after: Duration) {
    let reset_at = chrono::Utc::now().timestamp() as u64 + whole_seconds(reset_after);

    headers.insert("X-RateLimit-Limit", HeaderValue::from(limit.max_requests));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(reset_at));
}

/// Rounds up to whole seconds, never below one
fn whole_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs() + u64::from(duration.subsec_nanos() > 0);
    secs.max(1)
}
