/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use todo_api::{app::AppState, config::Config};
/// use todo_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(DatabaseConfig::file(config.database.url.clone())).await?;
/// let state = AppState::new(pool, config);
/// let app = todo_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::Config,
    error::ApiError,
    middleware::rate_limit::{todos_rate_limit, users_rate_limit},
    routes,
};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use chrono::Duration;
use sqlx::SqlitePool;
use std::sync::Arc;
use todo_shared::{
    auth::{
        gate::{authenticate, Credentials},
        token::TokenAuthenticator,
    },
    rate_limit::RateLimiter,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,

    /// Application configuration
    pub config: Arc<Config>,

    /// Issues and verifies tokens
    pub tokens: TokenAuthenticator,

    /// Rate-limit counters
    pub limiter: RateLimiter,
}

impl AppState {
    /// Creates new application state with process-local rate-limit counters
    pub fn new(db: SqlitePool, config: Config) -> Self {
        Self::with_limiter(db, config, RateLimiter::in_memory())
    }

    /// Creates new application state with the given rate limiter
    pub fn with_limiter(db: SqlitePool, config: Config, limiter: RateLimiter) -> Self {
        let tokens = TokenAuthenticator::new(
            &config.auth.secret_key,
            Duration::seconds(config.auth.token_ttl_seconds),
        );

        Self {
            db,
            config: Arc::new(config),
            tokens,
            limiter,
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET /                        # Landing page (public)
/// ├── GET /health                  # Health check (public)
/// └── /api/v1/
///     ├── POST   /users            # Register          [users limit]
///     ├── GET    /users/token      # Basic -> token    [users limit, auth]
///     ├── GET    /todos            # List              [auth]
///     ├── POST   /todos            # Create            [POST limit, auth]
///     ├── GET    /todos/:id        # Fetch             [auth]
///     ├── PUT    /todos/:id        # Update            [PUT limit, auth]
///     └── DELETE /todos/:id        # Delete            [DELETE limit, auth]
/// ```
///
/// # Middleware Stack
///
/// Outermost first:
/// 1. CORS (tower-http CorsLayer)
/// 2. Logging (tower-http TraceLayer)
/// 3. Rate limiting (per route group)
/// 4. Authentication (per route group)
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/", get(routes::index::index))
        .route("/health", get(routes::health::health_check));

    let token_route = Router::new()
        .route("/users/token", get(routes::users::issue_token))
        .route_layer(from_fn_with_state(state.clone(), auth_gate_layer));

    // The limiter wraps the auth gate so rejected requests never authenticate
    let user_routes = Router::new()
        .route("/users", post(routes::users::register))
        .merge(token_route)
        .route_layer(from_fn_with_state(state.clone(), users_rate_limit));

    let todo_routes = Router::new()
        .route(
            "/todos",
            get(routes::todos::list_todos).post(routes::todos::create_todo),
        )
        .route(
            "/todos/:id",
            get(routes::todos::get_todo)
                .put(routes::todos::update_todo)
                .delete(routes::todos::delete_todo),
        )
        .route_layer(from_fn_with_state(state.clone(), auth_gate_layer))
        .route_layer(from_fn_with_state(state.clone(), todos_rate_limit));

    let v1_routes = Router::new().merge(user_routes).merge(todo_routes);

    Router::new()
        .merge(public_routes)
        .nest("/api/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        // Development mode: permissive CORS
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .expose_headers([header::LOCATION, header::RETRY_AFTER])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Authentication middleware layer
///
/// Resolves Basic or token credentials from the Authorization header and
/// injects the `CurrentUser` into request extensions.
pub async fn auth_gate_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let credentials = Credentials::from_headers(req.headers())?;

    let current = authenticate(&state.db, &state.tokens, credentials)
        .await
        .map_err(|e| {
            if e.is_unauthorized() {
                tracing::debug!(error = %e, "Authentication failed");
            }
            ApiError::from(e)
        })?;

    req.extensions_mut().insert(current);

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, AuthConfig, DatabaseConfig, RateLimitConfig};
    use todo_shared::rate_limit::RateLimit;

    fn config_with_origins(origins: &[&str]) -> Config {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: origins.iter().map(|s| s.to_string()).collect(),
            },
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            auth: AuthConfig {
                secret_key: "test-secret-key-at-least-32-bytes-long".to_string(),
                token_ttl_seconds: 60,
            },
            rate_limit: RateLimitConfig {
                todos: RateLimit::per_hour(100),
                users: RateLimit::per_day(40),
                redis_url: None,
                trust_forwarded_for: false,
            },
        }
    }

    #[tokio::test]
    async fn test_app_state_uses_configured_ttl() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let state = AppState::new(pool, config_with_origins(&["*"]));

        assert_eq!(state.tokens.ttl(), Duration::seconds(60));
        assert_eq!(state.limiter.store_kind(), "memory");
    }

    #[test]
    fn test_cors_layer_builds_for_explicit_origins() {
        let _ = cors_layer(&config_with_origins(&["https://example.com", "not a header\n"]));
    }
}
