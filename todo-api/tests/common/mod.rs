//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - In-memory or temp-file database setup
//! - Router construction with small rate limits
//! - Basic/token authorization headers
//! - Request helpers that decode JSON bodies

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, HeaderMap, Method, Request, StatusCode};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::Value;
use sqlx::SqlitePool;
use tempfile::TempDir;
use todo_api::app::{build_router, AppState};
use todo_api::config::{ApiConfig, AuthConfig, Config, DatabaseConfig, RateLimitConfig};
use todo_shared::db::migrations::run_migrations;
use todo_shared::db::pool::{create_pool, DatabaseConfig as PoolConfig};
use todo_shared::rate_limit::RateLimit;
use tower::Service as _;

pub const SECRET: &str = "integration-test-secret-at-least-32-bytes";

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: SqlitePool,
    pub app: axum::Router,
    pub config: Config,

    /// Keeps a file-backed database alive for the test
    _dir: Option<TempDir>,
}

/// Decoded response
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }
}

impl TestContext {
    /// Creates a context with limits high enough to never trigger
    pub async fn new() -> anyhow::Result<Self> {
        Self::with_limits(RateLimit::per_day(1000), RateLimit::per_hour(1000)).await
    }

    /// Creates a context with a fresh in-memory database and the given limits
    pub async fn with_limits(users: RateLimit, todos: RateLimit) -> anyhow::Result<Self> {
        let db = create_pool(PoolConfig::in_memory()).await?;
        Self::build(db, None, users, todos).await
    }

    /// Creates a context over a WAL database file with a multi-connection pool
    pub async fn file_backed() -> anyhow::Result<Self> {
        let dir = TempDir::new()?;
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("todos.db").display());
        let db = create_pool(PoolConfig::file(url)).await?;

        Self::build(db, Some(dir), RateLimit::per_day(1000), RateLimit::per_hour(1000)).await
    }

    async fn build(
        db: SqlitePool,
        dir: Option<TempDir>,
        users: RateLimit,
        todos: RateLimit,
    ) -> anyhow::Result<Self> {
        run_migrations(&db).await?;

        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: vec!["*".to_string()],
            },
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 1,
            },
            auth: AuthConfig {
                secret_key: SECRET.to_string(),
                token_ttl_seconds: 3600,
            },
            rate_limit: RateLimitConfig {
                todos,
                users,
                redis_url: None,
                trust_forwarded_for: true,
            },
        };

        let state = AppState::new(db.clone(), config.clone());
        let app = build_router(state);

        Ok(Self {
            db,
            app,
            config,
            _dir: dir,
        })
    }

    /// Sends a request with an optional Authorization header and JSON body
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        authorization: Option<&str>,
        json: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }

        let body = match json {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        self.call(builder.body(body).unwrap()).await
    }

    /// Sends a form-encoded request
    pub async fn send_form(
        &self,
        method: Method,
        uri: &str,
        authorization: Option<&str>,
        form: &str,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }

        self.call(builder.body(Body::from(form.to_string())).unwrap()).await
    }

    pub async fn call(&self, request: Request<Body>) -> TestResponse {
        let response = self.app.clone().call(request).await.unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    /// Registers a user through the API, asserting success
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Value {
        let response = self
            .send(
                Method::POST,
                "/api/v1/users",
                None,
                Some(serde_json::json!({
                    "username": username,
                    "email": email,
                    "password": password,
                    "verify_password": password,
                })),
            )
            .await;

        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.body);
        response.body
    }

    /// Fetches a token with Basic credentials, asserting success
    pub async fn token(&self, identifier: &str, password: &str) -> String {
        let response = self
            .send(
                Method::GET,
                "/api/v1/users/token",
                Some(&basic(identifier, password)),
                None,
            )
            .await;

        assert_eq!(response.status, StatusCode::OK, "{:?}", response.body);
        response.body["token"].as_str().unwrap().to_string()
    }
}

/// Basic authorization header value
pub fn basic(identifier: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", identifier, password)))
}

/// Bearer authorization header value
pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
