//! # Todo API Server
//!
//! Multi-user todo list JSON API.
//!
//! ## Architecture
//!
//! The API server is built with Axum and provides:
//! - User registration and token issuing
//! - Per-user todo CRUD under Basic or token authentication
//! - Fixed-window rate limiting, in memory or shared through Redis
//!
//! ## Usage
//!
//! ```bash
//! SECRET_KEY=$(openssl rand -hex 32) cargo run -p todo-api
//! ```

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use todo_api::{
    app::{build_router, AppState},
    config::Config,
};
use todo_shared::{
    db::{
        migrations::{ensure_database_exists, run_migrations},
        pool::{close_pool, create_pool, DatabaseConfig},
    },
    rate_limit::{MemoryCounterStore, RateLimiter, RedisCounterStore},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often ended in-memory rate-limit windows are dropped
const COUNTER_CLEANUP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(300);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    tracing::info!("Todo API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env().context("Failed to load configuration")?;

    ensure_database_exists(&config.database.url)
        .await
        .context("Failed to create database")?;

    let pool = create_pool(DatabaseConfig {
        max_connections: config.database.max_connections,
        ..DatabaseConfig::file(config.database.url.clone())
    })
    .await
    .context("Failed to connect to database")?;

    run_migrations(&pool).await.context("Failed to run migrations")?;

    let limiter = match &config.rate_limit.redis_url {
        Some(url) => {
            let store = RedisCounterStore::connect(url)
                .await
                .context("Failed to connect to Redis")?;
            RateLimiter::new(Arc::new(store))
        }
        None => {
            let store = MemoryCounterStore::new();
            spawn_counter_cleanup(store.clone());
            RateLimiter::new(Arc::new(store))
        }
    };

    tracing::info!(
        users = %config.rate_limit.users,
        todos = %config.rate_limit.todos,
        store = limiter.store_kind(),
        "Rate limits configured"
    );

    let bind_address = config.bind_address();
    let state = AppState::with_limiter(pool.clone(), config, limiter);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    close_pool(pool).await;
    tracing::info!("Server stopped");

    Ok(())
}

/// Initializes tracing; `LOG_FORMAT=json` switches to JSON lines
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "todo_api=debug,todo_shared=info,tower_http=debug".into());

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn spawn_counter_cleanup(store: MemoryCounterStore) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(COUNTER_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            store.cleanup();
            tracing::debug!(live_keys = store.len(), "Rate limit counters cleaned up");
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections...");
}
