/// `GET /health`
///
/// Answers 200 while SQLite responds and 503 once it stops:
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": { "status": "connected", "connections": 1, "pending_migrations": 0 },
///   "rate_limit_store": "memory"
/// }
/// ```

use crate::app::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use todo_shared::db::{
    migrations::migration_status,
    pool::{health_check as ping_database, pool_stats},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseHealth {
    /// "connected" or "disconnected"
    pub status: String,
    pub connections: u32,
    pub pending_migrations: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ServiceStatus,
    pub version: String,
    pub database: DatabaseHealth,

    /// "memory" or "redis"
    pub rate_limit_store: String,
}

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let connected = match ping_database(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            false
        }
    };

    let pending_migrations = if connected {
        migration_status(&state.db).await.ok().map(|s| s.pending)
    } else {
        None
    };

    let (code, status) = if connected {
        (StatusCode::OK, ServiceStatus::Healthy)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, ServiceStatus::Degraded)
    };

    let body = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: DatabaseHealth {
            status: if connected { "connected" } else { "disconnected" }.to_string(),
            connections: pool_stats(&state.db).size,
            pending_migrations,
        },
        rate_limit_store: state.limiter.store_kind().to_string(),
    };

    (code, Json(body))
}
