/// SQLite connection pool
///
/// Opens the pool that backs users and todos. Every connection enforces
/// foreign keys, so deleting a user can never strand todos.
///
/// File databases run in WAL mode with a busy timeout; in-memory databases
/// are pinned to one connection because each SQLite in-memory connection sees
/// a different database.
///
/// # Example
///
/// ```no_run
/// use todo_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), sqlx::Error> {
/// let pool = create_pool(DatabaseConfig::file("sqlite://todos.db?mode=rwc")).await?;
/// let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
///     .fetch_one(&pool)
///     .await?;
/// # Ok(())
/// # }
/// ```

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

const MEMORY_URL: &str = "sqlite::memory:";

/// Pool settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `sqlite://path?mode=rwc` or `sqlite::memory:`
    pub url: String,

    pub max_connections: u32,

    /// How long a request waits for a free connection (seconds)
    pub acquire_timeout_seconds: u64,

    /// How long a writer waits on a locked database before failing (seconds)
    pub busy_timeout_seconds: u64,

    /// Use write-ahead logging; ignored for in-memory databases
    pub wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            acquire_timeout_seconds: 30,
            busy_timeout_seconds: 5,
            wal: true,
        }
    }
}

impl DatabaseConfig {
    /// Settings for a database file at `url`
    pub fn file(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Settings for a private in-memory database
    pub fn in_memory() -> Self {
        Self {
            url: MEMORY_URL.to_string(),
            max_connections: 1,
            acquire_timeout_seconds: 5,
            busy_timeout_seconds: 0,
            wal: false,
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:")
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions, sqlx::Error> {
        let mut options = SqliteConnectOptions::from_str(&self.url)?
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(self.busy_timeout_seconds));

        if self.wal && !self.is_in_memory() {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        Ok(options)
    }
}

/// Opens the pool and checks that it answers queries
///
/// # Errors
///
/// Fails on a malformed URL, an unopenable file or a failed first query.
pub async fn create_pool(config: DatabaseConfig) -> Result<SqlitePool, sqlx::Error> {
    let in_memory = config.is_in_memory();
    // An in-memory database vanishes with its last connection
    let max_connections = if in_memory { 1 } else { config.max_connections };

    info!(
        max_connections,
        in_memory,
        wal = config.wal && !in_memory,
        "Opening SQLite pool"
    );

    let mut options = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds));

    if in_memory {
        options = options
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    }

    let pool = options.connect_with(config.connect_options()?).await?;
    health_check(&pool).await?;

    debug!("SQLite pool ready");
    Ok(pool)
}

/// Runs a trivial query against the database
pub async fn health_check(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Connection counts at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub size: u32,
    pub idle: usize,
}

impl PoolStats {
    pub fn in_use(&self) -> usize {
        (self.size as usize).saturating_sub(self.idle)
    }
}

pub fn pool_stats(pool: &SqlitePool) -> PoolStats {
    PoolStats {
        size: pool.size(),
        idle: pool.num_idle(),
    }
}

/// Closes every connection, letting SQLite checkpoint the WAL
pub async fn close_pool(pool: SqlitePool) {
    let stats = pool_stats(&pool);
    pool.close().await;
    info!(connections = stats.size, "SQLite pool closed");
}
