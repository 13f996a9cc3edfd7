/// Schema migrations
///
/// The SQL files under `migrations/` are compiled into the binary with
/// `sqlx::migrate!` and applied once at startup, before the server accepts
/// requests.
///
/// # Example
///
/// ```no_run
/// use todo_shared::db::migrations::{migration_status, run_migrations};
/// use todo_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::in_memory()).await?;
/// run_migrations(&pool).await?;
///
/// assert!(migration_status(&pool).await?.is_up_to_date());
/// # Ok(())
/// # }
/// ```

use sqlx::migrate::{MigrateDatabase, MigrateError, Migrator};
use sqlx::{Sqlite, SqlitePool};
use tracing::{debug, error, info};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Applied versus embedded migrations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    pub applied: usize,
    pub pending: usize,

    /// Version of the newest applied migration
    pub latest_version: Option<i64>,
}

impl MigrationStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.pending == 0
    }
}

/// Applies every migration not yet recorded in `_sqlx_migrations`
///
/// # Errors
///
/// Fails when a migration errors or an applied migration was edited since.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await.map_err(|e| {
        error!(error = %e, "Migration failed");
        e
    })?;

    info!(embedded = MIGRATOR.iter().count(), "Schema is up to date");
    Ok(())
}

/// Reports how far the database schema has been migrated
pub async fn migration_status(pool: &SqlitePool) -> Result<MigrationStatus, sqlx::Error> {
    let embedded = MIGRATOR.iter().count();

    let has_table: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?;

    if !has_table {
        debug!("No migrations applied yet");
        return Ok(MigrationStatus {
            applied: 0,
            pending: embedded,
            latest_version: None,
        });
    }

    let (applied, latest_version): (i64, Option<i64>) =
        sqlx::query_as("SELECT COUNT(*), MAX(version) FROM _sqlx_migrations WHERE success = 1")
            .fetch_one(pool)
            .await?;

    let applied = applied as usize;
    Ok(MigrationStatus {
        applied,
        pending: embedded.saturating_sub(applied),
        latest_version,
    })
}

/// Creates the database file when missing; in-memory URLs are left alone
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if database_url.contains(":memory:") || Sqlite::database_exists(database_url).await? {
        return Ok(());
    }

    Sqlite::create_database(database_url).await?;
    info!("Created database file");
    Ok(())
}
