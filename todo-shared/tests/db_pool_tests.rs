/// Integration tests for database connection pool
///
/// Each test opens its own in-memory SQLite database, so they can run in
/// parallel without any external service.

use todo_shared::db::pool::{close_pool, create_pool, health_check, pool_stats, DatabaseConfig};
use sqlx::Row;

#[tokio::test]
async fn test_create_pool_success() {
    let pool = create_pool(DatabaseConfig::in_memory())
        .await
        .expect("Failed to create pool");

    let stats = pool_stats(&pool);
    assert_eq!(stats.size, 1, "In-memory pool holds exactly one connection");
    assert!(stats.in_use() <= 1);

    close_pool(pool).await;
}

#[tokio::test]
async fn test_create_pool_with_missing_file() {
    let config = DatabaseConfig {
        acquire_timeout_seconds: 2,
        // mode=ro never creates the file
        ..DatabaseConfig::file("sqlite:///nonexistent/dir/todos.db?mode=ro")
    };

    assert!(create_pool(config).await.is_err());
}

#[tokio::test]
async fn test_health_check_success() {
    let pool = create_pool(DatabaseConfig::in_memory())
        .await
        .expect("Failed to create pool");

    assert!(health_check(&pool).await.is_ok(), "Health check should succeed");

    close_pool(pool).await;
}

#[tokio::test]
async fn test_pool_query_execution() {
    let pool = create_pool(DatabaseConfig::in_memory())
        .await
        .expect("Failed to create pool");

    let row = sqlx::query("SELECT 1 + 1 as result")
        .fetch_one(&pool)
        .await
        .expect("Query should succeed");

    let result: i64 = row.get("result");
    assert_eq!(result, 2);

    close_pool(pool).await;
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let pool = create_pool(DatabaseConfig::in_memory())
        .await
        .expect("Failed to create pool");

    let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&pool)
        .await
        .expect("PRAGMA should succeed");

    assert_eq!(enabled, 1);

    close_pool(pool).await;
}

#[tokio::test]
async fn test_in_memory_state_survives_between_queries() {
    let pool = create_pool(DatabaseConfig::in_memory())
        .await
        .expect("Failed to create pool");

    sqlx::query("CREATE TABLE scratch (value INTEGER)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO scratch VALUES (42)")
        .execute(&pool)
        .await
        .unwrap();

    let value: i64 = sqlx::query_scalar("SELECT value FROM scratch")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(value, 42);

    close_pool(pool).await;
}

#[tokio::test]
async fn test_close_pool() {
    let pool = create_pool(DatabaseConfig::in_memory())
        .await
        .expect("Failed to create pool");

    close_pool(pool.clone()).await;

    assert!(pool.is_closed());
    assert!(health_check(&pool).await.is_err());
}
