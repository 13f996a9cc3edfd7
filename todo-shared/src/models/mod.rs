/// Database models
///
/// - `user`: User accounts and password hashes
/// - `todo`: Todo items, each owned by one user
///
/// # Example
///
/// ```no_run
/// use todo_shared::models::todo::{CreateTodo, Todo};
/// use todo_shared::db::pool::{create_pool, DatabaseConfig};
/// use uuid::Uuid;
///
/// # async fn example(owner_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::in_memory()).await?;
///
/// let todo = Todo::create(&pool, CreateTodo {
///     owner_id,
///     name: "Walk Dog".to_string(),
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod todo;
pub mod user;
