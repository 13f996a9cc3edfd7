/// Per-user todo lifecycle
///
/// ```text
/// create ──> Open ⇄ Done ──> (deleted)
/// ```
///
/// Every operation takes the [`CurrentUser`] and only ever touches that user's
/// rows. A todo that exists but belongs to someone else is reported exactly
/// like a todo that does not exist, so IDs leak nothing across users.
///
/// # Example
///
/// ```no_run
/// use todo_shared::auth::gate::CurrentUser;
/// use todo_shared::todos::{self, TodoChanges};
/// use sqlx::SqlitePool;
///
/// # async fn example(pool: SqlitePool, alice: CurrentUser) -> Result<(), Box<dyn std::error::Error>> {
/// let todo = todos::create(&pool, &alice, "Walk Dog").await?;
///
/// let done = todos::update(&pool, &alice, todo.id, TodoChanges {
///     completed: Some(true),
///     ..Default::default()
/// }).await?;
/// assert!(done.completed);
///
/// todos::delete(&pool, &alice, todo.id).await?;
/// # Ok(())
/// # }
/// ```

use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::auth::authorization::OwnerScope;
use crate::auth::gate::CurrentUser;
use crate::models::todo::{CreateTodo, Todo, UpdateTodo};

/// Message returned when a todo is created or renamed without a name
pub const NAME_REQUIRED: &str = "No task name provided";

/// Error type for todo operations
#[derive(Debug, thiserror::Error)]
pub enum TodoError {
    #[error("{0}")]
    Validation(String),

    /// Missing, or owned by another user
    #[error("Todo {0} does not exist")]
    NotFound(Uuid),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Requested changes to a todo; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TodoChanges {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub completed: Option<bool>,
}

/// Creates an open todo owned by `current`
///
/// # Errors
///
/// Returns `TodoError::Validation` for a blank name; nothing is stored.
pub async fn create(pool: &SqlitePool, current: &CurrentUser, name: &str) -> Result<Todo, TodoError> {
    let name = clean_name(name)?;

    let todo = Todo::create(
        pool,
        CreateTodo {
            owner_id: current.id(),
            name,
        },
    )
    .await?;

    info!(todo_id = %todo.id, user_id = %current.id(), "Created todo");
    Ok(todo)
}

/// Lists the user's todos, oldest first
pub async fn list(pool: &SqlitePool, current: &CurrentUser) -> Result<Vec<Todo>, TodoError> {
    Ok(Todo::list_by_owner(pool, current.id()).await?)
}

/// Fetches a single todo owned by `current`
pub async fn get(pool: &SqlitePool, current: &CurrentUser, id: Uuid) -> Result<Todo, TodoError> {
    let found = Todo::find_owned(pool, OwnerScope::of(current), id).await?;
    owned(found, current, id)
}

/// Applies the provided fields
///
/// The ownership check and the write are one statement, so concurrent
/// mutations only ever wait on SQLite's write lock.
///
/// # Errors
///
/// - `TodoError::NotFound` if the todo is missing or foreign
/// - `TodoError::Validation` if `changes.name` is blank
pub async fn update(
    pool: &SqlitePool,
    current: &CurrentUser,
    id: Uuid,
    changes: TodoChanges,
) -> Result<Todo, TodoError> {
    let name = changes.name.as_deref().map(clean_name).transpose()?;

    let updated = Todo::update_owned(
        pool,
        OwnerScope::of(current),
        id,
        UpdateTodo {
            name,
            completed: changes.completed,
        },
    )
    .await?;
    let todo = owned(updated, current, id)?;

    info!(todo_id = %id, state = ?todo.state(), "Updated todo");
    Ok(todo)
}

/// Deletes a todo owned by `current`
///
/// A second delete of the same ID yields `TodoError::NotFound`.
pub async fn delete(pool: &SqlitePool, current: &CurrentUser, id: Uuid) -> Result<(), TodoError> {
    let removed = Todo::delete_owned(pool, OwnerScope::of(current), id).await?;
    owned(removed.then_some(()), current, id)?;

    info!(todo_id = %id, user_id = %current.id(), "Deleted todo");
    Ok(())
}

/// Turns an owner-scoped miss into `NotFound`
///
/// A missing row and a foreign row look the same from inside the scope.
fn owned<T>(row: Option<T>, current: &CurrentUser, id: Uuid) -> Result<T, TodoError> {
    row.ok_or_else(|| {
        debug!(todo_id = %id, user_id = %current.id(), "No such todo for this user");
        TodoError::NotFound(id)
    })
}

fn clean_name(name: &str) -> Result<String, TodoError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(TodoError::Validation(NAME_REQUIRED.to_string()));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_name_trims() {
        assert_eq!(clean_name("  Walk Dog ").unwrap(), "Walk Dog");
    }

    #[test]
    fn test_clean_name_rejects_blank() {
        for blank in ["", "   ", "\t\n"] {
            let err = clean_name(blank).unwrap_err();
            assert_eq!(err.to_string(), NAME_REQUIRED);
        }
    }

    #[test]
    fn test_changes_deserialize_partial() {
        let changes: TodoChanges = serde_json::from_str(r#"{"completed": true}"#).unwrap();
        assert!(changes.name.is_none());
        assert_eq!(changes.completed, Some(true));
    }

    #[test]
    fn test_not_found_message() {
        let id = Uuid::nil();
        assert_eq!(
            TodoError::NotFound(id).to_string(),
            format!("Todo {} does not exist", id)
        );
    }
}
