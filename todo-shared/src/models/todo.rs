/// Todo model and database operations
///
/// Every lookup and write is confined to one owner through [`OwnerScope`],
/// so each one is a single statement with no read-then-write window.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE todos (
///     id BLOB PRIMARY KEY NOT NULL,
///     owner_id BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     name TEXT NOT NULL CHECK (length(trim(name)) > 0),
///     completed INTEGER NOT NULL DEFAULT 0,
///     created_at TEXT NOT NULL,
///     updated_at TEXT NOT NULL
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::SqliteExecutor;
use uuid::Uuid;

use crate::auth::authorization::OwnerScope;

/// A single todo item
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Todo {
    pub id: Uuid,

    /// Owning user; not exposed in API responses
    #[serde(skip_serializing, default)]
    pub owner_id: Uuid,

    pub name: String,

    /// `false` while open, `true` once done
    pub completed: bool,

    /// Creation time, the listing order key
    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Todo lifecycle state derived from the completion flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TodoState {
    Open,
    Done,
}

impl Todo {
    pub fn state(&self) -> TodoState {
        if self.completed {
            TodoState::Done
        } else {
            TodoState::Open
        }
    }
}

/// Input for creating a todo
#[derive(Debug, Clone)]
pub struct CreateTodo {
    pub owner_id: Uuid,
    pub name: String,
}

/// Fields to change on an existing todo
///
/// Only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct UpdateTodo {
    pub name: Option<String>,
    pub completed: Option<bool>,
}

const TODO_COLUMNS: &str = "id, owner_id, name, completed, created_at, updated_at";

impl Todo {
    /// Inserts a new, open todo
    pub async fn create<'e>(
        executor: impl SqliteExecutor<'e>,
        data: CreateTodo,
    ) -> Result<Self, sqlx::Error> {
        let now = Utc::now();

        sqlx::query_as::<_, Todo>(&format!(
            r#"
            INSERT INTO todos (id, owner_id, name, completed, created_at, updated_at)
            VALUES (?, ?, ?, 0, ?, ?)
            RETURNING {TODO_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(data.owner_id)
        .bind(data.name)
        .bind(now)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Finds a todo by ID within `scope`
    pub async fn find_owned<'e>(
        executor: impl SqliteExecutor<'e>,
        scope: OwnerScope,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Todo>(&format!(
            "SELECT {TODO_COLUMNS} FROM todos WHERE {}",
            OwnerScope::PREDICATE
        ))
        .bind(id)
        .bind(scope.owner_id())
        .fetch_optional(executor)
        .await
    }

    /// Lists a user's todos, oldest first
    ///
    /// Rows created within the same clock tick keep insertion order.
    pub async fn list_by_owner<'e>(
        executor: impl SqliteExecutor<'e>,
        owner_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Todo>(&format!(
            r#"
            SELECT {TODO_COLUMNS} FROM todos
            WHERE owner_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#
        ))
        .bind(owner_id)
        .fetch_all(executor)
        .await
    }

    /// Applies the `Some` fields of `data`
    ///
    /// Returns the updated todo, or None if no row in `scope` has that ID.
    pub async fn update_owned<'e>(
        executor: impl SqliteExecutor<'e>,
        scope: OwnerScope,
        id: Uuid,
        data: UpdateTodo,
    ) -> Result<Option<Self>, sqlx::Error> {
        let mut query = String::from("UPDATE todos SET updated_at = ?");

        if data.name.is_some() {
            query.push_str(", name = ?");
        }
        if data.completed.is_some() {
            query.push_str(", completed = ?");
        }

        query.push_str(&format!(
            " WHERE {} RETURNING {TODO_COLUMNS}",
            OwnerScope::PREDICATE
        ));

        let mut q = sqlx::query_as::<_, Todo>(&query).bind(Utc::now());

        if let Some(name) = data.name {
            q = q.bind(name);
        }
        if let Some(completed) = data.completed {
            q = q.bind(completed);
        }

        q.bind(id)
            .bind(scope.owner_id())
            .fetch_optional(executor)
            .await
    }

    /// Deletes a todo by ID within `scope`
    ///
    /// Returns true if a row was removed.
    pub async fn delete_owned<'e>(
        executor: impl SqliteExecutor<'e>,
        scope: OwnerScope,
        id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(&format!("DELETE FROM todos WHERE {}", OwnerScope::PREDICATE))
            .bind(id)
            .bind(scope.owner_id())
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts todos across all users
    pub async fn count<'e>(executor: impl SqliteExecutor<'e>) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM todos")
            .fetch_one(executor)
            .await?;

        Ok(count)
    }
}
