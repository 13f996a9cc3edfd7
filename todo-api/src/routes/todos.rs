/// Todo endpoints
///
/// Every route requires Basic or token authentication and only ever sees the
/// caller's own todos. Unknown IDs, malformed IDs and IDs owned by another user
/// all answer 404.
///
/// # Endpoints
///
/// - `GET /api/v1/todos` - List todos, oldest first
/// - `POST /api/v1/todos` - Create a todo
/// - `GET /api/v1/todos/:id` - Fetch one todo
/// - `PUT /api/v1/todos/:id` - Rename and/or complete a todo
/// - `DELETE /api/v1/todos/:id` - Delete a todo
///
/// # Todo JSON
///
/// ```json
/// {
///   "id": "uuid",
///   "name": "Walk Dog",
///   "completed": false,
///   "created_at": "2025-01-01T00:00:00Z",
///   "updated_at": "2025-01-01T00:00:00Z"
/// }
/// ```

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::JsonOrForm,
};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{AppendHeaders, IntoResponse},
    Extension, Json,
};
use serde::Deserialize;
use todo_shared::{
    auth::gate::CurrentUser,
    models::todo::Todo,
    todos::{self, TodoChanges},
};
use uuid::Uuid;

const TODOS_PATH: &str = "/api/v1/todos";

/// Create todo request
#[derive(Debug, Deserialize)]
pub struct CreateTodoRequest {
    #[serde(default)]
    pub name: Option<String>,
}

fn todo_location(id: Uuid) -> String {
    format!("{}/{}", TODOS_PATH, id)
}

/// Parses a path ID; anything that is not a UUID cannot name a todo
fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(format!("Todo {} does not exist", raw)))
}

/// List the caller's todos
pub async fn list_todos(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<Todo>>> {
    let todos = todos::list(&state.db, &current).await?;
    Ok(Json(todos))
}

/// Create a todo
///
/// # Response
///
/// `201 Created` with `Location: /api/v1/todos/<id>` and the new todo.
///
/// # Errors
///
/// - `400 Bad Request`: Missing or blank name
pub async fn create_todo(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    JsonOrForm(request): JsonOrForm<CreateTodoRequest>,
) -> ApiResult<impl IntoResponse> {
    let name = request.name.unwrap_or_default();
    let todo = todos::create(&state.db, &current, &name).await?;

    Ok((
        StatusCode::CREATED,
        AppendHeaders([(header::LOCATION, todo_location(todo.id))]),
        Json(todo),
    ))
}

/// Fetch one todo
pub async fn get_todo(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<Todo>> {
    let id = parse_id(&id)?;
    let todo = todos::get(&state.db, &current, id).await?;
    Ok(Json(todo))
}

/// Update a todo
///
/// Only the provided fields change:
///
/// ```json
/// {"completed": true}
/// ```
///
/// # Response
///
/// `200 OK` with `Location: /api/v1/todos/<id>` and the updated todo.
pub async fn update_todo(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
    JsonOrForm(changes): JsonOrForm<TodoChanges>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id)?;
    let todo = todos::update(&state.db, &current, id, changes).await?;

    Ok((
        StatusCode::OK,
        AppendHeaders([(header::LOCATION, todo_location(todo.id))]),
        Json(todo),
    ))
}

/// Delete a todo
///
/// # Response
///
/// `204 No Content` with `Location: /api/v1/todos`.
pub async fn delete_todo(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let id = parse_id(&id)?;
    todos::delete(&state.db, &current, id).await?;

    Ok((
        StatusCode::NO_CONTENT,
        AppendHeaders([(header::LOCATION, TODOS_PATH)]),
    ))
}
