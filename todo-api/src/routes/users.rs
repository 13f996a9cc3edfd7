/// User endpoints
///
/// # Endpoints
///
/// - `POST /api/v1/users` - Register a new user
/// - `GET /api/v1/users/token` - Exchange Basic credentials for a token
///
/// Both routes share the users rate limit.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::JsonOrForm,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use todo_shared::{
    auth::{
        credentials::{self, Registration},
        gate::{AuthMethod, CurrentUser},
    },
    models::user::User,
};
use uuid::Uuid;

/// Public view of a user
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// Token response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Register a new user
///
/// # Endpoint
///
/// ```text
/// POST /api/v1/users
/// Content-Type: application/json
///
/// {
///   "username": "alice",
///   "email": "alice@x.com",
///   "password": "pw123",
///   "verify_password": "pw123"
/// }
/// ```
///
/// Form-encoded bodies with the same fields are accepted too.
///
/// # Errors
///
/// - `400 Bad Request`: Passwords differ or a field is invalid
/// - `409 Conflict`: Username or email already exists
pub async fn register(
    State(state): State<AppState>,
    JsonOrForm(registration): JsonOrForm<Registration>,
) -> ApiResult<(StatusCode, Json<UserResponse>)> {
    let user = credentials::register(&state.db, registration).await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Issue a token for the Basic-authenticated user
///
/// # Endpoint
///
/// ```text
/// GET /api/v1/users/token
/// Authorization: Basic YWxpY2U6cHcxMjM=
/// ```
///
/// # Response
///
/// ```json
/// {"token": "eyJ..."}
/// ```
pub async fn issue_token(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<Json<TokenResponse>> {
    if current.method != AuthMethod::Basic {
        return Err(ApiError::Unauthorized(
            "Username and password required to issue a token".to_string(),
        ));
    }

    let token = state.tokens.issue(&current.user)?;
    tracing::info!(user_id = %current.id(), "Issued token");

    Ok(Json(TokenResponse { token }))
}
