/// Error handling for the API server
///
/// Every handler returns `Result<T, ApiError>`. Each variant maps to one HTTP
/// status and every error body has the same shape:
///
/// ```json
/// {"error": "Password and password verification do not match"}
/// ```
///
/// # Example
///
/// ```
/// use todo_api::error::{ApiError, ApiResult};
/// use axum::Json;
/// use serde_json::{json, Value};
///
/// async fn handler(name: Option<String>) -> ApiResult<Json<Value>> {
///     let name = name.ok_or_else(|| ApiError::BadRequest("No task name provided".to_string()))?;
///     Ok(Json(json!({ "name": name })))
/// }
/// ```

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use todo_shared::auth::credentials::CredentialError;
use todo_shared::auth::gate::GateError;
use todo_shared::auth::password::PasswordError;
use todo_shared::auth::token::TokenError;
use todo_shared::rate_limit::RateLimitError;
use todo_shared::todos::TodoError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Not found (404), also used for resources owned by someone else
    NotFound(String),

    /// Conflict (409) - e.g., duplicate email
    Conflict(String),

    /// Too many requests (429)
    RateLimitExceeded {
        retry_after: u64,
        message: String,
    },

    /// Internal server error (500)
    InternalError(String),
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::RateLimitExceeded { message, .. } => write!(f, "Rate limit exceeded: {}", message),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (message, extra_header) = match self {
            ApiError::RateLimitExceeded { retry_after, message } => (
                message,
                Some((header::RETRY_AFTER, HeaderValue::from(retry_after))),
            ),
            ApiError::Unauthorized(msg) => (
                msg,
                Some((
                    header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Basic realm=\"todo-api\""),
                )),
            ),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                ("An internal error occurred".to_string(), None)
            }
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) | ApiError::Conflict(msg) => (msg, None),
        };

        let mut response = (status, Json(ErrorResponse { error: message })).into_response();
        if let Some((name, value)) = extra_header {
            response.headers_mut().insert(name, value);
        }
        response
    }
}

/// Convert sqlx errors to API errors
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::InternalError(format!("Database error: {}", err))
    }
}

/// Convert password errors to API errors
impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

/// Convert credential store errors to API errors
impl From<CredentialError> for ApiError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Validation(msg) => ApiError::BadRequest(msg),
            CredentialError::Conflict(msg) => ApiError::Conflict(msg),
            CredentialError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            CredentialError::UserNotFound => ApiError::NotFound(err.to_string()),
            CredentialError::Password(e) => e.into(),
            CredentialError::Database(e) => e.into(),
        }
    }
}

/// Convert token errors to API errors
impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            TokenError::Invalid(_) => ApiError::Unauthorized("Invalid token".to_string()),
            TokenError::CreateError(msg) => ApiError::InternalError(msg),
            TokenError::Database(e) => e.into(),
        }
    }
}

/// Convert auth gate errors to API errors
impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::MissingCredentials => ApiError::Unauthorized(err.to_string()),
            GateError::InvalidFormat(msg) => ApiError::Unauthorized(msg),
            GateError::Credentials(e) => e.into(),
            GateError::Token(e) => e.into(),
        }
    }
}

/// Convert todo errors to API errors
impl From<TodoError> for ApiError {
    fn from(err: TodoError) -> Self {
        match err {
            TodoError::Validation(msg) => ApiError::BadRequest(msg),
            TodoError::NotFound(_) => ApiError::NotFound(err.to_string()),
            TodoError::Database(e) => e.into(),
        }
    }
}

/// Convert rate limiter errors to API errors
impl From<RateLimitError> for ApiError {
    fn from(err: RateLimitError) -> Self {
        ApiError::InternalError(format!("Rate limit check failed: {}", err))
    }
}
