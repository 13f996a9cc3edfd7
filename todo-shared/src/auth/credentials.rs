/// Credential store: registration, password verification, password change
///
/// This is the only code that turns plaintext passwords into stored hashes
/// or compares them. Plaintext is never persisted or returned.
///
/// # Example
///
/// ```no_run
/// use todo_shared::auth::credentials::{self, Registration};
/// use sqlx::SqlitePool;
///
/// # async fn example(pool: SqlitePool) -> Result<(), Box<dyn std::error::Error>> {
/// let user = credentials::register(&pool, Registration {
///     username: "alice".to_string(),
///     email: "alice@x.com".to_string(),
///     password: "pw123".to_string(),
///     verify_password: "pw123".to_string(),
/// }).await?;
///
/// let same = credentials::verify(&pool, "alice", "pw123").await?;
/// assert_eq!(same.id, user.id);
/// # Ok(())
/// # }
/// ```

use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::OnceLock;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use super::password::{self, PasswordError};
use crate::models::user::{CreateUser, User};

/// Message returned when the two password fields differ
pub const PASSWORD_MISMATCH: &str = "Password and password verification do not match";

/// Login accepts a username or an email, so a username may not look like one
pub const USERNAME_HAS_AT: &str = "Username must not contain '@'";

/// Error type for credential operations
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// Input rejected before touching the database
    #[error("{0}")]
    Validation(String),

    /// Username or email already taken
    #[error("{0}")]
    Conflict(String),

    /// Unknown identifier or wrong password
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// User ID does not exist
    #[error("User not found")]
    UserNotFound,

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Registration input, as submitted by the client
///
/// Missing fields deserialize as empty strings and are reported by [`check`].
///
/// [`check`]: Registration::check
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct Registration {
    #[validate(length(min = 1, max = 64, message = "Username must be 1-64 characters"))]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "No password provided"))]
    pub password: String,

    pub verify_password: String,
}

impl Registration {
    /// Trims surrounding whitespace from the identity fields
    pub fn normalized(self) -> Self {
        Self {
            username: self.username.trim().to_string(),
            email: self.email.trim().to_string(),
            ..self
        }
    }

    /// Checks field formats and that both password fields agree
    pub fn check(&self) -> Result<(), CredentialError> {
        if self.password != self.verify_password {
            return Err(CredentialError::Validation(PASSWORD_MISMATCH.to_string()));
        }

        self.validate().map_err(|errors| {
            let message = errors
                .field_errors()
                .values()
                .flat_map(|errs| errs.iter())
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .next()
                .unwrap_or_else(|| "Invalid registration".to_string());
            CredentialError::Validation(message)
        })?;

        if self.username.contains('@') {
            return Err(CredentialError::Validation(USERNAME_HAS_AT.to_string()));
        }

        Ok(())
    }
}

/// Registers a new user
///
/// # Errors
///
/// - `Validation` if the passwords differ or a field is malformed
/// - `Conflict` if the username or email is already registered
pub async fn register(pool: &SqlitePool, registration: Registration) -> Result<User, CredentialError> {
    let registration = registration.normalized();
    registration.check()?;

    let Registration {
        username,
        email,
        password,
        ..
    } = registration;

    if User::find_by_username(pool, &username).await?.is_some()
        || User::find_by_email(pool, &email).await?.is_some()
    {
        return Err(conflict());
    }

    let password_hash = password::hash_password(&password)?;

    let user = User::create(
        pool,
        CreateUser {
            username,
            email,
            password_hash,
        },
    )
    .await
    .map_err(|e| {
        // A concurrent registration won the race between lookup and insert
        if is_unique_violation(&e) {
            conflict()
        } else {
            CredentialError::Database(e)
        }
    })?;

    info!(user_id = %user.id, username = %user.username, "Registered user");
    Ok(user)
}

/// Verifies a username-or-email and password pair
///
/// Unknown identifiers still cost one hash verification so that timing does
/// not reveal which accounts exist.
///
/// # Errors
///
/// Returns `InvalidCredentials` for an unknown identifier or wrong password.
pub async fn verify(pool: &SqlitePool, identifier: &str, password: &str) -> Result<User, CredentialError> {
    let Some(user) = User::find_by_login(pool, identifier).await? else {
        if let Some(hash) = dummy_hash() {
            let _ = password::verify_password(password, hash);
        }
        debug!("Login attempt for unknown identifier");
        return Err(CredentialError::InvalidCredentials);
    };

    if !password::verify_password(password, &user.password_hash)? {
        debug!(user_id = %user.id, "Login attempt with wrong password");
        return Err(CredentialError::InvalidCredentials);
    }

    Ok(user)
}

/// Replaces a user's password
///
/// Every token issued before the change stops verifying, since token keys are
/// derived from the stored hash.
pub async fn change_password(
    pool: &SqlitePool,
    user_id: Uuid,
    new_password: &str,
) -> Result<User, CredentialError> {
    if new_password.is_empty() {
        return Err(CredentialError::Validation("No password provided".to_string()));
    }

    let password_hash = password::hash_password(new_password)?;

    let user = User::update_password_hash(pool, user_id, &password_hash)
        .await?
        .ok_or(CredentialError::UserNotFound)?;

    info!(user_id = %user.id, "Password changed; previously issued tokens revoked");
    Ok(user)
}

fn conflict() -> CredentialError {
    CredentialError::Conflict("User with that email or username already exists".to_string())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn dummy_hash() -> Option<&'static str> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| password::hash_password("dummy-password-for-timing").ok())
        .as_deref()
}
