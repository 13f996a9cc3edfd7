/// Stateless token issuing and verification
///
/// Tokens are HS256 JWTs. The signing key is not the server secret itself but
/// `HMAC-SHA256(server_secret, password_hash)` for the token's owner, so a
/// token is only valid while the owner's stored hash is unchanged. Changing
/// the password revokes every previously issued token with no revocation list.
///
/// The header carries the user ID as `kid`, which is how the verifier knows
/// whose hash to derive the key from before it can check the signature.
///
/// # Claims
///
/// - `sub`: User ID
/// - `iss`: Always "todo-api"
/// - `iat` / `nbf`: Issue time
/// - `exp`: Issue time + TTL (default one hour)
///
/// # Example
///
/// ```no_run
/// use todo_shared::auth::token::TokenAuthenticator;
/// use todo_shared::models::user::User;
/// use sqlx::SqlitePool;
///
/// # async fn example(pool: SqlitePool, user: User) -> Result<(), Box<dyn std::error::Error>> {
/// let tokens = TokenAuthenticator::with_default_ttl("server-secret-at-least-32-bytes-long");
///
/// let token = tokens.issue(&user)?;
/// let verified = tokens.verify(&pool, &token).await?;
/// assert_eq!(verified.id, user.id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use jsonwebtoken::{
    decode, decode_header, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey,
    Header, Validation,
};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sqlx::SqlitePool;
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

use crate::models::user::User;

/// Issuer claim stamped on every token
pub const ISSUER: &str = "todo-api";

/// Default token lifetime in seconds
pub const DEFAULT_TTL_SECONDS: i64 = 3600;

/// Error type for token operations
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Token is malformed, has a bad signature, or names an unknown user
    #[error("Invalid token: {0}")]
    Invalid(String),

    /// Database error while loading the token's owner
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - User ID
    pub sub: Uuid,

    /// Issuer - Always "todo-api"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

impl Claims {
    /// Creates claims for `user_id` expiring after `ttl`
    pub fn new(user_id: Uuid, ttl: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

/// Issues and verifies tokens tied to a user's current password hash
#[derive(Clone)]
pub struct TokenAuthenticator {
    secret: Arc<str>,
    ttl: Duration,
}

impl fmt::Debug for TokenAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuthenticator")
            .field("secret", &"<redacted>")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenAuthenticator {
    /// Creates an authenticator with the given server secret and token lifetime
    pub fn new(secret: impl AsRef<str>, ttl: Duration) -> Self {
        Self {
            secret: Arc::from(secret.as_ref()),
            ttl,
        }
    }

    /// Creates an authenticator whose tokens live for [`DEFAULT_TTL_SECONDS`]
    pub fn with_default_ttl(secret: impl AsRef<str>) -> Self {
        Self::new(secret, Duration::seconds(DEFAULT_TTL_SECONDS))
    }

    /// Token lifetime
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issues a token for an already authenticated user
    ///
    /// # Errors
    ///
    /// Returns `TokenError::CreateError` if encoding fails
    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        let claims = Claims::new(user.id, self.ttl);

        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(user.id.to_string());

        let key = EncodingKey::from_secret(&self.signing_key(&user.password_hash)?);

        encode(&header, &claims, &key)
            .map_err(|e| TokenError::CreateError(format!("Token encoding failed: {}", e)))
    }

    /// Verifies a token and returns its owner
    ///
    /// Loads the user named by the header's `kid`, re-derives the signing key
    /// from the user's *current* password hash and validates the token.
    ///
    /// # Errors
    ///
    /// - `TokenError::Invalid` for malformed tokens, unknown users, bad
    ///   signatures (including tokens issued before a password change)
    /// - `TokenError::Expired` for expired tokens
    /// - `TokenError::Database` if the user lookup fails
    pub async fn verify(&self, pool: &SqlitePool, token: &str) -> Result<User, TokenError> {
        let user_id = key_id(token)?;

        let user = User::find_by_id(pool, user_id)
            .await?
            .ok_or_else(|| TokenError::Invalid("Unknown token subject".to_string()))?;

        self.validate(token, &user)?;

        Ok(user)
    }

    /// Validates a token against a specific user's current credentials
    pub fn validate(&self, token: &str, user: &User) -> Result<Claims, TokenError> {
        let key = DecodingKey::from_secret(&self.signing_key(&user.password_hash)?);

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.validate_exp = true;
        validation.validate_nbf = true;

        let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(format!("Token validation failed: {}", e)),
        })?;

        if token_data.claims.sub != user.id {
            return Err(TokenError::Invalid("Token subject mismatch".to_string()));
        }

        Ok(token_data.claims)
    }

    fn signing_key(&self, password_hash: &str) -> Result<Vec<u8>, TokenError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.as_bytes())
            .map_err(|e| TokenError::CreateError(format!("Key derivation failed: {}", e)))?;
        mac.update(password_hash.as_bytes());

        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Reads the user ID from the token header without checking the signature
fn key_id(token: &str) -> Result<Uuid, TokenError> {
    let header = decode_header(token)
        .map_err(|e| TokenError::Invalid(format!("Malformed token: {}", e)))?;

    let kid = header
        .kid
        .ok_or_else(|| TokenError::Invalid("Token has no key id".to_string()))?;

    Uuid::parse_str(&kid).map_err(|_| TokenError::Invalid("Token key id is not a user id".to_string()))
}
