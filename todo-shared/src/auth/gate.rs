/// Request-level authentication
///
/// Every protected request carries exactly one `Authorization` header. The
/// gate accepts two schemes and resolves either into the same [`CurrentUser`]:
///
/// - **Basic**: `Basic base64(identifier:password)`, checked by the credential
///   store. The identifier may be a username or an email address.
/// - **Token**: `Bearer <jwt>` or `Token <jwt>`, checked by the token
///   authenticator.
///
/// The axum middleware that calls [`authenticate`] lives in the API crate; this
/// module only parses headers and resolves credentials, so it can be tested
/// without a router.
///
/// # Example
///
/// ```no_run
/// use axum::http::HeaderMap;
/// use todo_shared::auth::gate::{authenticate, Credentials};
/// use todo_shared::auth::token::TokenAuthenticator;
/// use sqlx::SqlitePool;
///
/// # async fn example(pool: SqlitePool, headers: HeaderMap) -> Result<(), Box<dyn std::error::Error>> {
/// let tokens = TokenAuthenticator::with_default_ttl("server-secret-at-least-32-bytes-long");
///
/// let credentials = Credentials::from_headers(&headers)?;
/// let current = authenticate(&pool, &tokens, credentials).await?;
/// println!("Hello, {}", current.user.username);
/// # Ok(())
/// # }
/// ```

use axum::http::{header, HeaderMap};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Serialize;
use sqlx::SqlitePool;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

use super::credentials::{self, CredentialError};
use super::token::{TokenAuthenticator, TokenError};
use crate::models::user::User;

/// Authentication method used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Username-or-email and password
    Basic,

    /// Signed token from `GET /users/token`
    Token,
}

/// Credentials presented with a request
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Basic { identifier: String, password: String },
    Bearer(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::Basic { identifier, .. } => f
                .debug_struct("Basic")
                .field("identifier", identifier)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
        }
    }
}

/// The authenticated user for the current request
///
/// Inserted into request extensions by the auth gate middleware.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub method: AuthMethod,
}

impl CurrentUser {
    pub fn id(&self) -> Uuid {
        self.user.id
    }
}

/// Error type for the auth gate
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// No Authorization header
    #[error("Missing credentials")]
    MissingCredentials,

    /// Header present but not a supported scheme or not decodable
    #[error("{0}")]
    InvalidFormat(String),

    /// Basic credentials did not check out
    #[error(transparent)]
    Credentials(#[from] CredentialError),

    /// Token did not verify
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl GateError {
    /// Whether the failure is the client's fault (401) rather than ours (500)
    pub fn is_unauthorized(&self) -> bool {
        match self {
            GateError::MissingCredentials | GateError::InvalidFormat(_) => true,
            GateError::Credentials(CredentialError::InvalidCredentials) => true,
            GateError::Credentials(_) => false,
            GateError::Token(TokenError::Database(_)) => false,
            GateError::Token(_) => true,
        }
    }
}

impl Credentials {
    /// Parses the `Authorization` header
    pub fn from_headers(headers: &HeaderMap) -> Result<Self, GateError> {
        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or(GateError::MissingCredentials)?
            .to_str()
            .map_err(|_| GateError::InvalidFormat("Authorization header is not ASCII".to_string()))?;

        Self::parse(value)
    }

    /// Parses a raw `Authorization` header value
    ///
    /// Scheme names are matched case-insensitively.
    pub fn parse(value: &str) -> Result<Self, GateError> {
        let (scheme, rest) = value
            .trim()
            .split_once(' ')
            .ok_or_else(|| GateError::InvalidFormat("Expected '<scheme> <credentials>'".to_string()))?;
        let rest = rest.trim();

        if scheme.eq_ignore_ascii_case("basic") {
            return parse_basic(rest);
        }

        if scheme.eq_ignore_ascii_case("bearer") || scheme.eq_ignore_ascii_case("token") {
            if rest.is_empty() {
                return Err(GateError::InvalidFormat("Empty token".to_string()));
            }
            return Ok(Credentials::Bearer(rest.to_string()));
        }

        Err(GateError::InvalidFormat(format!(
            "Unsupported authorization scheme: {}",
            scheme
        )))
    }

    pub fn method(&self) -> AuthMethod {
        match self {
            Credentials::Basic { .. } => AuthMethod::Basic,
            Credentials::Bearer(_) => AuthMethod::Token,
        }
    }
}

fn parse_basic(encoded: &str) -> Result<Credentials, GateError> {
    let decoded = STANDARD
        .decode(encoded)
        .map_err(|_| GateError::InvalidFormat("Basic credentials are not valid base64".to_string()))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|_| GateError::InvalidFormat("Basic credentials are not valid UTF-8".to_string()))?;

    // Passwords may contain ':'; usernames and emails may not
    let (identifier, password) = decoded
        .split_once(':')
        .ok_or_else(|| GateError::InvalidFormat("Basic credentials missing ':'".to_string()))?;

    Ok(Credentials::Basic {
        identifier: identifier.to_string(),
        password: password.to_string(),
    })
}

/// Resolves credentials into the user they belong to
///
/// # Errors
///
/// - `GateError::Credentials` for a wrong identifier or password
/// - `GateError::Token` for an invalid, expired or revoked token
pub async fn authenticate(
    pool: &SqlitePool,
    tokens: &TokenAuthenticator,
    credentials: Credentials,
) -> Result<CurrentUser, GateError> {
    let method = credentials.method();

    let user = match credentials {
        Credentials::Bearer(token) => tokens.verify(pool, &token).await?,
        Credentials::Basic {
            identifier,
            password,
        } => credentials::verify(pool, &identifier, &password).await?,
    };

    debug!(user_id = %user.id, method = ?method, "Authenticated request");
    Ok(CurrentUser { user, method })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn basic(raw: &str) -> String {
        format!("Basic {}", STANDARD.encode(raw))
    }

    #[test]
    fn test_parse_basic() {
        let creds = Credentials::parse(&basic("alice:pw123")).unwrap();
        assert_eq!(
            creds,
            Credentials::Basic {
                identifier: "alice".to_string(),
                password: "pw123".to_string(),
            }
        );
        assert_eq!(creds.method(), AuthMethod::Basic);
    }

    #[test]
    fn test_parse_basic_password_with_colon() {
        let creds = Credentials::parse(&basic("alice@x.com:a:b:c")).unwrap();
        assert_eq!(
            creds,
            Credentials::Basic {
                identifier: "alice@x.com".to_string(),
                password: "a:b:c".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_token_schemes() {
        for scheme in ["Bearer", "bearer", "Token", "TOKEN"] {
            let creds = Credentials::parse(&format!("{} abc.def.ghi", scheme)).unwrap();
            assert_eq!(creds, Credentials::Bearer("abc.def.ghi".to_string()));
            assert_eq!(creds.method(), AuthMethod::Token);
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(Credentials::parse("Basic"), Err(GateError::InvalidFormat(_))));
        assert!(matches!(Credentials::parse("Basic !!!"), Err(GateError::InvalidFormat(_))));
        assert!(matches!(
            Credentials::parse(&basic("no-colon")),
            Err(GateError::InvalidFormat(_))
        ));
        assert!(matches!(Credentials::parse("Digest abc"), Err(GateError::InvalidFormat(_))));
        assert!(matches!(Credentials::parse("Bearer  "), Err(GateError::InvalidFormat(_))));
    }

    #[test]
    fn test_from_headers_missing() {
        let headers = HeaderMap::new();
        assert!(matches!(
            Credentials::from_headers(&headers),
            Err(GateError::MissingCredentials)
        ));
    }

    #[test]
    fn test_from_headers_present() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token xyz"));
        assert_eq!(
            Credentials::from_headers(&headers).unwrap(),
            Credentials::Bearer("xyz".to_string())
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", Credentials::parse(&basic("alice:hunter2")).unwrap());
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));

        let debug = format!("{:?}", Credentials::Bearer("secret-token".to_string()));
        assert!(!debug.contains("secret-token"));
    }

    #[test]
    fn test_unauthorized_classification() {
        assert!(GateError::MissingCredentials.is_unauthorized());
        assert!(GateError::Credentials(CredentialError::InvalidCredentials).is_unauthorized());
        assert!(GateError::Token(TokenError::Expired).is_unauthorized());
        assert!(!GateError::Token(TokenError::Database(sqlx::Error::PoolTimedOut)).is_unauthorized());
    }
}
