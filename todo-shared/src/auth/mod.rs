/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and verification
/// - [`credentials`]: Registration and username-or-email login
/// - [`token`]: Stateless tokens keyed by the owner's password hash
/// - [`gate`]: `Authorization` header parsing and per-request resolution
/// - [`authorization`]: Resource ownership checks
///
/// # Example
///
/// ```no_run
/// use todo_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("pw123")?;
/// assert!(verify_password("pw123", &hash)?);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod credentials;
pub mod gate;
pub mod password;
pub mod token;
