/// Authentication and authorization utilities
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing
/// - [`api_key`]: API key generation and credential extraction
/// - [`session`]: Session tokens and the `sessionid` cookie
/// - [`middleware`]: Per-request principal resolution
/// - [`authorization`]: Ownership checks on owned resources
///
/// # Example
///
/// ```no_run
/// use dayplan_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
/// # Ok(())
/// # }
/// ```

pub mod api_key;
pub mod authorization;
pub mod middleware;
pub mod password;
pub mod session;
