/// Session tokens and the `sessionid` cookie
///
/// A session token is an opaque random string handed to the browser in the
/// `sessionid` cookie. Only its SHA-256 digest is stored, so a leaked
/// `sessions` table cannot be replayed.

use rand::RngCore;
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "sessionid";

const TOKEN_BYTES: usize = 32;

/// Generates a new session token, returning `(token, token_hash)`
///
/// The token goes to the client; the hash goes to the database.
///
/// # Example
///
/// ```
/// use dayplan_shared::auth::session::{generate_session_token, hash_session_token};
///
/// let (token, hash) = generate_session_token();
/// assert_eq!(token.len(), 64);
/// assert_eq!(hash, hash_session_token(&token));
/// ```
pub fn generate_session_token() -> (String, String) {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    let token = hex::encode(bytes);
    let hash = hash_session_token(&token);
    (token, hash)
}

/// SHA-256 hex digest of a session token
pub fn hash_session_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Reads the session token from a `Cookie` header value
///
/// Returns `None` when the cookie is missing or empty.
pub fn token_from_cookie_header(header: &str) -> Option<String> {
    header
        .split(';')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| name.trim() == SESSION_COOKIE)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Reads the session token from every `Cookie` header on a request
pub fn token_from_headers(headers: &axum::http::HeaderMap) -> Option<String> {
    headers
        .get_all(axum::http::header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(token_from_cookie_header)
}

/// `Set-Cookie` value that hands `token` to the client
pub fn session_cookie(token: &str, ttl: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}
