/// API key generation and credential extraction
///
/// Every user owns exactly one API key, issued when the account is created
/// and returned in the sign-in/sign-up payload. Keys never expire.
///
/// # Key Format
///
/// 40 lowercase hex characters (20 random bytes). Lookups are
/// case-insensitive, so clients that upper-case the key still match.
///
/// # Transport
///
/// A key can arrive as the `api_key` query parameter or in the
/// `Authorization` header. The header value is used as-is after stripping
/// an optional `Bearer ` or `ApiKey ` scheme. Blank values count as absent.
///
/// # Example
///
/// ```
/// use dayplan_shared::auth::api_key::{extract_api_key, generate_api_key};
///
/// let key = generate_api_key();
/// assert_eq!(key.len(), 40);
///
/// let header = format!("ApiKey {}", key);
/// assert_eq!(extract_api_key(None, Some(&header)), Some(key.clone()));
/// assert_eq!(extract_api_key(Some("  "), None), None);
/// ```

use rand::RngCore;

/// Random bytes behind each key
const KEY_BYTES: usize = 20;

/// Length of a hex-encoded API key
pub const API_KEY_LENGTH: usize = KEY_BYTES * 2;

/// Identifier used for requests that carry no credential
pub const ANONYMOUS_IDENTIFIER: &str = "anonymous";

/// Authorization schemes stripped from the header value
const SCHEME_PREFIXES: &[&str] = &["Bearer ", "ApiKey "];

/// Generates a new API key
///
/// Uses `rand::thread_rng()`, a CSPRNG seeded from the OS.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Picks the API key credential out of a request
///
/// The query parameter wins over the header when both are present and
/// non-blank.
pub fn extract_api_key(query: Option<&str>, authorization: Option<&str>) -> Option<String> {
    if let Some(value) = query.map(str::trim).filter(|v| !v.is_empty()) {
        return Some(value.to_string());
    }

    let header = authorization.map(str::trim_start)?;

    let value = SCHEME_PREFIXES
        .iter()
        .find_map(|prefix| strip_prefix_ignore_case(header, prefix))
        .unwrap_or(header)
        .trim();

    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        value.get(prefix.len()..)
    } else {
        None
    }
}

/// Identifier used in access logs for a request
///
/// The presented credential itself, or [`ANONYMOUS_IDENTIFIER`].
pub fn request_identifier(credential: Option<&str>) -> String {
    credential
        .filter(|c| !c.is_empty())
        .unwrap_or(ANONYMOUS_IDENTIFIER)
        .to_string()
}
