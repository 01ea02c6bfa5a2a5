/// Middleware modules for the API server
///
/// - `auth`: credential resolution for `/api/v1`
/// - `security`: security response headers

pub mod auth;
pub mod security;
