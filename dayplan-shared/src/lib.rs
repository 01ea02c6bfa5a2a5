//! # Dayplan Shared Library
//!
//! This crate contains the data layer and the authentication primitives used
//! by the Dayplan API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and their queries
//! - `auth`: Passwords, API keys, sessions, request authentication and ownership checks
//! - `db`: Connection pool and embedded migrations
//! - `media`: Image rendition generation and storage
//! - `dates`: Calendar date parsing for task scheduling

pub mod auth;
pub mod dates;
pub mod db;
pub mod media;
pub mod models;

/// Current version of the Dayplan shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
