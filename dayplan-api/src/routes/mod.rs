/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Sign-in, sign-up and sign-out
/// - `profiles`: User profiles and the profile image upload
/// - `images`: Image renditions
/// - `users`: Public user summaries
/// - `tasks`: Task CRUD and listings

pub mod auth;
pub mod health;
pub mod images;
pub mod profiles;
pub mod tasks;
pub mod users;

use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Prefix every resource URI starts with
pub const API_PREFIX: &str = "/api/v1";

/// `resource_uri` of one object in a collection
pub fn resource_uri(collection: &str, id: Uuid) -> String {
    format!("{}/{}/{}", API_PREFIX, collection, id)
}

/// Decodes a raw query string into ordered key/value pairs
pub fn query_pairs(raw: Option<&str>) -> ApiResult<Vec<(String, String)>> {
    match raw.filter(|q| !q.is_empty()) {
        Some(query) => serde_urlencoded::from_str(query).map_err(|e| ApiError::InvalidOperator {
            message: format!("Malformed query string: {}", e),
            field: None,
        }),
        None => Ok(Vec::new()),
    }
}

/// Parses a path id; anything that is not a UUID cannot name an object
pub fn parse_id(raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(None))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_uri() {
        let id = Uuid::nil();
        assert_eq!(
            resource_uri("tasks", id),
            "/api/v1/tasks/00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_query_pairs_keeps_order_and_decodes() {
        let pairs = query_pairs(Some("date=2024-01-10&q=stand+up&title__in=a%2Cb")).unwrap();

        assert_eq!(
            pairs,
            vec![
                ("date".to_string(), "2024-01-10".to_string()),
                ("q".to_string(), "stand up".to_string()),
                ("title__in".to_string(), "a,b".to_string()),
            ]
        );
        assert!(query_pairs(None).unwrap().is_empty());
    }

    #[test]
    fn test_parse_id() {
        assert!(parse_id("not-a-uuid").is_err());
        assert_eq!(parse_id("00000000-0000-0000-0000-000000000000").unwrap(), Uuid::nil());
    }
}
