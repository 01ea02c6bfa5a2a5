/// Limit/offset pagination for list endpoints
///
/// Lists accept `limit` (default 20, `0` meaning the maximum of 1000) and
/// `offset` (default 0) and answer with
///
/// ```json
/// {
///   "meta": {"limit": 20, "offset": 0, "total_count": 42,
///            "next": "/api/v1/tasks?date=2024-01-10&limit=20&offset=20", "previous": null},
///   "objects": [...]
/// }
/// ```

use serde::Serialize;

use crate::error::{ApiError, ApiResult};

pub const DEFAULT_LIMIT: i64 = 20;
pub const MAX_LIMIT: i64 = 1000;

/// Requested window into a list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Page {
    /// Reads `limit` and `offset` from query parameters
    ///
    /// # Errors
    ///
    /// `InvalidOperator` when either is present but not a non-negative integer.
    pub fn from_params(params: &[(String, String)]) -> ApiResult<Self> {
        let mut page = Page::default();

        for (key, value) in params {
            match key.as_str() {
                "limit" => {
                    let limit = parse_non_negative(key, value)?;
                    page.limit = if limit == 0 { MAX_LIMIT } else { limit.min(MAX_LIMIT) };
                }
                "offset" => page.offset = parse_non_negative(key, value)?,
                _ => {}
            }
        }

        Ok(page)
    }
}

fn parse_non_negative(key: &str, value: &str) -> ApiResult<i64> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|n| *n >= 0)
        .ok_or_else(|| ApiError::invalid(format!("Invalid {} '{}': must be a number", key, value), key))
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ListMeta {
    pub limit: i64,
    pub offset: i64,
    pub total_count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
}

/// One page of a list plus its `meta` block
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse<T> {
    pub meta: ListMeta,
    pub objects: Vec<T>,
}

impl<T> ListResponse<T> {
    /// `path` and `params` are the current request's, used to build the
    /// `next`/`previous` links
    pub fn new(
        path: &str,
        params: &[(String, String)],
        page: Page,
        total_count: i64,
        objects: Vec<T>,
    ) -> Self {
        let next = page
            .offset
            .checked_add(page.limit)
            .filter(|end| *end < total_count)
            .and_then(|end| page_link(path, params, page.limit, end));
        let previous = (page.offset > 0)
            .then(|| page_link(path, params, page.limit, page.offset.saturating_sub(page.limit).max(0)))
            .flatten();

        Self {
            meta: ListMeta {
                limit: page.limit,
                offset: page.offset,
                total_count,
                next,
                previous,
            },
            objects,
        }
    }
}

fn page_link(path: &str, params: &[(String, String)], limit: i64, offset: i64) -> Option<String> {
    let limit = limit.to_string();
    let offset = offset.to_string();

    let mut pairs: Vec<(&str, &str)> = params
        .iter()
        .filter(|(k, _)| k != "limit" && k != "offset")
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    pairs.push(("limit", limit.as_str()));
    pairs.push(("offset", offset.as_str()));

    serde_urlencoded::to_string(&pairs)
        .ok()
        .map(|query| format!("{}?{}", path, query))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        assert_eq!(Page::from_params(&[]).unwrap(), Page { limit: 20, offset: 0 });
    }

    #[test]
    fn test_limit_zero_means_max() {
        let page = Page::from_params(&params(&[("limit", "0")])).unwrap();
        assert_eq!(page.limit, MAX_LIMIT);

        let page = Page::from_params(&params(&[("limit", "5000")])).unwrap();
        assert_eq!(page.limit, MAX_LIMIT);
    }

    #[test]
    fn test_invalid_values_rejected() {
        for (key, value) in [("limit", "ten"), ("offset", "-1"), ("limit", "1.5")] {
            let err = Page::from_params(&params(&[(key, value)])).unwrap_err();
            assert!(
                matches!(err, ApiError::InvalidOperator { field: Some(ref f), .. } if f == key),
                "{key}={value}"
            );
        }
    }

    #[test]
    fn test_links_preserve_other_params() {
        let query = params(&[("date", "2024-01-10"), ("q", "stand up"), ("limit", "2")]);
        let page = Page::from_params(&query).unwrap();

        let list = ListResponse::new("/api/v1/tasks", &query, page, 5, vec![1, 2]);

        assert_eq!(
            list.meta.next.as_deref(),
            Some("/api/v1/tasks?date=2024-01-10&q=stand+up&limit=2&offset=2")
        );
        assert_eq!(list.meta.previous, None);
        assert_eq!(list.meta.total_count, 5);
    }

    #[test]
    fn test_last_page_has_previous_only() {
        let query = params(&[("limit", "2"), ("offset", "4")]);
        let page = Page::from_params(&query).unwrap();

        let list = ListResponse::new("/api/v1/userprofile", &query, page, 5, vec!['x']);

        assert_eq!(list.meta.next, None);
        assert_eq!(
            list.meta.previous.as_deref(),
            Some("/api/v1/userprofile?limit=2&offset=2")
        );
    }

    #[test]
    fn test_huge_offset_has_no_next_link() {
        let offset = i64::MAX.to_string();
        let query = params(&[("offset", offset.as_str())]);
        let page = Page::from_params(&query).unwrap();

        let list: ListResponse<()> = ListResponse::new("/api/v1/tasks", &query, page, 0, vec![]);

        assert_eq!(list.meta.offset, i64::MAX);
        assert_eq!(list.meta.next, None);
        assert_eq!(
            list.meta.previous,
            Some(format!("/api/v1/tasks?limit=20&offset={}", i64::MAX - 20))
        );
    }
}
