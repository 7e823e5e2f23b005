/// API route handlers
///
/// Handlers are grouped by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Register, login, refresh, current user, business switching, invitations
/// - `business`: Current business settings and the caller's businesses
/// - `projects`, `tasks`, `time_entries`, `invoices`, `clients`: Tenant resources
/// - `team`: Business membership management
/// - `reports`: Dashboard and report aggregates
/// - `settings`, `two_factor`: Account settings

pub mod auth;
pub mod business;
pub mod clients;
pub mod health;
pub mod invoices;
pub mod projects;
pub mod reports;
pub mod settings;
pub mod tasks;
pub mod team;
pub mod time_entries;
pub mod two_factor;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

/// `?limit=&offset=` query parameters
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Pagination {
    pub fn limit(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

/// One page of a list endpoint
#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, pagination: &Pagination) -> Self {
        Self {
            items,
            limit: pagination.limit(),
            offset: pagination.offset(),
        }
    }
}

/// Body of delete endpoints
#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// Trims `value` and rejects it when nothing is left
pub(crate) fn non_blank(field: &str, value: &str) -> Result<String, crate::error::ApiError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(crate::error::ApiError::field(field, format!("{} must not be blank", field)));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_defaults_and_clamps() {
        let page = Pagination::default();
        assert_eq!(page.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(page.offset(), 0);

        let page = Pagination {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(page.limit(), MAX_PAGE_SIZE);
        assert_eq!(page.offset(), 0);

        let page = Pagination {
            limit: Some(0),
            offset: Some(40),
        };
        assert_eq!(page.limit(), 1);
        assert_eq!(page.offset(), 40);
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank("name", "  Acme  ").unwrap(), "Acme");
        assert!(non_blank("name", "   ").is_err());
    }
}
