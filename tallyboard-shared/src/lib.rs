//! # Tallyboard Shared Library
//!
//! Data access, authentication primitives and report aggregation shared by
//! the Tallyboard API server and the background worker.
//!
//! ## Module Organization
//!
//! - `db`: Connection pool and migrations
//! - `models`: Database models with tenant-scoped CRUD operations
//! - `auth`: Passwords, JWT, TOTP, invitation tokens and authorization
//! - `ordering`: Task board ordering
//! - `reports`: In-memory aggregation for dashboards and reports
//! - `error`: Domain error type
//! - `serde_util`: Serde helpers for partial updates

pub mod auth;
pub mod db;
pub mod error;
pub mod models;
pub mod ordering;
pub mod reports;
pub mod serde_util;

/// Current version of the Tallyboard shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
