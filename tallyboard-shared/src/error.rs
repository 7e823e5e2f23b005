//! Domain error type for data-access operations that enforce business rules.
//!
//! Plain lookups return `Result<Option<T>, sqlx::Error>`; operations that
//! check tenancy or lifecycle rules before writing return [`DomainResult`].

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DomainError {
    /// Row does not exist in the caller's business
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: Uuid },

    /// Referenced row exists but belongs to another business
    #[error("{entity} {id} does not belong to this business")]
    CrossTenant { entity: &'static str, id: Uuid },

    /// Lifecycle transition not allowed from the current state
    #[error("Cannot {action} {entity} in status {from}")]
    InvalidTransition {
        entity: &'static str,
        action: &'static str,
        from: String,
    },

    /// Input rejected by a domain rule
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation would conflict with existing state
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        DomainError::NotFound { entity, id }
    }

    pub fn cross_tenant(entity: &'static str, id: Uuid) -> Self {
        DomainError::CrossTenant { entity, id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let id = Uuid::nil();
        assert_eq!(
            DomainError::not_found("project", id).to_string(),
            format!("project {} not found", id)
        );
        let err = DomainError::InvalidTransition {
            entity: "invoice",
            action: "send",
            from: "paid".to_string(),
        };
        assert_eq!(err.to_string(), "Cannot send invoice in status paid");
    }
}
