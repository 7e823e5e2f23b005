/// Role checks against `business_members`
///
/// A token names a business, but the role a user holds there is always read
/// from the database so that role changes and removals take effect
/// immediately instead of when the token expires.
///
/// | permission | minimum role |
/// |------------|--------------|
/// | Read       | viewer       |
/// | Write      | member       |
/// | Manage     | admin        |
/// | Own        | owner        |
///
/// # Example
///
/// ```no_run
/// use tallyboard_shared::auth::authorization::{require_permission, ResourcePermission};
/// use tallyboard_shared::auth::middleware::AuthContext;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, auth: AuthContext) -> Result<(), Box<dyn std::error::Error>> {
/// let role = require_permission(&pool, &auth, ResourcePermission::Write).await?;
/// println!("acting as {}", role.as_str());
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use uuid::Uuid;

use super::middleware::AuthContext;
use crate::models::business_member::{BusinessMember, MemberRole};

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Not a member of business {0}")]
    NotMember(Uuid),

    #[error("Insufficient permissions: requires {}, has {}", required.as_str(), actual.as_str())]
    InsufficientRole {
        required: MemberRole,
        actual: MemberRole,
    },

    #[error("Not authorized to access this resource")]
    NotAuthorized,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourcePermission {
    Read,
    Write,
    Manage,
    Own,
}

impl ResourcePermission {
    pub fn min_role(&self) -> MemberRole {
        match self {
            ResourcePermission::Read => MemberRole::Viewer,
            ResourcePermission::Write => MemberRole::Member,
            ResourcePermission::Manage => MemberRole::Admin,
            ResourcePermission::Own => MemberRole::Owner,
        }
    }
}

/// Returns the caller's role in `business_id`, or [`AuthzError::NotMember`]
pub async fn require_membership(
    pool: &PgPool,
    business_id: Uuid,
    user_id: Uuid,
) -> Result<MemberRole, AuthzError> {
    BusinessMember::get_role(pool, business_id, user_id)
        .await?
        .ok_or(AuthzError::NotMember(business_id))
}

/// Checks that the caller holds at least `required` in `business_id`
///
/// # Errors
///
/// - [`AuthzError::NotMember`] if there is no membership row
/// - [`AuthzError::InsufficientRole`] if the role ranks below `required`
pub async fn require_role(
    pool: &PgPool,
    business_id: Uuid,
    user_id: Uuid,
    required: MemberRole,
) -> Result<MemberRole, AuthzError> {
    let actual = require_membership(pool, business_id, user_id).await?;
    check_role(actual, required)
}

/// Role check for the business selected by the caller's token
pub async fn require_permission(
    pool: &PgPool,
    auth: &AuthContext,
    permission: ResourcePermission,
) -> Result<MemberRole, AuthzError> {
    require_role(pool, auth.business_id, auth.user_id, permission.min_role()).await
}

/// Pure half of [`require_role`]
pub fn check_role(actual: MemberRole, required: MemberRole) -> Result<MemberRole, AuthzError> {
    if actual.has_permission(&required) {
        Ok(actual)
    } else {
        Err(AuthzError::InsufficientRole { required, actual })
    }
}

pub fn require_ownership(auth: &AuthContext, resource_owner_id: Uuid) -> Result<(), AuthzError> {
    if auth.user_id != resource_owner_id {
        return Err(AuthzError::NotAuthorized);
    }

    Ok(())
}

/// Owners of a resource pass; everyone else needs `permission`
pub async fn require_owner_or(
    pool: &PgPool,
    auth: &AuthContext,
    resource_owner_id: Uuid,
    permission: ResourcePermission,
) -> Result<(), AuthzError> {
    if require_ownership(auth, resource_owner_id).is_ok() {
        require_membership(pool, auth.business_id, auth.user_id).await?;
        return Ok(());
    }

    require_permission(pool, auth, permission).await.map(|_| ())
}
