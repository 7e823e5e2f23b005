/// Business membership (the tenancy join table)
///
/// `business_members` is the only place that says which users belong to
/// which business and with what role. Every role check in the API reads it.
///
/// # Roles
///
/// | role   | can                                                        |
/// |--------|------------------------------------------------------------|
/// | owner  | everything, including billing and deleting the business    |
/// | admin  | manage the team, clients, invoices, and all projects       |
/// | member | create and edit projects, tasks, and time entries          |
/// | viewer | read only                                                  |
///
/// # Example
///
/// ```no_run
/// use tallyboard_shared::models::business_member::{BusinessMember, CreateBusinessMember, MemberRole};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, business_id: Uuid, user_id: Uuid) -> Result<(), sqlx::Error> {
/// BusinessMember::create(&pool, CreateBusinessMember {
///     business_id,
///     user_id,
///     role: MemberRole::Member,
/// }).await?;
///
/// let role = BusinessMember::get_role(&pool, business_id, user_id).await?;
/// assert_eq!(role, Some(MemberRole::Member));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgExecutor, PgPool};
use uuid::Uuid;

use super::user::UserStatus;
use crate::error::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "member_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Owner,
    Admin,
    Member,
    Viewer,
}

impl MemberRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::Owner => "owner",
            MemberRole::Admin => "admin",
            MemberRole::Member => "member",
            MemberRole::Viewer => "viewer",
        }
    }

    /// Invite, remove, and re-role members
    pub fn can_manage_team(&self) -> bool {
        matches!(self, MemberRole::Owner | MemberRole::Admin)
    }

    /// Change plan, send and settle invoices
    pub fn can_manage_billing(&self) -> bool {
        matches!(self, MemberRole::Owner | MemberRole::Admin)
    }

    pub fn can_delete_business(&self) -> bool {
        matches!(self, MemberRole::Owner)
    }

    /// Anything above read-only
    pub fn can_write(&self) -> bool {
        !matches!(self, MemberRole::Viewer)
    }

    /// Hierarchy: Owner > Admin > Member > Viewer
    pub fn has_permission(&self, required: &MemberRole) -> bool {
        self.permission_level() >= required.permission_level()
    }

    fn permission_level(&self) -> u8 {
        match self {
            MemberRole::Owner => 4,
            MemberRole::Admin => 3,
            MemberRole::Member => 2,
            MemberRole::Viewer => 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct BusinessMember {
    pub business_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateBusinessMember {
    pub business_id: Uuid,
    pub user_id: Uuid,
    pub role: MemberRole,
}

/// A membership joined with the user it belongs to, as listed on the team page
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TeamMember {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub status: UserStatus,
    pub role: MemberRole,
    pub two_factor_enabled: bool,
    pub last_login_at: Option<DateTime<Utc>>,
    pub joined_at: DateTime<Utc>,
}

impl BusinessMember {
    /// Adds a user to a business
    ///
    /// # Errors
    ///
    /// Unique violation on the primary key if the user is already a member;
    /// foreign-key violation if either side does not exist.
    pub async fn create<'e, E>(executor: E, data: CreateBusinessMember) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, BusinessMember>(
            r#"
            INSERT INTO business_members (business_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING business_id, user_id, role, created_at
            "#,
        )
        .bind(data.business_id)
        .bind(data.user_id)
        .bind(data.role)
        .fetch_one(executor)
        .await
    }

    pub async fn find(
        pool: &PgPool,
        business_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, BusinessMember>(
            r#"
            SELECT business_id, user_id, role, created_at
            FROM business_members
            WHERE business_id = $1 AND user_id = $2
            "#,
        )
        .bind(business_id)
        .bind(user_id)
        .fetch_optional(pool)
        .await
    }

    /// The user's role in the business, `None` if not a member
    pub async fn get_role<'e, E>(
        executor: E,
        business_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<MemberRole>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_scalar::<_, MemberRole>(
            "SELECT role FROM business_members WHERE business_id = $1 AND user_id = $2",
        )
        .bind(business_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
    }

    /// Locks the business's owner rows for the rest of the transaction and
    /// refuses a change that would leave it without an owner
    ///
    /// `next` is the role `user_id` ends up with, `None` when removed.
    /// Concurrent demotions or removals queue on the row locks, so each sees
    /// the owners the previous one left.
    async fn ensure_owner_remains(
        conn: &mut PgConnection,
        business_id: Uuid,
        user_id: Uuid,
        next: Option<MemberRole>,
    ) -> DomainResult<()> {
        let owners: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT user_id FROM business_members
            WHERE business_id = $1 AND role = 'owner'
            ORDER BY user_id
            FOR UPDATE
            "#,
        )
        .bind(business_id)
        .fetch_all(&mut *conn)
        .await?;

        if leaves_no_owner(&owners, user_id, next) {
            return Err(DomainError::Conflict(
                "A business must keep at least one owner".to_string(),
            ));
        }
        Ok(())
    }

    /// Changes a member's role, `None` if not a member
    ///
    /// # Errors
    ///
    /// [`DomainError::Conflict`] when demoting the last owner.
    pub async fn update_role(
        pool: &PgPool,
        business_id: Uuid,
        user_id: Uuid,
        role: MemberRole,
    ) -> DomainResult<Option<Self>> {
        let mut tx = pool.begin().await?;
        Self::ensure_owner_remains(&mut tx, business_id, user_id, Some(role)).await?;

        let member = sqlx::query_as::<_, BusinessMember>(
            r#"
            UPDATE business_members
            SET role = $3
            WHERE business_id = $1 AND user_id = $2
            RETURNING business_id, user_id, role, created_at
            "#,
        )
        .bind(business_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(member)
    }

    /// Removes a user from a business
    ///
    /// The user's project memberships inside this business go with it, and
    /// tasks in this business assigned to them are unassigned.
    ///
    /// # Errors
    ///
    /// [`DomainError::Conflict`] when removing the last owner.
    pub async fn delete(pool: &PgPool, business_id: Uuid, user_id: Uuid) -> DomainResult<bool> {
        let mut tx = pool.begin().await?;
        Self::ensure_owner_remains(&mut tx, business_id, user_id, None).await?;

        sqlx::query(
            r#"
            DELETE FROM project_members pm
            USING projects p
            WHERE pm.project_id = p.id AND p.business_id = $1 AND pm.user_id = $2
            "#,
        )
        .bind(business_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE tasks t
            SET assignee_id = NULL, updated_at = NOW()
            FROM projects p
            WHERE t.project_id = p.id AND p.business_id = $1 AND t.assignee_id = $2
            "#,
        )
        .bind(business_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM business_members WHERE business_id = $1 AND user_id = $2")
            .bind(business_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    /// Team listing: owners first, then by role, then name
    pub async fn list_by_business(
        pool: &PgPool,
        business_id: Uuid,
    ) -> Result<Vec<TeamMember>, sqlx::Error> {
        sqlx::query_as::<_, TeamMember>(
            r#"
            SELECT u.id AS user_id, u.name, u.email, u.status, bm.role,
                   u.two_factor_enabled, u.last_login_at, bm.created_at AS joined_at
            FROM business_members bm
            JOIN users u ON u.id = bm.user_id
            WHERE bm.business_id = $1
            ORDER BY bm.role ASC, LOWER(u.name) ASC
            "#,
        )
        .bind(business_id)
        .fetch_all(pool)
        .await
    }

    /// All memberships of a user, oldest first
    pub async fn list_by_user(pool: &PgPool, user_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, BusinessMember>(
            r#"
            SELECT business_id, user_id, role, created_at
            FROM business_members
            WHERE user_id = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    pub async fn count_by_business(pool: &PgPool, business_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM business_members WHERE business_id = $1")
            .bind(business_id)
            .fetch_one(pool)
            .await
    }

    pub async fn count_owners(pool: &PgPool, business_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "SELECT COUNT(*) FROM business_members WHERE business_id = $1 AND role = 'owner'",
        )
        .bind(business_id)
        .fetch_one(pool)
        .await
    }
}

/// True when `user_id` is the only owner and stops being one
fn leaves_no_owner(owners: &[Uuid], user_id: Uuid, next: Option<MemberRole>) -> bool {
    let loses_owner = owners.contains(&user_id) && next != Some(MemberRole::Owner);
    loses_owner && owners.len() <= 1
}
