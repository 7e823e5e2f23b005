/// Project membership
///
/// Only members of the owning business can be added to a project. The
/// project's creator is added as `manager` when the project is created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::business_member::BusinessMember;
use super::project::Project;
use crate::error::{DomainError, DomainResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_member_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Manager,
    Contributor,
    Observer,
}

impl Default for ProjectRole {
    fn default() -> Self {
        ProjectRole::Contributor
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProjectMember {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: ProjectRole,
    pub created_at: DateTime<Utc>,
}

/// Project member with the user's display fields
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProjectMemberDetail {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: ProjectRole,
    pub added_at: DateTime<Utc>,
}

impl ProjectMember {
    /// Raw insert; callers are responsible for tenancy checks
    pub(crate) async fn insert<'e, E>(
        executor: E,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, ProjectMember>(
            r#"
            INSERT INTO project_members (project_id, user_id, role)
            VALUES ($1, $2, $3)
            RETURNING project_id, user_id, role, created_at
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(executor)
        .await
    }

    /// Adds a business member to a project in that business
    ///
    /// # Errors
    ///
    /// - [`DomainError::NotFound`] if the project is not in `business_id`
    /// - [`DomainError::CrossTenant`] if the user is not a member of the business
    /// - [`DomainError::Conflict`] if the user is already on the project
    pub async fn add(
        pool: &PgPool,
        business_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> DomainResult<Self> {
        let mut tx = pool.begin().await?;

        if Project::find_by_id(&mut *tx, project_id, business_id).await?.is_none() {
            return Err(DomainError::not_found("project", project_id));
        }

        if BusinessMember::get_role(&mut *tx, business_id, user_id).await?.is_none() {
            return Err(DomainError::cross_tenant("user", user_id));
        }

        let member = sqlx::query_as::<_, ProjectMember>(
            r#"
            INSERT INTO project_members (project_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (project_id, user_id) DO NOTHING
            RETURNING project_id, user_id, role, created_at
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DomainError::Conflict("User is already a member of this project".to_string()))?;

        tx.commit().await?;

        Ok(member)
    }

    /// `false` if the user was not on the project or the project is not in this business
    pub async fn remove(
        pool: &PgPool,
        business_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM project_members pm
            USING projects p
            WHERE pm.project_id = p.id
              AND p.id = $1 AND p.business_id = $2 AND pm.user_id = $3
            "#,
        )
        .bind(project_id)
        .bind(business_id)
        .bind(user_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn update_role(
        pool: &PgPool,
        business_id: Uuid,
        project_id: Uuid,
        user_id: Uuid,
        role: ProjectRole,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, ProjectMember>(
            r#"
            UPDATE project_members pm
            SET role = $4
            FROM projects p
            WHERE pm.project_id = p.id
              AND p.id = $1 AND p.business_id = $2 AND pm.user_id = $3
            RETURNING pm.project_id, pm.user_id, pm.role, pm.created_at
            "#,
        )
        .bind(project_id)
        .bind(business_id)
        .bind(user_id)
        .bind(role)
        .fetch_optional(pool)
        .await
    }

    /// Managers first, then by name
    pub async fn list_by_project(
        pool: &PgPool,
        business_id: Uuid,
        project_id: Uuid,
    ) -> Result<Vec<ProjectMemberDetail>, sqlx::Error> {
        sqlx::query_as::<_, ProjectMemberDetail>(
            r#"
            SELECT u.id AS user_id, u.name, u.email, pm.role, pm.created_at AS added_at
            FROM project_members pm
            JOIN projects p ON p.id = pm.project_id
            JOIN users u ON u.id = pm.user_id
            WHERE pm.project_id = $1 AND p.business_id = $2
            ORDER BY pm.role ASC, LOWER(u.name) ASC
            "#,
        )
        .bind(project_id)
        .bind(business_id)
        .fetch_all(pool)
        .await
    }
}
