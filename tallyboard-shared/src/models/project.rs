/// Projects
///
/// A project belongs to one business and is the tenancy anchor for its
/// tasks, and through them for time entries and invoices. Every lookup takes
/// the caller's `business_id` and filters on it, so a project id from another
/// business behaves exactly like a missing one.
///
/// # Lifecycle
///
/// ```text
/// planning → active ⇄ on_hold
///              ↓
///          completed → archived
/// ```
///
/// Status changes are free-form edits; the diagram is the usual flow, not an
/// enforced state machine.
///
/// # Example
///
/// ```no_run
/// use tallyboard_shared::models::project::{CreateProject, Project, ProjectStatus};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, business_id: Uuid, user_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let project = Project::create_with_owner(&pool, business_id, user_id, CreateProject {
///     name: "Website relaunch".to_string(),
///     status: Some(ProjectStatus::Active),
///     ..Default::default()
/// }).await?;
///
/// let fetched = Project::find_by_id(&pool, project.id, business_id).await?;
/// assert_eq!(fetched.map(|p| p.name), Some("Website relaunch".to_string()));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgExecutor, PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use super::client::Client;
use super::project_member::{ProjectMember, ProjectRole};
use crate::error::{DomainError, DomainResult};
use crate::reports::progress_percent;

const PROJECT_COLUMNS: &str =
    "id, business_id, owner_id, client_id, name, description, status, due_date, created_at, updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planning,
    Active,
    OnHold,
    Completed,
    Archived,
}

impl ProjectStatus {
    pub const ALL: [ProjectStatus; 5] = [
        ProjectStatus::Planning,
        ProjectStatus::Active,
        ProjectStatus::OnHold,
        ProjectStatus::Completed,
        ProjectStatus::Archived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planning => "planning",
            ProjectStatus::Active => "active",
            ProjectStatus::OnHold => "on_hold",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Archived => "archived",
        }
    }

    /// Completed and archived projects do not count as active
    pub fn is_closed(&self) -> bool {
        matches!(self, ProjectStatus::Completed | ProjectStatus::Archived)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    pub id: Uuid,
    pub business_id: Uuid,
    pub owner_id: Uuid,
    pub client_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A project with its task completion, as shown in project lists
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProjectWithProgress {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub project: Project,
    pub total_tasks: i64,
    pub done_tasks: i64,
    /// 0 to 100, and 0 for a project without tasks
    #[sqlx(skip)]
    pub progress_percent: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
    /// Defaults to `planning`
    pub status: Option<ProjectStatus>,
    pub client_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProject {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub client_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub due_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectFilter {
    pub status: Option<ProjectStatus>,
    pub client_id: Option<Uuid>,
}

impl Project {
    async fn check_client<'e, E>(executor: E, client_id: Uuid, business_id: Uuid) -> DomainResult<()>
    where
        E: PgExecutor<'e>,
    {
        match Client::find_by_id(executor, client_id, business_id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::cross_tenant("client", client_id)),
        }
    }

    /// Creates a project and adds its creator as a `manager` member
    ///
    /// # Errors
    ///
    /// - [`DomainError::CrossTenant`] if `client_id` is not a client of this business
    /// - [`DomainError::Database`] on any database failure; nothing is written
    pub async fn create_with_owner(
        pool: &PgPool,
        business_id: Uuid,
        owner_id: Uuid,
        data: CreateProject,
    ) -> DomainResult<Self> {
        let mut tx = pool.begin().await?;

        if let Some(client_id) = data.client_id {
            Self::check_client(&mut *tx, client_id, business_id).await?;
        }

        let sql = format!(
            "INSERT INTO projects (business_id, owner_id, client_id, name, description, status, due_date)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {}",
            PROJECT_COLUMNS
        );

        let project = sqlx::query_as::<_, Project>(&sql)
            .bind(business_id)
            .bind(owner_id)
            .bind(data.client_id)
            .bind(data.name.trim())
            .bind(data.description)
            .bind(data.status.unwrap_or(ProjectStatus::Planning))
            .bind(data.due_date)
            .fetch_one(&mut *tx)
            .await?;

        ProjectMember::insert(&mut *tx, project.id, owner_id, ProjectRole::Manager).await?;

        tx.commit().await?;

        info!(project_id = %project.id, business_id = %business_id, "Project created");

        Ok(project)
    }

    /// Fetches a project only if it belongs to `business_id`
    pub async fn find_by_id<'e, E>(
        executor: E,
        id: Uuid,
        business_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {} FROM projects WHERE id = $1 AND business_id = $2",
            PROJECT_COLUMNS
        );

        sqlx::query_as::<_, Project>(&sql)
            .bind(id)
            .bind(business_id)
            .fetch_optional(executor)
            .await
    }

    /// Applies the `Some` fields of `data`
    ///
    /// Returns `Ok(None)` if the project is not in this business.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        business_id: Uuid,
        data: UpdateProject,
    ) -> DomainResult<Option<Self>> {
        if let Some(Some(client_id)) = data.client_id {
            Self::check_client(pool, client_id, business_id).await?;
        }

        let mut query = String::from("UPDATE projects SET updated_at = NOW()");
        let mut bind_count = 2;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if data.status.is_some() {
            bind_count += 1;
            query.push_str(&format!(", status = ${}", bind_count));
        }
        if data.client_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(", client_id = ${}", bind_count));
        }
        if data.due_date.is_some() {
            bind_count += 1;
            query.push_str(&format!(", due_date = ${}", bind_count));
        }

        query.push_str(&format!(
            " WHERE id = $1 AND business_id = $2 RETURNING {}",
            PROJECT_COLUMNS
        ));

        let mut q = sqlx::query_as::<_, Project>(&query).bind(id).bind(business_id);

        if let Some(name) = data.name {
            q = q.bind(name.trim().to_string());
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(status) = data.status {
            q = q.bind(status);
        }
        if let Some(client_id) = data.client_id {
            q = q.bind(client_id);
        }
        if let Some(due_date) = data.due_date {
            q = q.bind(due_date);
        }

        Ok(q.fetch_optional(pool).await?)
    }

    /// Deletes the project with its tasks, time entries, invoices, and members
    pub async fn delete(pool: &PgPool, id: Uuid, business_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND business_id = $2")
            .bind(id)
            .bind(business_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists projects newest first with task counts and progress
    pub async fn list_by_business(
        pool: &PgPool,
        business_id: Uuid,
        filter: &ProjectFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ProjectWithProgress>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(
            r#"
            SELECT p.id, p.business_id, p.owner_id, p.client_id, p.name, p.description,
                   p.status, p.due_date, p.created_at, p.updated_at,
                   COUNT(t.id) AS total_tasks,
                   COUNT(t.id) FILTER (WHERE t.status = 'done') AS done_tasks
            FROM projects p
            LEFT JOIN tasks t ON t.project_id = p.id
            WHERE p.business_id = "#,
        );
        qb.push_bind(business_id);

        if let Some(status) = filter.status {
            qb.push(" AND p.status = ").push_bind(status);
        }
        if let Some(client_id) = filter.client_id {
            qb.push(" AND p.client_id = ").push_bind(client_id);
        }

        qb.push(" GROUP BY p.id ORDER BY p.created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let mut rows = qb
            .build_query_as::<ProjectWithProgress>()
            .fetch_all(pool)
            .await?;

        for row in &mut rows {
            row.progress_percent = progress_percent(row.done_tasks, row.total_tasks);
        }

        Ok(rows)
    }

    /// Done and total task counts for one project, `None` if not in this business
    pub async fn progress(
        pool: &PgPool,
        id: Uuid,
        business_id: Uuid,
    ) -> Result<Option<ProjectProgress>, sqlx::Error> {
        let counts: Option<(i64, i64)> = sqlx::query_as(
            r#"
            SELECT COUNT(t.id),
                   COUNT(t.id) FILTER (WHERE t.status = 'done')
            FROM projects p
            LEFT JOIN tasks t ON t.project_id = p.id
            WHERE p.id = $1 AND p.business_id = $2
            GROUP BY p.id
            "#,
        )
        .bind(id)
        .bind(business_id)
        .fetch_optional(pool)
        .await?;

        Ok(counts.map(|(total_tasks, done_tasks)| ProjectProgress {
            project_id: id,
            total_tasks,
            done_tasks,
            progress_percent: progress_percent(done_tasks, total_tasks),
        }))
    }

    pub async fn count_by_business(pool: &PgPool, business_id: Uuid) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM projects WHERE business_id = $1")
            .bind(business_id)
            .fetch_one(pool)
            .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProjectProgress {
    pub project_id: Uuid,
    pub total_tasks: i64,
    pub done_tasks: i64,
    pub progress_percent: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde_snake_case() {
        assert_eq!(serde_json::to_string(&ProjectStatus::OnHold).unwrap(), "\"on_hold\"");
        let status: ProjectStatus = serde_json::from_str("\"on_hold\"").unwrap();
        assert_eq!(status, ProjectStatus::OnHold);
        assert_eq!(status.as_str(), "on_hold");
    }

    #[test]
    fn test_is_closed() {
        assert!(ProjectStatus::Completed.is_closed());
        assert!(ProjectStatus::Archived.is_closed());
        assert!(!ProjectStatus::OnHold.is_closed());
    }

    #[test]
    fn test_update_project_clears_client() {
        let update: UpdateProject = serde_json::from_str(r#"{"client_id": null}"#).unwrap();
        assert_eq!(update.client_id, Some(None));
        assert!(update.due_date.is_none());
    }

    #[test]
    fn test_project_with_progress_flattens() {
        let now = Utc::now();
        let row = ProjectWithProgress {
            project: Project {
                id: Uuid::new_v4(),
                business_id: Uuid::new_v4(),
                owner_id: Uuid::new_v4(),
                client_id: None,
                name: "Audit".to_string(),
                description: None,
                status: ProjectStatus::Active,
                due_date: None,
                created_at: now,
                updated_at: now,
            },
            total_tasks: 4,
            done_tasks: 1,
            progress_percent: 25.0,
        };

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["name"], "Audit");
        assert_eq!(json["status"], "active");
        assert_eq!(json["progress_percent"], 25.0);
    }
}
