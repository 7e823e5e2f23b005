/// Tasks
///
/// Tasks have no `business_id` of their own: they belong to a business
/// through their project, and every query joins `projects` to enforce that.
/// Assignees must be members of the same business.
///
/// # Board columns
///
/// ```text
/// todo → in_progress → review → done
/// ```
///
/// Any column can move to any other; the board order in
/// [`crate::ordering`] is what gives the columns their sequence.
///
/// # Example
///
/// ```no_run
/// use tallyboard_shared::models::task::{CreateTask, Task, TaskFilter, TaskPriority};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, business_id: Uuid, project_id: Uuid) -> Result<(), Box<dyn std::error::Error>> {
/// let task = Task::create(&pool, business_id, CreateTask {
///     project_id,
///     title: "Draft proposal".to_string(),
///     priority: Some(TaskPriority::High),
///     ..Default::default()
/// }).await?;
///
/// let board = Task::list_by_business(&pool, business_id, &TaskFilter::default(), 100, 0).await?;
/// assert!(board.iter().any(|item| item.task.id == task.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::business_member::BusinessMember;
use super::project::Project;
use crate::error::{DomainError, DomainResult};
use crate::ordering::TASK_BOARD_ORDER_SQL;

const TASK_COLUMNS: &str = "t.id, t.project_id, t.assignee_id, t.title, t.description, \
    t.status, t.priority, t.due_date, t.created_at, t.updated_at";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 4] = [
        TaskStatus::Todo,
        TaskStatus::InProgress,
        TaskStatus::Review,
        TaskStatus::Done,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Review => "review",
            TaskStatus::Done => "done",
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Todo
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        TaskPriority::Medium
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Uuid,
    pub assignee_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A task row with the names the board displays
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct TaskListItem {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub task: Task,
    pub project_name: String,
    pub assignee_name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateTask {
    pub project_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTask {
    /// Move the task to another project of the same business
    pub project_id: Option<Uuid>,
    pub title: Option<String>,
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub assignee_id: Option<Option<Uuid>>,
    #[serde(default, deserialize_with = "crate::serde_util::double_option")]
    pub due_date: Option<Option<NaiveDate>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub project_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct TaskStatusCount {
    pub status: TaskStatus,
    pub count: i64,
}

impl Task {
    async fn check_project(conn: &mut PgConnection, project_id: Uuid, business_id: Uuid) -> DomainResult<()> {
        match Project::find_by_id(&mut *conn, project_id, business_id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::cross_tenant("project", project_id)),
        }
    }

    async fn check_assignee(conn: &mut PgConnection, assignee_id: Uuid, business_id: Uuid) -> DomainResult<()> {
        match BusinessMember::get_role(&mut *conn, business_id, assignee_id).await? {
            Some(_) => Ok(()),
            None => Err(DomainError::cross_tenant("user", assignee_id)),
        }
    }

    /// Creates a task in one of the business's projects
    ///
    /// # Errors
    ///
    /// - [`DomainError::CrossTenant`] if the project is not in `business_id`,
    ///   or the assignee is not a member of it
    pub async fn create(pool: &PgPool, business_id: Uuid, data: CreateTask) -> DomainResult<Self> {
        let mut tx = pool.begin().await?;

        Self::check_project(&mut tx, data.project_id, business_id).await?;
        if let Some(assignee_id) = data.assignee_id {
            Self::check_assignee(&mut tx, assignee_id, business_id).await?;
        }

        let task = sqlx::query_as::<_, Task>(
            r#"
            INSERT INTO tasks (project_id, assignee_id, title, description, status, priority, due_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id, project_id, assignee_id, title, description,
                      status, priority, due_date, created_at, updated_at
            "#,
        )
        .bind(data.project_id)
        .bind(data.assignee_id)
        .bind(data.title.trim())
        .bind(data.description)
        .bind(data.status.unwrap_or_default())
        .bind(data.priority.unwrap_or_default())
        .bind(data.due_date)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(task)
    }

    /// Fetches a task whose project belongs to `business_id`
    pub async fn find_by_id<'e, E>(
        executor: E,
        id: Uuid,
        business_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let sql = format!(
            "SELECT {} FROM tasks t
             JOIN projects p ON p.id = t.project_id
             WHERE t.id = $1 AND p.business_id = $2",
            TASK_COLUMNS
        );

        sqlx::query_as::<_, Task>(&sql)
            .bind(id)
            .bind(business_id)
            .fetch_optional(executor)
            .await
    }

    /// Applies the `Some` fields of `data`; `Ok(None)` if the task is not in this business
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        business_id: Uuid,
        data: UpdateTask,
    ) -> DomainResult<Option<Self>> {
        let mut tx = pool.begin().await?;

        if let Some(project_id) = data.project_id {
            Self::check_project(&mut tx, project_id, business_id).await?;
        }
        if let Some(Some(assignee_id)) = data.assignee_id {
            Self::check_assignee(&mut tx, assignee_id, business_id).await?;
        }

        let mut query = String::from("UPDATE tasks t SET updated_at = NOW()");
        let mut bind_count = 2;

        if data.project_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(", project_id = ${}", bind_count));
        }
        if data.title.is_some() {
            bind_count += 1;
            query.push_str(&format!(", title = ${}", bind_count));
        }
        if data.description.is_some() {
            bind_count += 1;
            query.push_str(&format!(", description = ${}", bind_count));
        }
        if data.status.is_some() {
            bind_count += 1;
            query.push_str(&format!(", status = ${}", bind_count));
        }
        if data.priority.is_some() {
            bind_count += 1;
            query.push_str(&format!(", priority = ${}", bind_count));
        }
        if data.assignee_id.is_some() {
            bind_count += 1;
            query.push_str(&format!(", assignee_id = ${}", bind_count));
        }
        if data.due_date.is_some() {
            bind_count += 1;
            query.push_str(&format!(", due_date = ${}", bind_count));
        }

        query.push_str(&format!(
            " FROM projects p WHERE t.id = $1 AND p.id = t.project_id AND p.business_id = $2 RETURNING {}",
            TASK_COLUMNS
        ));

        let mut q = sqlx::query_as::<_, Task>(&query).bind(id).bind(business_id);

        if let Some(project_id) = data.project_id {
            q = q.bind(project_id);
        }
        if let Some(title) = data.title {
            q = q.bind(title.trim().to_string());
        }
        if let Some(description) = data.description {
            q = q.bind(description);
        }
        if let Some(status) = data.status {
            q = q.bind(status);
        }
        if let Some(priority) = data.priority {
            q = q.bind(priority);
        }
        if let Some(assignee_id) = data.assignee_id {
            q = q.bind(assignee_id);
        }
        if let Some(due_date) = data.due_date {
            q = q.bind(due_date);
        }

        let task = q.fetch_optional(&mut *tx).await?;
        tx.commit().await?;

        Ok(task)
    }

    /// `true` only for the call that actually removed the row
    pub async fn delete(pool: &PgPool, id: Uuid, business_id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM tasks t
            USING projects p
            WHERE t.id = $1 AND p.id = t.project_id AND p.business_id = $2
            "#,
        )
        .bind(id)
        .bind(business_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Lists tasks in board order (see [`crate::ordering`])
    pub async fn list_by_business(
        pool: &PgPool,
        business_id: Uuid,
        filter: &TaskFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<TaskListItem>, sqlx::Error> {
        let mut qb: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {}, p.name AS project_name, u.name AS assignee_name
             FROM tasks t
             JOIN projects p ON p.id = t.project_id
             LEFT JOIN users u ON u.id = t.assignee_id
             WHERE p.business_id = ",
            TASK_COLUMNS
        ));
        qb.push_bind(business_id);

        if let Some(project_id) = filter.project_id {
            qb.push(" AND t.project_id = ").push_bind(project_id);
        }
        if let Some(status) = filter.status {
            qb.push(" AND t.status = ").push_bind(status);
        }
        if let Some(priority) = filter.priority {
            qb.push(" AND t.priority = ").push_bind(priority);
        }
        if let Some(assignee_id) = filter.assignee_id {
            qb.push(" AND t.assignee_id = ").push_bind(assignee_id);
        }

        qb.push(" ORDER BY ")
            .push(TASK_BOARD_ORDER_SQL)
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        qb.build_query_as::<TaskListItem>().fetch_all(pool).await
    }

    /// Task counts per status, optionally limited to one project
    ///
    /// Statuses with no tasks are omitted.
    pub async fn count_by_status(
        pool: &PgPool,
        business_id: Uuid,
        project_id: Option<Uuid>,
    ) -> Result<Vec<TaskStatusCount>, sqlx::Error> {
        sqlx::query_as::<_, TaskStatusCount>(
            r#"
            SELECT t.status, COUNT(*) AS count
            FROM tasks t
            JOIN projects p ON p.id = t.project_id
            WHERE p.business_id = $1
              AND ($2::uuid IS NULL OR t.project_id = $2)
            GROUP BY t.status
            ORDER BY t.status
            "#,
        )
        .bind(business_id)
        .bind(project_id)
        .fetch_all(pool)
        .await
    }
}
