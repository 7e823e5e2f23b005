/// Task endpoints
///
/// # Endpoints
///
/// - `GET /v1/tasks` - Board-ordered list (`?project_id=&status=&priority=&assignee_id=`)
/// - `POST /v1/tasks` - Create a task in one of the business's projects
/// - `GET /v1/tasks/:id` - Fetch
/// - `PATCH /v1/tasks/:id` - Update, move between projects, reassign
/// - `DELETE /v1/tasks/:id` - Delete
///
/// Reading needs the viewer role, everything else member or above.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{non_blank, DeleteResponse, Page, Pagination},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use tallyboard_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::task::{
        CreateTask, Task, TaskFilter, TaskListItem, TaskPriority, TaskStatus, UpdateTask,
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTaskRequest {
    pub project_id: Uuid,

    #[validate(length(min = 1, max = 500, message = "Title must be 1-500 characters"))]
    pub title: String,

    #[validate(length(max = 10000, message = "Description must be at most 10000 characters"))]
    pub description: Option<String>,

    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub assignee_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

impl CreateTaskRequest {
    fn into_model(self) -> ApiResult<CreateTask> {
        Ok(CreateTask {
            project_id: self.project_id,
            title: non_blank("title", &self.title)?,
            description: self.description,
            status: self.status,
            priority: self.priority,
            assignee_id: self.assignee_id,
            due_date: self.due_date,
        })
    }
}

/// # Endpoint
///
/// ```text
/// GET /v1/tasks?project_id=uuid&status=in_progress
/// Authorization: Bearer <jwt_token>
/// ```
///
/// Tasks come back in board order: status, then priority, then due date
/// with undated tasks last.
pub async fn list_tasks(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(filter): Query<TaskFilter>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Page<TaskListItem>>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let tasks =
        Task::list_by_business(&state.db, auth.business_id, &filter, page.limit(), page.offset())
            .await?;

    Ok(Json(Page::new(tasks, &page)))
}

/// # Endpoint
///
/// ```text
/// POST /v1/tasks
/// Authorization: Bearer <jwt_token>
///
/// { "project_id": "uuid", "title": "Draft homepage copy", "priority": "high" }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Validation failed, or the project or
///   assignee belongs to another business
pub async fn create_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateTaskRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    req.validate()?;
    require_permission(&state.db, &auth, ResourcePermission::Write).await?;

    let task = Task::create(&state.db, auth.business_id, req.into_model()?).await?;

    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Task>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let task = Task::find_by_id(&state.db, id, auth.business_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    Ok(Json(task))
}

/// # Endpoint
///
/// ```text
/// PATCH /v1/tasks/:id
/// Authorization: Bearer <jwt_token>
///
/// { "status": "done", "assignee_id": null }
/// ```
pub async fn update_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(mut req): Json<UpdateTask>,
) -> ApiResult<Json<Task>> {
    require_permission(&state.db, &auth, ResourcePermission::Write).await?;

    if let Some(title) = req.title.as_deref() {
        req.title = Some(non_blank("title", title)?);
    }

    let task = Task::update(&state.db, id, auth.business_id, req)
        .await?
        .ok_or_else(|| ApiError::NotFound("Task not found".to_string()))?;

    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeleteResponse>> {
    require_permission(&state.db, &auth, ResourcePermission::Write).await?;

    if !Task::delete(&state.db, id, auth.business_id).await? {
        return Err(ApiError::NotFound("Task not found".to_string()));
    }

    Ok(Json(DeleteResponse { deleted: true }))
}
