/// Project endpoints
///
/// # Endpoints
///
/// - `GET /v1/projects` - List projects with progress (`?status=&client_id=&limit=&offset=`)
/// - `POST /v1/projects` - Create a project; the creator becomes its manager
/// - `GET /v1/projects/:id` - Project with progress and members
/// - `PATCH /v1/projects/:id` - Update
/// - `DELETE /v1/projects/:id` - Delete (project owner or admin)
/// - `GET/POST /v1/projects/:id/members` - List or add members
/// - `PATCH/DELETE /v1/projects/:id/members/:user_id` - Change role or remove

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
use serde::{Deserialize, Serialize};
use tallyboard_shared::{
    auth::{
        authorization::{require_owner_or, require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::{
        project::{
            CreateProject, Project, ProjectFilter, ProjectProgress, ProjectStatus,
            ProjectWithProgress, UpdateProject,
        },
        project_member::{ProjectMember, ProjectMemberDetail, ProjectRole},
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    #[validate(length(max = 10000, message = "Description must be at most 10000 characters"))]
    pub description: Option<String>,

    pub status: Option<ProjectStatus>,
    pub client_id: Option<Uuid>,
    pub due_date: Option<NaiveDate>,
}

impl CreateProjectRequest {
    fn into_model(self) -> ApiResult<CreateProject> {
        Ok(CreateProject {
            name: non_blank("name", &self.name)?,
            description: self.description,
            status: self.status,
            client_id: self.client_id,
            due_date: self.due_date,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    /// Defaults to `contributor`
    #[serde(default)]
    pub role: ProjectRole,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRequest {
    pub role: ProjectRole,
}

#[derive(Debug, Serialize)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub progress: ProjectProgress,
    pub members: Vec<ProjectMemberDetail>,
}

#[derive(Debug, Serialize)]
pub struct MemberListResponse {
    pub members: Vec<ProjectMemberDetail>,
}

async fn find_project(state: &AppState, auth: &AuthContext, id: Uuid) -> ApiResult<Project> {
    Project::find_by_id(&state.db, id, auth.business_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))
}

/// Project owners manage their own project; anyone else needs admin
async fn require_project_manager(state: &AppState, auth: &AuthContext, id: Uuid) -> ApiResult<Project> {
    let project = find_project(state, auth, id).await?;
    require_owner_or(&state.db, auth, project.owner_id, ResourcePermission::Manage).await?;
    Ok(project)
}

/// # Endpoint
///
/// ```text
/// GET /v1/projects?status=active&limit=20
/// Authorization: Bearer <jwt_token>
/// ```
///
/// # Response
///
/// ```json
/// {
///   "items": [
///     { "id": "uuid", "name": "Website", "status": "active",
///       "total_tasks": 8, "done_tasks": 2, "progress_percent": 25.0, ... }
///   ],
///   "limit": 20,
///   "offset": 0
/// }
/// ```
pub async fn list_projects(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(filter): Query<ProjectFilter>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Page<ProjectWithProgress>>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let projects =
        Project::list_by_business(&state.db, auth.business_id, &filter, page.limit(), page.offset())
            .await?;

    Ok(Json(Page::new(projects, &page)))
}

/// # Endpoint
///
/// ```text
/// POST /v1/projects
/// Authorization: Bearer <jwt_token>
///
/// { "name": "Website", "client_id": "uuid", "due_date": "2026-03-31" }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Viewer role
/// - `422 Unprocessable Entity`: Validation failed or client from another business
pub async fn create_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    req.validate()?;
    require_permission(&state.db, &auth, ResourcePermission::Write).await?;

    let project =
        Project::create_with_owner(&state.db, auth.business_id, auth.user_id, req.into_model()?)
            .await?;

    Ok((StatusCode::CREATED, Json(project)))
}

/// # Endpoint
///
/// ```text
/// GET /v1/projects/:id
/// Authorization: Bearer <jwt_token>
/// ```
///
/// # Errors
///
/// - `404 Not Found`: No such project in this business
pub async fn get_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ProjectDetail>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let project = find_project(&state, &auth, id).await?;
    let progress = Project::progress(&state.db, id, auth.business_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;
    let members = ProjectMember::list_by_project(&state.db, auth.business_id, id).await?;

    Ok(Json(ProjectDetail {
        project,
        progress,
        members,
    }))
}

/// # Endpoint
///
/// ```text
/// PATCH /v1/projects/:id
/// Authorization: Bearer <jwt_token>
///
/// { "status": "on_hold", "due_date": null }
/// ```
///
/// Fields left out are unchanged; `null` clears an optional field.
pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(mut req): Json<UpdateProject>,
) -> ApiResult<Json<Project>> {
    require_permission(&state.db, &auth, ResourcePermission::Write).await?;

    if let Some(name) = req.name.as_deref() {
        req.name = Some(non_blank("name", name)?);
    }

    let project = Project::update(&state.db, id, auth.business_id, req)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project not found".to_string()))?;

    Ok(Json(project))
}

/// Deletes the project with its tasks, time entries, and invoices
///
/// # Errors
///
/// - `403 Forbidden`: Caller neither owns the project nor is an admin
/// - `404 Not Found`: No such project in this business
pub async fn delete_project(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeleteResponse>> {
    require_project_manager(&state, &auth, id).await?;

    let deleted = Project::delete(&state.db, id, auth.business_id).await?;
    tracing::info!(project_id = %id, user_id = %auth.user_id, "Project deleted");

    Ok(Json(DeleteResponse { deleted }))
}

pub async fn list_members(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<MemberListResponse>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;
    find_project(&state, &auth, id).await?;

    let members = ProjectMember::list_by_project(&state.db, auth.business_id, id).await?;
    Ok(Json(MemberListResponse { members }))
}

/// # Endpoint
///
/// ```text
/// POST /v1/projects/:id/members
/// Authorization: Bearer <jwt_token>
///
/// { "user_id": "uuid", "role": "observer" }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Already a member
/// - `422 Unprocessable Entity`: User is not in this business
pub async fn add_member(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<AddMemberRequest>,
) -> ApiResult<(StatusCode, Json<ProjectMember>)> {
    require_project_manager(&state, &auth, id).await?;

    let member = ProjectMember::add(&state.db, auth.business_id, id, req.user_id, req.role).await?;

    Ok((StatusCode::CREATED, Json(member)))
}

pub async fn update_member(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateMemberRequest>,
) -> ApiResult<Json<ProjectMember>> {
    require_project_manager(&state, &auth, id).await?;

    let member = ProjectMember::update_role(&state.db, auth.business_id, id, user_id, req.role)
        .await?
        .ok_or_else(|| ApiError::NotFound("Project member not found".to_string()))?;

    Ok(Json(member))
}

pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthContext,
    Path((id, user_id)): Path<(Uuid, Uuid)>,
) -> ApiResult<Json<DeleteResponse>> {
    require_project_manager(&state, &auth, id).await?;

    let deleted = ProjectMember::remove(&state.db, auth.business_id, id, user_id).await?;
    if !deleted {
        return Err(ApiError::NotFound("Project member not found".to_string()));
    }

    Ok(Json(DeleteResponse { deleted }))
}
