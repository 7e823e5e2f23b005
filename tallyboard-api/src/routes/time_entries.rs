/// Time tracking endpoints
///
/// # Endpoints
///
/// - `GET /v1/time-entries` - List (`?user_id=&task_id=&project_id=&from=&to=&billable=`)
/// - `POST /v1/time-entries` - Manual entry for the caller
/// - `GET/PATCH/DELETE /v1/time-entries/:id` - Single entry
/// - `POST /v1/time-entries/start` - Start the caller's timer
/// - `POST /v1/time-entries/stop` - Stop it; the server computes the duration
/// - `GET /v1/time-entries/running` - The caller's running timer, if any
///
/// Timer start and stop times come from the database clock. Entries can be
/// edited by the user who logged them or by an admin.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{DeleteResponse, Page, Pagination},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tallyboard_shared::{
    auth::{
        authorization::{require_owner_or, require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::time_entry::{
        CreateTimeEntry, RunningTimer, StartTimer, TimeEntry, TimeEntryFilter, TimeEntryListItem,
        UpdateTimeEntry,
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTimeEntryRequest {
    pub task_id: Uuid,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,

    #[validate(range(min = 0, message = "Duration must not be negative"))]
    pub duration_seconds: Option<i32>,

    pub billable: Option<bool>,
}

impl From<CreateTimeEntryRequest> for CreateTimeEntry {
    fn from(req: CreateTimeEntryRequest) -> Self {
        CreateTimeEntry {
            task_id: req.task_id,
            description: req.description,
            started_at: req.started_at,
            ended_at: req.ended_at,
            duration_seconds: req.duration_seconds,
            billable: req.billable,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct StartTimerRequest {
    pub task_id: Uuid,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    pub description: Option<String>,

    pub billable: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct RunningTimerResponse {
    /// `null` when no timer is running; carries `business_id` since the
    /// timer may belong to another of the caller's businesses
    pub entry: Option<RunningTimer>,
}

async fn find_entry(state: &AppState, auth: &AuthContext, id: Uuid) -> ApiResult<TimeEntry> {
    TimeEntry::find_by_id(&state.db, id, auth.business_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Time entry not found".to_string()))
}

pub async fn list_entries(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(filter): Query<TimeEntryFilter>,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Page<TimeEntryListItem>>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let entries =
        TimeEntry::list_by_business(&state.db, auth.business_id, &filter, page.limit(), page.offset())
            .await?;

    Ok(Json(Page::new(entries, &page)))
}

/// Log time after the fact
///
/// # Endpoint
///
/// ```text
/// POST /v1/time-entries
/// Authorization: Bearer <jwt_token>
///
/// {
///   "task_id": "uuid",
///   "started_at": "2026-01-12T09:00:00Z",
///   "duration_seconds": 5400,
///   "billable": true
/// }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Neither `ended_at` nor `duration_seconds`,
///   an end before the start, or a task from another business
pub async fn create_entry(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateTimeEntryRequest>,
) -> ApiResult<(StatusCode, Json<TimeEntry>)> {
    req.validate()?;
    require_permission(&state.db, &auth, ResourcePermission::Write).await?;

    let entry = TimeEntry::create(&state.db, auth.business_id, auth.user_id, req.into()).await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn get_entry(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TimeEntry>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;
    Ok(Json(find_entry(&state, &auth, id).await?))
}

/// # Endpoint
///
/// ```text
/// PATCH /v1/time-entries/:id
/// Authorization: Bearer <jwt_token>
///
/// { "ended_at": "2026-01-12T11:00:00Z", "billable": false }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Someone else's entry and caller is not an admin
pub async fn update_entry(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateTimeEntry>,
) -> ApiResult<Json<TimeEntry>> {
    let entry = find_entry(&state, &auth, id).await?;
    require_owner_or(&state.db, &auth, entry.user_id, ResourcePermission::Manage).await?;

    if req.duration_seconds.is_some_and(|d| d < 0) {
        return Err(ApiError::field("duration_seconds", "Duration must not be negative"));
    }

    let entry = TimeEntry::update(&state.db, id, auth.business_id, req)
        .await?
        .ok_or_else(|| ApiError::NotFound("Time entry not found".to_string()))?;

    Ok(Json(entry))
}

pub async fn delete_entry(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeleteResponse>> {
    let entry = find_entry(&state, &auth, id).await?;
    require_owner_or(&state.db, &auth, entry.user_id, ResourcePermission::Manage).await?;

    let deleted = TimeEntry::delete(&state.db, id, auth.business_id).await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// Start a timer on a task
///
/// # Endpoint
///
/// ```text
/// POST /v1/time-entries/start
/// Authorization: Bearer <jwt_token>
///
/// { "task_id": "uuid", "description": "Wireframes" }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: A timer is already running for this user, in any business
pub async fn start_timer(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<StartTimerRequest>,
) -> ApiResult<(StatusCode, Json<TimeEntry>)> {
    req.validate()?;
    require_permission(&state.db, &auth, ResourcePermission::Write).await?;

    let entry = TimeEntry::start_timer(
        &state.db,
        auth.business_id,
        auth.user_id,
        StartTimer {
            task_id: req.task_id,
            description: req.description,
            billable: req.billable,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(entry)))
}

/// Stop the caller's running timer
///
/// A user runs one timer across all their businesses, so this stops it even
/// when it was started in another business.
///
/// # Errors
///
/// - `404 Not Found`: No timer is running
pub async fn stop_timer(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<RunningTimer>> {
    require_permission(&state.db, &auth, ResourcePermission::Write).await?;

    let timer = TimeEntry::stop_timer(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No timer is running".to_string()))?;

    Ok(Json(timer))
}

pub async fn running_timer(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<RunningTimerResponse>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let entry = TimeEntry::find_running(&state.db, auth.user_id).await?;
    Ok(Json(RunningTimerResponse { entry }))
}
