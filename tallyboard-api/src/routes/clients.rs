/// Client endpoints
///
/// - `GET /v1/clients` - Alphabetical list
/// - `POST /v1/clients` - Create (member or above)
/// - `GET/PATCH /v1/clients/:id` - Fetch or update
/// - `DELETE /v1/clients/:id` - Delete (admin); projects keep running without a client

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
use serde::Deserialize;
use tallyboard_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::client::{Client, CreateClient, UpdateClient},
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateClientRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(max = 255, message = "Company must be at most 255 characters"))]
    pub company: Option<String>,

    #[validate(length(max = 50, message = "Phone must be at most 50 characters"))]
    pub phone: Option<String>,

    pub notes: Option<String>,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Client not found".to_string())
}

pub async fn list_clients(
    State(state): State<AppState>,
    auth: AuthContext,
    Query(page): Query<Pagination>,
) -> ApiResult<Json<Page<Client>>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let clients =
        Client::list_by_business(&state.db, auth.business_id, page.limit(), page.offset()).await?;

    Ok(Json(Page::new(clients, &page)))
}

/// # Endpoint
///
/// ```text
/// POST /v1/clients
/// Authorization: Bearer <jwt_token>
///
/// { "name": "Initech", "email": "billing@initech.example", "phone": "+1 555 0100" }
/// ```
pub async fn create_client(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<CreateClientRequest>,
) -> ApiResult<(StatusCode, Json<Client>)> {
    req.validate()?;
    require_permission(&state.db, &auth, ResourcePermission::Write).await?;

    let client = Client::create(
        &state.db,
        auth.business_id,
        CreateClient {
            name: non_blank("name", &req.name)?,
            email: req.email,
            company: req.company,
            phone: req.phone,
            notes: req.notes,
        },
    )
    .await?;

    Ok((StatusCode::CREATED, Json(client)))
}

pub async fn get_client(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Client>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let client = Client::find_by_id(&state.db, id, auth.business_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(client))
}

pub async fn update_client(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
    Json(mut req): Json<UpdateClient>,
) -> ApiResult<Json<Client>> {
    require_permission(&state.db, &auth, ResourcePermission::Write).await?;

    if let Some(name) = req.name.as_deref() {
        req.name = Some(non_blank("name", name)?);
    }

    let client = Client::update(&state.db, id, auth.business_id, req)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(client))
}

pub async fn delete_client(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeleteResponse>> {
    require_permission(&state.db, &auth, ResourcePermission::Manage).await?;

    if !Client::delete(&state.db, id, auth.business_id).await? {
        return Err(not_found());
    }

    Ok(Json(DeleteResponse { deleted: true }))
}
