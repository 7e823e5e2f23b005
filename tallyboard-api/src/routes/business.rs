/// Business settings endpoints
///
/// - `GET /v1/business` - Current business with member and project counts
/// - `PATCH /v1/business` - Update settings (admin; plan and status need owner)
/// - `GET /v1/businesses` - Every business the caller belongs to

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::non_blank,
};
use axum::{extract::State, Json};
use serde::Serialize;
use tallyboard_shared::{
    auth::{
        authorization::{require_permission, ResourcePermission},
        middleware::AuthContext,
    },
    models::{
        business::{Business, BusinessSummary, UpdateBusiness},
        business_member::{BusinessMember, MemberRole},
        project::Project,
    },
};

#[derive(Debug, Serialize)]
pub struct BusinessResponse {
    #[serde(flatten)]
    pub business: Business,
    pub role: MemberRole,
    pub member_count: i64,
    pub project_count: i64,
}

#[derive(Debug, Serialize)]
pub struct BusinessListResponse {
    pub businesses: Vec<BusinessSummary>,
}

async fn load(state: &AppState, auth: &AuthContext, role: MemberRole) -> ApiResult<BusinessResponse> {
    let business = Business::find_by_id(&state.db, auth.business_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Business not found".to_string()))?;

    Ok(BusinessResponse {
        business,
        role,
        member_count: BusinessMember::count_by_business(&state.db, auth.business_id).await?,
        project_count: Project::count_by_business(&state.db, auth.business_id).await?,
    })
}

/// # Endpoint
///
/// ```text
/// GET /v1/business
/// Authorization: Bearer <jwt_token>
/// ```
///
/// # Response
///
/// ```json
/// {
///   "id": "uuid",
///   "name": "Lovelace Consulting",
///   "slug": "lovelace-consulting",
///   "plan": "free",
///   "status": "active",
///   "role": "owner",
///   "member_count": 3,
///   "project_count": 12,
///   ...
/// }
/// ```
pub async fn get_business(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<BusinessResponse>> {
    let role = require_permission(&state.db, &auth, ResourcePermission::Read).await?;
    Ok(Json(load(&state, &auth, role).await?))
}

/// # Endpoint
///
/// ```text
/// PATCH /v1/business
/// Authorization: Bearer <jwt_token>
///
/// { "name": "Lovelace & Co", "industry": null }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Caller is below admin, or changes plan/status without being owner
/// - `422 Unprocessable Entity`: Blank name
pub async fn update_business(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(mut req): Json<UpdateBusiness>,
) -> ApiResult<Json<BusinessResponse>> {
    let permission = if req.plan.is_some() || req.status.is_some() {
        ResourcePermission::Own
    } else {
        ResourcePermission::Manage
    };
    let role = require_permission(&state.db, &auth, permission).await?;

    if let Some(name) = req.name.as_deref() {
        req.name = Some(non_blank("name", name)?);
    }

    Business::update(&state.db, auth.business_id, req)
        .await?
        .ok_or_else(|| ApiError::NotFound("Business not found".to_string()))?;

    tracing::info!(business_id = %auth.business_id, user_id = %auth.user_id, "Business updated");

    Ok(Json(load(&state, &auth, role).await?))
}

/// # Endpoint
///
/// ```text
/// GET /v1/businesses
/// Authorization: Bearer <jwt_token>
/// ```
pub async fn list_businesses(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<BusinessListResponse>> {
    let businesses = Business::list_for_user(&state.db, auth.user_id).await?;
    Ok(Json(BusinessListResponse { businesses }))
}
