/// Account settings endpoints
///
/// - `PATCH /v1/settings/profile` - Change name and/or email
/// - `POST /v1/settings/password` - Change password, given the current one

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::non_blank,
};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tallyboard_shared::{
    auth::{middleware::AuthContext, password},
    models::user::{UpdateUser, User},
};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct ChangePasswordResponse {
    pub changed: bool,
}

/// # Endpoint
///
/// ```text
/// PATCH /v1/settings/profile
/// Authorization: Bearer <jwt_token>
///
/// { "name": "Ada King" }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Email already used by another account
/// - `422 Unprocessable Entity`: Validation failed
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<UpdateProfileRequest>,
) -> ApiResult<Json<User>> {
    req.validate()?;

    let update = UpdateUser {
        name: req.name.as_deref().map(|name| non_blank("name", name)).transpose()?,
        email: req.email,
    };

    let user = User::update(&state.db, auth.user_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(user))
}

/// # Endpoint
///
/// ```text
/// POST /v1/settings/password
/// Authorization: Bearer <jwt_token>
///
/// { "current_password": "analytical42", "new_password": "difference-engine-7" }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Current password is wrong
/// - `422 Unprocessable Entity`: New password too weak
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<ChangePasswordRequest>,
) -> ApiResult<Json<ChangePasswordResponse>> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let current_ok = match user.password_hash.as_deref() {
        Some(hash) => password::verify_password(&req.current_password, hash)?,
        None => false,
    };
    if !current_ok {
        return Err(ApiError::Unauthorized("Current password is incorrect".to_string()));
    }

    password::validate_password_strength(&req.new_password)?;
    let password_hash = password::hash_password(&req.new_password)?;

    let changed = User::update_password(&state.db, user.id, &password_hash).await?;
    tracing::info!(user_id = %user.id, "Password changed");

    Ok(Json(ChangePasswordResponse { changed }))
}
