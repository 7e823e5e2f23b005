/// TOTP two-factor endpoints
///
/// Enrollment is two-step: `setup` stores a fresh secret and returns the
/// `otpauth://` URL, then `enable` switches two-factor on once the user
/// proves their authenticator produces valid codes.
///
/// - `POST /v1/user/two-factor/setup`
/// - `POST /v1/user/two-factor/enable`
/// - `POST /v1/user/two-factor/disable`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tallyboard_shared::{
    auth::{
        middleware::AuthContext,
        password,
        totp::{self, Enrollment},
    },
    models::user::User,
};

#[derive(Debug, Deserialize)]
pub struct EnableRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct DisableRequest {
    pub password: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct TwoFactorStatus {
    pub enabled: bool,
}

async fn current_user(state: &AppState, auth: &AuthContext) -> ApiResult<User> {
    User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))
}

fn check_code(state: &AppState, user: &User, code: &str) -> ApiResult<()> {
    let secret = user
        .two_factor_secret
        .as_deref()
        .ok_or_else(|| ApiError::Conflict("Two-factor setup has not been started".to_string()))?;

    if !totp::verify_code(secret, code, &state.config.security.totp_issuer, &user.email)? {
        return Err(ApiError::field("code", "Invalid two-factor code"));
    }
    Ok(())
}

/// # Response
///
/// ```json
/// {
///   "secret": "JBSWY3DPEHPK3PXP...",
///   "otpauth_url": "otpauth://totp/Tallyboard:ada%40example.com?secret=...&issuer=Tallyboard"
/// }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Two-factor is already enabled
pub async fn setup(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<Enrollment>> {
    let user = current_user(&state, &auth).await?;
    if user.two_factor_enabled {
        return Err(ApiError::Conflict("Two-factor is already enabled".to_string()));
    }

    let enrollment = totp::generate_enrollment(&state.config.security.totp_issuer, &user.email)?;
    User::set_two_factor_secret(&state.db, user.id, &enrollment.secret).await?;

    Ok(Json(enrollment))
}

/// # Errors
///
/// - `409 Conflict`: `setup` was not called first
/// - `422 Unprocessable Entity`: Wrong code
pub async fn enable(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<EnableRequest>,
) -> ApiResult<Json<TwoFactorStatus>> {
    let user = current_user(&state, &auth).await?;
    check_code(&state, &user, &req.code)?;

    User::enable_two_factor(&state.db, user.id).await?;
    tracing::info!(user_id = %user.id, "Two-factor enabled");

    Ok(Json(TwoFactorStatus { enabled: true }))
}

/// Requires the account password and a current code
///
/// # Errors
///
/// - `401 Unauthorized`: Wrong password
/// - `409 Conflict`: Two-factor is not enabled
/// - `422 Unprocessable Entity`: Wrong code
pub async fn disable(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<DisableRequest>,
) -> ApiResult<Json<TwoFactorStatus>> {
    let user = current_user(&state, &auth).await?;
    if !user.two_factor_enabled {
        return Err(ApiError::Conflict("Two-factor is not enabled".to_string()));
    }

    let password_ok = match user.password_hash.as_deref() {
        Some(hash) => password::verify_password(&req.password, hash)?,
        None => false,
    };
    if !password_ok {
        return Err(ApiError::Unauthorized("Password is incorrect".to_string()));
    }

    check_code(&state, &user, &req.code)?;

    User::disable_two_factor(&state.db, user.id).await?;
    tracing::info!(user_id = %user.id, "Two-factor disabled");

    Ok(Json(TwoFactorStatus { enabled: false }))
}
