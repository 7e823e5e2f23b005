/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /v1/auth/register` - Create a user, their business, and return tokens
/// - `POST /v1/auth/login` - Login (password, plus TOTP code when enabled)
/// - `POST /v1/auth/refresh` - Refresh access token
/// - `POST /v1/auth/accept-invitation` - Activate an invited account
/// - `GET /v1/auth/me` - Current user and business
/// - `POST /v1/auth/switch-business` - Tokens for another business

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tallyboard_shared::{
    auth::{
        authorization::require_membership,
        invitation::{hash_invitation_token, is_well_formed},
        jwt::{self, TokenPair},
        middleware::AuthContext,
        password, totp,
    },
    models::{
        business::{Business, BusinessPlan, CreateBusiness},
        business_member::{BusinessMember, MemberRole},
        user::{CreateUser, User},
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Checked again for strength after shape validation
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 255, message = "Business name must be 1-255 characters"))]
    pub business_name: String,

    #[validate(length(max = 100, message = "Industry must be at most 100 characters"))]
    pub industry: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,

    /// Six-digit code, required once two-factor is enabled
    pub totp_code: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AcceptInvitationRequest {
    pub token: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    /// Replaces the name the inviter entered
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SwitchBusinessRequest {
    pub business_id: Uuid,
}

/// Returned by every endpoint that signs the caller in
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub business_id: Uuid,
    #[serde(flatten)]
    pub tokens: TokenPair,
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub business: Business,
    pub role: MemberRole,
}

/// The business a fresh session starts in: the user's oldest membership
async fn default_business(state: &AppState, user_id: Uuid) -> ApiResult<Uuid> {
    BusinessMember::list_by_user(&state.db, user_id)
        .await?
        .first()
        .map(|m| m.business_id)
        .ok_or_else(|| ApiError::Forbidden("User does not belong to any business".to_string()))
}

fn sign_in(state: &AppState, user: User, business_id: Uuid) -> ApiResult<Json<AuthResponse>> {
    let tokens = jwt::issue_token_pair(user.id, business_id, state.jwt_secret())?;

    Ok(Json(AuthResponse {
        user,
        business_id,
        tokens,
    }))
}

/// Register a new user with their own business
///
/// The user, the business, and the owner membership are written in one
/// transaction.
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/register
/// Content-Type: application/json
///
/// {
///   "name": "Ada Lovelace",
///   "email": "ada@example.com",
///   "password": "analytical42",
///   "business_name": "Lovelace Consulting"
/// }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "user": { "id": "uuid", "name": "Ada Lovelace", "email": "ada@example.com", ... },
///   "business_id": "uuid",
///   "access_token": "eyJ...",
///   "refresh_token": "eyJ...",
///   "token_type": "Bearer",
///   "expires_in": 86400
/// }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: Email already exists
/// - `422 Unprocessable Entity`: Validation failed or password too weak
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;
    password::validate_password_strength(&req.password)?;

    let password_hash = password::hash_password(&req.password)?;

    let mut tx = state.db.begin().await?;

    let user = User::create(
        &mut *tx,
        CreateUser {
            name: req.name,
            email: req.email,
            password_hash,
        },
    )
    .await?;

    let business = Business::create_in(
        &mut tx,
        CreateBusiness {
            name: req.business_name,
            owner_id: user.id,
            plan: BusinessPlan::Free,
            industry: req.industry,
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %user.id, business_id = %business.id, "User registered");

    sign_in(&state, user, business.id)
}

/// Login with email and password
///
/// When two-factor is enabled the request must also carry `totp_code`.
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/login
/// Content-Type: application/json
///
/// {
///   "email": "ada@example.com",
///   "password": "analytical42",
///   "totp_code": "123456"
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid credentials, or missing/wrong two-factor code
/// - `403 Forbidden`: Account suspended or without any business
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let user = User::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(invalid)?;

    // Invited users have no password yet
    let hash = user.password_hash.as_deref().ok_or_else(invalid)?;
    if !password::verify_password(&req.password, hash)? {
        return Err(invalid());
    }

    if !user.is_active() {
        return Err(ApiError::Forbidden("Account is not active".to_string()));
    }

    if user.two_factor_enabled {
        let code = req
            .totp_code
            .as_deref()
            .ok_or_else(|| ApiError::Unauthorized("Two-factor code required".to_string()))?;
        let secret = user.two_factor_secret.as_deref().ok_or_else(|| {
            ApiError::InternalError("Two-factor enabled without a secret".to_string())
        })?;

        if !totp::verify_code(secret, code, &state.config.security.totp_issuer, &user.email)? {
            return Err(ApiError::Unauthorized("Invalid two-factor code".to_string()));
        }
    }

    let business_id = default_business(&state, user.id).await?;

    User::update_last_login(&state.db, user.id).await?;
    tracing::info!(user_id = %user.id, "User logged in");

    sign_in(&state, user, business_id)
}

/// Exchange a refresh token for a new access token
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/refresh
///
/// { "refresh_token": "eyJ..." }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Invalid, expired, or non-refresh token
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshRequest>,
) -> ApiResult<Json<RefreshResponse>> {
    let access_token = jwt::refresh_access_token(&req.refresh_token, state.jwt_secret())?;

    Ok(Json(RefreshResponse { access_token }))
}

/// Activate an invited account
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/accept-invitation
///
/// { "token": "inv_...", "password": "analytical42", "name": "Ada" }
/// ```
///
/// # Errors
///
/// - `404 Not Found`: Unknown, used, or expired token
/// - `422 Unprocessable Entity`: Password too weak
pub async fn accept_invitation(
    State(state): State<AppState>,
    Json(req): Json<AcceptInvitationRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    let not_found = || ApiError::NotFound("Invitation not found or expired".to_string());

    if !is_well_formed(&req.token) {
        return Err(not_found());
    }

    let invited = User::find_by_invitation_token(&state.db, &hash_invitation_token(&req.token))
        .await?
        .ok_or_else(not_found)?;

    password::validate_password_strength(&req.password)?;
    let password_hash = password::hash_password(&req.password)?;

    let user = User::accept_invitation(&state.db, invited.id, req.name, &password_hash)
        .await?
        .ok_or_else(not_found)?;

    let business_id = default_business(&state, user.id).await?;

    sign_in(&state, user, business_id)
}

/// Current user, business and role
///
/// # Endpoint
///
/// ```text
/// GET /v1/auth/me
/// Authorization: Bearer <jwt_token>
/// ```
pub async fn me(State(state): State<AppState>, auth: AuthContext) -> ApiResult<Json<MeResponse>> {
    let role = require_membership(&state.db, auth.business_id, auth.user_id).await?;

    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let business = Business::find_by_id(&state.db, auth.business_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Business not found".to_string()))?;

    Ok(Json(MeResponse {
        user,
        business,
        role,
    }))
}

/// Issue tokens scoped to another business the caller belongs to
///
/// # Endpoint
///
/// ```text
/// POST /v1/auth/switch-business
/// Authorization: Bearer <jwt_token>
///
/// { "business_id": "uuid" }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not a member of that business
pub async fn switch_business(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<SwitchBusinessRequest>,
) -> ApiResult<Json<AuthResponse>> {
    require_membership(&state.db, req.business_id, auth.user_id).await?;

    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    tracing::debug!(user_id = %user.id, business_id = %req.business_id, "Switched business");

    sign_in(&state, user, req.business_id)
}
