/// Team management endpoints
///
/// # Endpoints
///
/// - `GET /v1/team` - Members of the current business
/// - `POST /v1/team/invite` - Invite by email (admin)
/// - `PATCH /v1/team/:user_id` - Change a member's role (admin)
/// - `DELETE /v1/team/:user_id` - Remove a member (admin, or yourself to leave)
///
/// Only owners can grant, change, or remove the owner role, and a business
/// always keeps at least one owner.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::DeleteResponse,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tallyboard_shared::{
    auth::{
        authorization::{require_membership, require_permission, ResourcePermission},
        invitation::generate_invitation_token,
        middleware::AuthContext,
    },
    models::{
        business_member::{BusinessMember, CreateBusinessMember, MemberRole, TeamMember},
        user::{CreateInvitedUser, User, UserStatus},
    },
};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct InviteRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[serde(default = "default_invite_role")]
    pub role: MemberRole,
}

fn default_invite_role() -> MemberRole {
    MemberRole::Member
}

#[derive(Debug, Serialize)]
pub struct InviteResponse {
    pub user_id: Uuid,
    pub email: String,
    pub role: MemberRole,
    pub status: UserStatus,

    /// Plaintext token for the invitation link, only when a new link was
    /// issued. Only its hash is stored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitation_token: Option<String>,

    /// Set when the user already held a pending link from another invite;
    /// that link stays valid and now also grants this membership
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub invitation_reused: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub invitation_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRoleRequest {
    pub role: MemberRole,
}

#[derive(Debug, Serialize)]
pub struct TeamResponse {
    pub members: Vec<TeamMember>,
}

/// What inviting an existing user does to their invitation link
#[derive(Debug, PartialEq, Eq)]
enum InviteLink {
    /// Active account, no link needed
    None,
    /// Pending link stays; carries its expiry
    Reuse(DateTime<Utc>),
    /// No usable link, issue a fresh one
    Issue,
}

fn invite_link_action(user: &User, now: DateTime<Utc>) -> InviteLink {
    if !user.is_invited() {
        return InviteLink::None;
    }
    match user.invitation_expires_at {
        Some(expires) if user.invitation_pending(now) => InviteLink::Reuse(expires),
        _ => InviteLink::Issue,
    }
}

/// Owner-only moves: touching an owner, or making someone owner
fn check_owner_change(
    actor: MemberRole,
    current: MemberRole,
    next: Option<MemberRole>,
) -> ApiResult<()> {
    let touches_owner = current == MemberRole::Owner || next == Some(MemberRole::Owner);
    if touches_owner && actor != MemberRole::Owner {
        return Err(ApiError::Forbidden(
            "Only owners can grant or change the owner role".to_string(),
        ));
    }
    Ok(())
}

async fn member_role(state: &AppState, business_id: Uuid, user_id: Uuid) -> ApiResult<MemberRole> {
    BusinessMember::get_role(&state.db, business_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Team member not found".to_string()))
}

pub async fn list_team(
    State(state): State<AppState>,
    auth: AuthContext,
) -> ApiResult<Json<TeamResponse>> {
    require_permission(&state.db, &auth, ResourcePermission::Read).await?;

    let members = BusinessMember::list_by_business(&state.db, auth.business_id).await?;
    Ok(Json(TeamResponse { members }))
}

/// Invite someone to the current business
///
/// An existing account is added straight away. A new email gets an invited
/// user with a one-time token valid for `INVITATION_TTL_HOURS`.
///
/// An invited user holds one link at a time, and accepting it activates
/// every membership they were given. Inviting a user whose link is still
/// pending (say, from a second business) keeps that link: the response has
/// no `invitation_token`, sets `invitation_reused` and reports the existing
/// expiry. Only an expired link is replaced with a fresh token.
///
/// # Endpoint
///
/// ```text
/// POST /v1/team/invite
/// Authorization: Bearer <jwt_token>
///
/// { "email": "grace@example.com", "name": "Grace", "role": "member" }
/// ```
///
/// # Response
///
/// ```json
/// {
///   "user_id": "uuid",
///   "email": "grace@example.com",
///   "role": "member",
///   "status": "invited",
///   "invitation_token": "inv_...",
///   "invitation_expires_at": "2026-01-15T09:00:00Z"
/// }
/// ```
///
/// Re-inviting a pending user from another business:
///
/// ```json
/// {
///   "user_id": "uuid",
///   "email": "grace@example.com",
///   "role": "viewer",
///   "status": "invited",
///   "invitation_reused": true,
///   "invitation_expires_at": "2026-01-15T09:00:00Z"
/// }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Caller is below admin, or a non-owner invites an owner
/// - `409 Conflict`: Already a member
pub async fn invite(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(req): Json<InviteRequest>,
) -> ApiResult<(StatusCode, Json<InviteResponse>)> {
    req.validate()?;
    let actor = require_permission(&state.db, &auth, ResourcePermission::Manage).await?;
    check_owner_change(actor, MemberRole::Member, Some(req.role))?;

    let expires_at = Utc::now() + Duration::hours(state.config.team.invitation_ttl_hours);

    let mut tx = state.db.begin().await?;

    let (user, invitation) = match User::find_by_email(&mut *tx, &req.email).await? {
        Some(user) => {
            if BusinessMember::get_role(&mut *tx, auth.business_id, user.id).await?.is_some() {
                return Err(ApiError::Conflict(
                    "User is already a member of this business".to_string(),
                ));
            }

            let invitation = match invite_link_action(&user, Utc::now()) {
                InviteLink::None => None,
                InviteLink::Reuse(existing) => Some((None, existing)),
                InviteLink::Issue => {
                    let (token, hash) = generate_invitation_token();
                    User::set_invitation(&mut *tx, user.id, &hash, expires_at).await?;
                    Some((Some(token), expires_at))
                }
            };
            (user, invitation)
        }
        None => {
            let (token, hash) = generate_invitation_token();
            let user = User::create_invited(
                &mut *tx,
                CreateInvitedUser {
                    name: req.name,
                    email: req.email,
                    invitation_token_hash: hash,
                    invitation_expires_at: expires_at,
                },
            )
            .await?;
            (user, Some((Some(token), expires_at)))
        }
    };

    BusinessMember::create(
        &mut *tx,
        CreateBusinessMember {
            business_id: auth.business_id,
            user_id: user.id,
            role: req.role,
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        business_id = %auth.business_id,
        user_id = %user.id,
        role = req.role.as_str(),
        invited = invitation.is_some(),
        "Team member invited"
    );

    let invitation_reused = matches!(invitation, Some((None, _)));
    let (invitation_token, invitation_expires_at) = match invitation {
        Some((token, expires)) => (token, Some(expires)),
        None => (None, None),
    };

    Ok((
        StatusCode::CREATED,
        Json(InviteResponse {
            user_id: user.id,
            email: user.email,
            role: req.role,
            status: user.status,
            invitation_token,
            invitation_reused,
            invitation_expires_at,
        }),
    ))
}

/// # Errors
///
/// - `403 Forbidden`: Caller is below admin, or a non-owner touches an owner
/// - `404 Not Found`: Not a member of this business
/// - `409 Conflict`: Would demote the last owner
pub async fn update_member(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateRoleRequest>,
) -> ApiResult<Json<BusinessMember>> {
    let actor = require_permission(&state.db, &auth, ResourcePermission::Manage).await?;
    let current = member_role(&state, auth.business_id, user_id).await?;

    check_owner_change(actor, current, Some(req.role))?;

    let member = BusinessMember::update_role(&state.db, auth.business_id, user_id, req.role)
        .await?
        .ok_or_else(|| ApiError::NotFound("Team member not found".to_string()))?;

    tracing::info!(business_id = %auth.business_id, user_id = %user_id, role = req.role.as_str(), "Member role changed");

    Ok(Json(member))
}

/// Removes the member, their project memberships, and their task assignments
///
/// # Errors
///
/// - `403 Forbidden`: Removing someone else without admin, or a non-owner removing an owner
/// - `409 Conflict`: Would remove the last owner
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<DeleteResponse>> {
    let actor = if user_id == auth.user_id {
        require_membership(&state.db, auth.business_id, auth.user_id).await?
    } else {
        require_permission(&state.db, &auth, ResourcePermission::Manage).await?
    };

    let current = member_role(&state, auth.business_id, user_id).await?;
    if current == MemberRole::Owner {
        check_owner_change(actor, current, None)?;
    }

    let deleted = BusinessMember::delete(&state.db, auth.business_id, user_id).await?;

    tracing::info!(business_id = %auth.business_id, user_id = %user_id, "Member removed");

    Ok(Json(DeleteResponse { deleted }))
}
