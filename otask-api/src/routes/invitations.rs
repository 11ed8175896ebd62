/// Invitation endpoints
///
/// The full invitation lifecycle over HTTP:
///
/// - `POST /v1/projects/:project_id/invitations` - Issue an invitation
/// - `GET /v1/projects/:project_id/invitations` - List a project's invitations
/// - `GET /v1/invitations/verify?token=...` - Verify a token (public)
/// - `POST /v1/invitations/accept` - Accept an invitation

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use otask_shared::{
    auth::middleware::{self as auth_middleware, AuthContext},
    models::{
        invitation::Invitation,
        membership::{Membership, MembershipRole},
        project::Project,
        user::User,
    },
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Create invitation request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvitationRequest {
    /// Email address to invite
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Role the invitee will receive on acceptance
    #[serde(default = "default_role")]
    pub role: MembershipRole,
}

fn default_role() -> MembershipRole {
    MembershipRole::Member
}

/// Invitation response body
#[derive(Debug, Serialize)]
pub struct InvitationResponse {
    /// Invitation ID
    pub id: String,

    /// Target project ID
    pub project_id: String,

    /// Invited email
    pub email: String,

    /// Role granted on acceptance
    pub role: MembershipRole,

    /// Expiry timestamp
    pub expired_at: DateTime<Utc>,

    /// When the invitation was accepted, if it has been
    pub accepted_at: Option<DateTime<Utc>>,
}

impl From<Invitation> for InvitationResponse {
    fn from(i: Invitation) -> Self {
        Self {
            id: i.id.to_string(),
            project_id: i.project_id.to_string(),
            email: i.email,
            role: i.role,
            expired_at: i.expired_at,
            accepted_at: i.accepted_at,
        }
    }
}

/// Verify query parameters
#[derive(Debug, Deserialize)]
pub struct VerifyParams {
    /// The signed invitation token
    pub token: String,
}

/// Outcome of a verification check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerifyStatus {
    /// Token is valid and the caller can accept
    Ready,

    /// Token is valid but the caller already belongs to the project
    AlreadyMember,

    /// Token is valid but the caller is not authenticated
    NeedAuth,

    /// Token is invalid, expired, or has the wrong purpose
    Invalid,
}

/// Verify response body
#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    /// Verification outcome
    pub status: VerifyStatus,

    /// Invited email (absent for invalid tokens)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Target project ID (absent for invalid tokens)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Target project name, when the project still exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
}

/// Accept invitation request
#[derive(Debug, Deserialize)]
pub struct AcceptRequest {
    /// The signed invitation token
    pub token: String,
}

/// Membership response body
#[derive(Debug, Serialize)]
pub struct MembershipResponse {
    /// Project ID
    pub project_id: String,

    /// Member's user ID
    pub member_id: String,

    /// Granted role
    pub role: MembershipRole,
}

impl From<Membership> for MembershipResponse {
    fn from(m: Membership) -> Self {
        Self {
            project_id: m.project_id.to_string(),
            member_id: m.member_id.to_string(),
            role: m.role,
        }
    }
}

/// Requires that the caller belongs to the project, returning their membership
async fn require_membership(
    state: &AppState,
    project_id: Uuid,
    user_id: Uuid,
) -> ApiResult<Membership> {
    Membership::find(&state.db, project_id, user_id)
        .await?
        .ok_or_else(|| ApiError::Forbidden("Not a member of this project".to_string()))
}

/// Issue an invitation
///
/// Administrators and members may invite; viewers may not.
///
/// # Endpoint
///
/// ```text
/// POST /v1/projects/:project_id/invitations
/// Authorization: Bearer <access_token>
/// Content-Type: application/json
///
/// { "email": "new@example.com", "role": "member" }
/// ```
///
/// # Errors
///
/// - `403 Forbidden`: Caller is not a member, or lacks invite permission
/// - `404 Not Found`: Project does not exist
/// - `409 Conflict`: A pending invitation already exists for this email
pub async fn create_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
    Json(req): Json<CreateInvitationRequest>,
) -> ApiResult<Json<InvitationResponse>> {
    req.validate()?;

    let membership = require_membership(&state, project_id, auth.user_id).await?;
    if !membership.role.can_invite() {
        return Err(ApiError::Forbidden(
            "Viewers cannot invite members".to_string(),
        ));
    }

    let invitation = state
        .invitations
        .invite(project_id, &req.email, req.role, auth.user_id)
        .await?;

    Ok(Json(invitation.into()))
}

/// List a project's invitations, newest first
///
/// # Endpoint
///
/// ```text
/// GET /v1/projects/:project_id/invitations
/// Authorization: Bearer <access_token>
/// ```
pub async fn list_invitations(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(project_id): Path<Uuid>,
) -> ApiResult<Json<Vec<InvitationResponse>>> {
    require_membership(&state, project_id, auth.user_id).await?;

    let invitations = Invitation::list_by_project(&state.db, project_id).await?;

    Ok(Json(invitations.into_iter().map(Into::into).collect()))
}

/// Verify an invitation token
///
/// Public endpoint with optional authentication: the recipient often has no
/// session yet. Checks the token's signature, age, and purpose without
/// consuming anything; accept re-validates under a row lock.
///
/// - `400 {status: INVALID}` when the token fails the codec checks
/// - `401 {status: NEED_AUTH}` when the token is valid but no session exists
/// - `200 {status: READY | ALREADY_MEMBER}` otherwise
///
/// # Endpoint
///
/// ```text
/// GET /v1/invitations/verify?token=eyJ...
/// ```
pub async fn verify_invitation(
    State(state): State<AppState>,
    headers: axum::http::HeaderMap,
    Query(params): Query<VerifyParams>,
) -> ApiResult<(StatusCode, Json<VerifyResponse>)> {
    let decoded = match state.invitations.verify_token(&params.token) {
        Ok(decoded) => decoded,
        Err(_) => {
            return Ok((
                StatusCode::BAD_REQUEST,
                Json(VerifyResponse {
                    status: VerifyStatus::Invalid,
                    email: None,
                    project_id: None,
                    project_name: None,
                }),
            ));
        }
    };

    // Project name is display sugar; a missing project does not invalidate
    // the token here, accept will reject it via the row lookup.
    let project_name = Project::find_by_id(&state.db, decoded.project_id)
        .await?
        .map(|p| p.name);

    // Authentication is optional here: a valid token with no session tells
    // the client to log in before accepting.
    let status = match auth_middleware::authenticate(&headers, state.jwt_secret()) {
        Ok(auth) => {
            if Membership::exists(&state.db, decoded.project_id, auth.user_id).await? {
                VerifyStatus::AlreadyMember
            } else {
                VerifyStatus::Ready
            }
        }
        Err(_) => VerifyStatus::NeedAuth,
    };

    let code = match status {
        VerifyStatus::NeedAuth => StatusCode::UNAUTHORIZED,
        _ => StatusCode::OK,
    };

    Ok((
        code,
        Json(VerifyResponse {
            status,
            email: Some(decoded.email),
            project_id: Some(decoded.project_id.to_string()),
            project_name,
        }),
    ))
}

/// Accept an invitation
///
/// The caller must be authenticated as the invited email's account.
///
/// # Endpoint
///
/// ```text
/// POST /v1/invitations/accept
/// Authorization: Bearer <access_token>
/// Content-Type: application/json
///
/// { "token": "eyJ..." }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: Token is invalid, expired, or has the wrong purpose
/// - `403 Forbidden`: Invitation was addressed to a different email
/// - `404 Not Found`: No pending invitation matches the token
/// - `409 Conflict`: Already a member of the project
pub async fn accept_invitation(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<AcceptRequest>,
) -> ApiResult<(StatusCode, Json<MembershipResponse>)> {
    let user = User::find_by_id(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Unknown user".to_string()))?;

    let membership = state.invitations.accept(&req.token, &user).await?;

    Ok((StatusCode::CREATED, Json(membership.into())))
}
