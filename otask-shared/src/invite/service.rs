/// Invitation service
///
/// Orchestrates the invitation lifecycle over the token codec, the
/// invitation store, and the membership store:
///
/// - [`InvitationService::invite`]: dedup check, token mint, persist, notify
/// - [`InvitationService::verify_token`]: pure pre-auth token check
/// - [`InvitationService::accept`]: validate, then atomically lock the row,
///   mark it accepted, and enroll the member
///
/// State machine per invitation: `NONE -> PENDING -> ACCEPTED` (terminal),
/// with `PENDING -> EXPIRED` implicit: an expired row is no longer honored by
/// verify or accept but is left untouched.
///
/// # Concurrency
///
/// Accept is the only contention point. It takes a `FOR UPDATE` lock on the
/// invitation row and re-checks `accepted_at IS NULL AND expired_at > NOW()`
/// under that lock, in the same transaction as the membership insert. Two
/// accepts racing on one token therefore produce exactly one success; the
/// loser gets [`InviteError::InvitationNotFoundOrExpired`]. The composite
/// primary key on memberships backstops any external membership-creation
/// path racing with accept, surfaced as [`InviteError::AlreadyMember`].

use chrono::{Duration, Utc};
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{
    email_job::{CreateEmailJob, EmailJob},
    invitation::{CreateInvitation, Invitation},
    membership::{CreateMembership, Membership, MembershipRole},
    project::Project,
    user::User,
};

use super::token::{self, InviteToken, InviteTokenError};

/// How long a freshly issued invitation stays valid
pub const INVITE_TTL_DAYS: i64 = 7;

/// Error type for invitation operations
#[derive(Debug, thiserror::Error)]
pub enum InviteError {
    /// The target project does not exist
    #[error("Project not found")]
    ProjectNotFound,

    /// A pending, unexpired invitation already exists for (project, email)
    #[error("A pending invitation already exists for this email")]
    DuplicatePendingInvitation,

    /// The acting user's email does not match the invited address
    #[error("Invitation is not for this user")]
    EmailMismatch,

    /// The acting user already holds a membership in the project
    #[error("Already a member of this project")]
    AlreadyMember,

    /// No pending, unexpired invitation row matches the token: already
    /// accepted by a racing request, expired, or never issued
    #[error("Invitation not found or expired")]
    InvitationNotFoundOrExpired,

    /// Token codec failure (invalid signature, expired, wrong purpose)
    #[error(transparent)]
    Token(#[from] InviteTokenError),

    /// Underlying database failure
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Invitation lifecycle orchestrator
///
/// Cheap to clone; holds the pool handle plus the signing secret and the
/// base URL used for verification links.
#[derive(Clone)]
pub struct InvitationService {
    db: PgPool,
    token_secret: String,
    base_url: String,
}

impl InvitationService {
    /// Creates a new invitation service
    pub fn new(db: PgPool, token_secret: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            db,
            token_secret: token_secret.into(),
            base_url: base_url.into(),
        }
    }

    /// Issues an invitation for `email` to join `project_id` with `role`
    ///
    /// Persists the invitation (expiry = now + 7 days) and enqueues the
    /// notification email. Notification enqueue failure is logged and never
    /// surfaced: the invitation row is the durable source of truth, and
    /// re-sending is a separate action the caller may take.
    ///
    /// # Errors
    ///
    /// - [`InviteError::ProjectNotFound`] if the project does not exist
    /// - [`InviteError::DuplicatePendingInvitation`] if a pending, unexpired
    ///   invitation for (project, email) already exists
    pub async fn invite(
        &self,
        project_id: Uuid,
        email: &str,
        role: MembershipRole,
        invited_by: Uuid,
    ) -> Result<Invitation, InviteError> {
        let project = Project::find_by_id(&self.db, project_id)
            .await?
            .ok_or(InviteError::ProjectNotFound)?;

        if Invitation::pending_exists(&self.db, project_id, email).await? {
            debug!(%project_id, email, "Duplicate pending invitation rejected");
            return Err(InviteError::DuplicatePendingInvitation);
        }

        let token = token::encode(&self.token_secret, email, project_id)?;

        let invitation = Invitation::create(
            &self.db,
            CreateInvitation {
                project_id,
                email: email.to_string(),
                role,
                token: token.clone(),
                invited_by,
                expired_at: Utc::now() + Duration::days(INVITE_TTL_DAYS),
            },
        )
        .await
        .map_err(|e| match constraint_of(&e) {
            Some("uniq_pending_invitation_per_project") => InviteError::DuplicatePendingInvitation,
            _ => InviteError::Database(e),
        })?;

        info!(
            invitation_id = %invitation.id,
            %project_id,
            role = role.as_str(),
            "Invitation created"
        );

        // Best-effort notification: the invitation is already durable.
        let verify_url = self.verify_url(&token);
        let enqueue = EmailJob::enqueue(
            &self.db,
            CreateEmailJob {
                recipient: email.to_string(),
                subject: format!("You've been invited to join project {}", project.name),
                body: format!(
                    "You have been invited to join project {}.\nOpen this link to accept:\n{}",
                    project.name, verify_url
                ),
            },
        )
        .await;

        if let Err(e) = enqueue {
            warn!(invitation_id = %invitation.id, error = %e, "Failed to enqueue invitation email");
        }

        Ok(invitation)
    }

    /// Verifies an invitation token without touching the database
    ///
    /// A cheap, side-effect-free pre-check usable before the caller is
    /// authenticated. It deliberately does NOT confirm the invitation row
    /// still exists or is unaccepted; [`InvitationService::accept`]
    /// re-validates everything under a row lock, which is what closes the
    /// verify-then-stale-accept race.
    ///
    /// The three codec failures are distinguished here for logging but all
    /// map to one caller-visible invalid/expired class.
    pub fn verify_token(&self, token: &str) -> Result<InviteToken, InviteTokenError> {
        match token::decode(&self.token_secret, token, token::default_max_age()) {
            Ok(decoded) => Ok(decoded),
            Err(e) => {
                debug!(error = %e, "Invitation token rejected");
                Err(e)
            }
        }
    }

    /// Accepts an invitation on behalf of `user`
    ///
    /// Validates the token, binds it to the acting user's email
    /// (case-insensitive), then atomically locks the invitation row, marks
    /// it accepted, and creates the membership with the row's stored role.
    /// The membership is derived from the row, not from the decoded token,
    /// so a stale token can never enroll against updated row state.
    ///
    /// # Errors
    ///
    /// - [`InviteError::Token`] on codec failure
    /// - [`InviteError::EmailMismatch`] if the invitation was addressed to a
    ///   different email
    /// - [`InviteError::AlreadyMember`] if the user already belongs to the
    ///   project
    /// - [`InviteError::InvitationNotFoundOrExpired`] if no pending,
    ///   unexpired row matches the token
    pub async fn accept(&self, token: &str, user: &User) -> Result<Membership, InviteError> {
        let decoded = self.verify_token(token)?;

        // An invitation is bound to the invited address, not transferable to
        // whichever authenticated account presents the token.
        if !emails_match(&user.email, &decoded.email) {
            debug!(user_id = %user.id, "Invitation email mismatch");
            return Err(InviteError::EmailMismatch);
        }

        if Membership::exists(&self.db, decoded.project_id, user.id).await? {
            return Err(InviteError::AlreadyMember);
        }

        let mut tx = self.db.begin().await?;

        let invitation = Invitation::lock_pending_by_token(&mut tx, token)
            .await?
            .ok_or(InviteError::InvitationNotFoundOrExpired)?;

        Invitation::mark_accepted(&mut tx, invitation.id).await?;

        let membership = Membership::create_in_tx(
            &mut tx,
            CreateMembership {
                project_id: invitation.project_id,
                member_id: user.id,
                role: invitation.role,
            },
        )
        .await
        .map_err(|e| match constraint_of(&e) {
            Some("project_memberships_pkey") => InviteError::AlreadyMember,
            _ => InviteError::Database(e),
        })?;

        tx.commit().await?;

        info!(
            invitation_id = %invitation.id,
            project_id = %membership.project_id,
            member_id = %membership.member_id,
            "Invitation accepted"
        );

        Ok(membership)
    }

    /// Builds the verification URL embedded in invitation emails
    pub fn verify_url(&self, token: &str) -> String {
        format!(
            "{}/v1/invitations/verify?token={}",
            self.base_url.trim_end_matches('/'),
            token
        )
    }
}

/// Case-insensitive email comparison, full Unicode case folding
fn emails_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn constraint_of(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint(),
        _ => None,
    }
}
