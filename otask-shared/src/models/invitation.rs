/// Invitation model and database operations
///
/// An invitation offers a specific email address a role in a specific
/// project, bound to a signed token and an expiry. The row lifecycle is
/// `pending -> accepted` (terminal); expiry is a read-time predicate, the
/// row itself is untouched when it lapses.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE project_invitations (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     email CITEXT NOT NULL,
///     role membership_role NOT NULL DEFAULT 'member',
///     token TEXT NOT NULL UNIQUE,
///     invited_by UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     expired_at TIMESTAMPTZ NOT NULL,
///     accepted_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
///
/// -- at most one pending invitation per (project, email)
/// CREATE UNIQUE INDEX uniq_pending_invitation_per_project
///     ON project_invitations (project_id, email)
///     WHERE accepted_at IS NULL;
/// ```
///
/// # Concurrency
///
/// [`Invitation::lock_pending_by_token`] takes a `FOR UPDATE` row lock inside
/// the caller's transaction. Two accepts racing on the same token serialize
/// on that lock; the loser re-evaluates the `accepted_at IS NULL` predicate
/// after the winner commits and finds no row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::membership::MembershipRole;

/// Invitation model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Invitation {
    /// Unique invitation ID (UUID v4)
    pub id: Uuid,

    /// Project this invitation belongs to
    pub project_id: Uuid,

    /// Invitee email address (case-insensitive via CITEXT)
    pub email: String,

    /// Role the invitee will receive on acceptance
    pub role: MembershipRole,

    /// Signed invitation token (globally unique)
    pub token: String,

    /// User who issued the invitation
    pub invited_by: Uuid,

    /// When the invitation stops being honored
    pub expired_at: DateTime<Utc>,

    /// When the invitation was accepted (None while pending)
    pub accepted_at: Option<DateTime<Utc>>,

    /// When the invitation was created
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new invitation
#[derive(Debug, Clone)]
pub struct CreateInvitation {
    /// Project to invite into
    pub project_id: Uuid,

    /// Invitee email address
    pub email: String,

    /// Role to grant on acceptance
    pub role: MembershipRole,

    /// Signed token minted for this invitation
    pub token: String,

    /// Issuing user
    pub invited_by: Uuid,

    /// Expiry timestamp
    pub expired_at: DateTime<Utc>,
}

impl Invitation {
    /// Persists a new pending invitation
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - A pending invitation for (project, email) already exists
    ///   (partial unique index violation)
    /// - The token collides with an existing one (unique constraint)
    /// - Database connection fails
    pub async fn create(pool: &PgPool, data: CreateInvitation) -> Result<Self, sqlx::Error> {
        let invitation = sqlx::query_as::<_, Invitation>(
            r#"
            INSERT INTO project_invitations (project_id, email, role, token, invited_by, expired_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, project_id, email, role, token, invited_by,
                      expired_at, accepted_at, created_at
            "#,
        )
        .bind(data.project_id)
        .bind(data.email)
        .bind(data.role)
        .bind(data.token)
        .bind(data.invited_by)
        .bind(data.expired_at)
        .fetch_one(pool)
        .await?;

        Ok(invitation)
    }

    /// Checks whether a pending, unexpired invitation exists for
    /// (project, email)
    pub async fn pending_exists(
        pool: &PgPool,
        project_id: Uuid,
        email: &str,
    ) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM project_invitations
                WHERE project_id = $1
                  AND email = $2
                  AND accepted_at IS NULL
                  AND expired_at > NOW()
            )
            "#,
        )
        .bind(project_id)
        .bind(email)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Locks the pending, unexpired invitation matching a token
    ///
    /// Runs `SELECT ... FOR UPDATE` inside the caller's transaction. Returns
    /// `None` when no matching row exists: already accepted by a racing
    /// request, expired, or the token does not correspond to any row.
    pub async fn lock_pending_by_token(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        token: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let invitation = sqlx::query_as::<_, Invitation>(
            r#"
            SELECT id, project_id, email, role, token, invited_by,
                   expired_at, accepted_at, created_at
            FROM project_invitations
            WHERE token = $1
              AND accepted_at IS NULL
              AND expired_at > NOW()
            FOR UPDATE
            "#,
        )
        .bind(token)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(invitation)
    }

    /// Marks a locked invitation as accepted
    ///
    /// Must be called inside the transaction that holds the row lock. Sets
    /// `accepted_at = NOW()`, turning the row into terminal state.
    pub async fn mark_accepted(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        id: Uuid,
    ) -> Result<Self, sqlx::Error> {
        let invitation = sqlx::query_as::<_, Invitation>(
            r#"
            UPDATE project_invitations
            SET accepted_at = NOW()
            WHERE id = $1
            RETURNING id, project_id, email, role, token, invited_by,
                      expired_at, accepted_at, created_at
            "#,
        )
        .bind(id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(invitation)
    }

    /// Lists invitations for a project, newest first
    pub async fn list_by_project(pool: &PgPool, project_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let invitations = sqlx::query_as::<_, Invitation>(
            r#"
            SELECT id, project_id, email, role, token, invited_by,
                   expired_at, accepted_at, created_at
            FROM project_invitations
            WHERE project_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await?;

        Ok(invitations)
    }

    /// Whether this invitation is still pending (not accepted)
    pub fn is_pending(&self) -> bool {
        self.accepted_at.is_none()
    }

    /// Whether this invitation has lapsed
    pub fn is_expired(&self) -> bool {
        self.expired_at <= Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample(expired_at: DateTime<Utc>, accepted_at: Option<DateTime<Utc>>) -> Invitation {
        Invitation {
            id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            email: "a@x.com".to_string(),
            role: MembershipRole::Member,
            token: "tok".to_string(),
            invited_by: Uuid::new_v4(),
            expired_at,
            accepted_at,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_pending() {
        let inv = sample(Utc::now() + Duration::days(7), None);
        assert!(inv.is_pending());

        let accepted = sample(Utc::now() + Duration::days(7), Some(Utc::now()));
        assert!(!accepted.is_pending());
    }

    #[test]
    fn test_is_expired() {
        let fresh = sample(Utc::now() + Duration::days(7), None);
        assert!(!fresh.is_expired());

        let lapsed = sample(Utc::now() - Duration::seconds(1), None);
        assert!(lapsed.is_expired());
    }
}
