/// Membership model and database operations
///
/// This module provides the Membership model for user-project relationships
/// with role-based access control. The composite primary key enforces that a
/// user holds at most one membership per project; the invitation accept path
/// relies on this constraint as its race guard, so this model only ever
/// inserts memberships inside that flow, never updates them.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE membership_role AS ENUM ('administrator', 'member', 'viewer');
///
/// CREATE TABLE project_memberships (
///     project_id UUID NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
///     member_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
///     role membership_role NOT NULL DEFAULT 'member',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (project_id, member_id)
/// );
/// ```
///
/// # Roles
///
/// - **administrator**: Manage the project, members, and invitations
/// - **member**: Work within the project
/// - **viewer**: Read-only access

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// RBAC roles for project memberships
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "membership_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MembershipRole {
    /// Can manage the project, its members, and invitations
    Administrator,

    /// Can work within the project
    Member,

    /// Read-only access
    Viewer,
}

impl MembershipRole {
    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipRole::Administrator => "administrator",
            MembershipRole::Member => "member",
            MembershipRole::Viewer => "viewer",
        }
    }

    /// Can invite users to the project
    pub fn can_invite(&self) -> bool {
        matches!(self, MembershipRole::Administrator | MembershipRole::Member)
    }

    /// Can manage members (change roles, remove)
    pub fn can_manage_members(&self) -> bool {
        matches!(self, MembershipRole::Administrator)
    }

    /// Checks if this role has the permission level of the required role
    ///
    /// Hierarchy: Administrator > Member > Viewer
    pub fn has_permission(&self, required: &MembershipRole) -> bool {
        self.permission_level() >= required.permission_level()
    }

    fn permission_level(&self) -> u8 {
        match self {
            MembershipRole::Administrator => 3,
            MembershipRole::Member => 2,
            MembershipRole::Viewer => 1,
        }
    }
}

/// Membership model representing a user-project relationship with role
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    /// Project ID
    pub project_id: Uuid,

    /// Member's user ID
    pub member_id: Uuid,

    /// Role within the project
    pub role: MembershipRole,

    /// When the membership was created
    pub created_at: DateTime<Utc>,
}

/// Input for creating a new membership
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMembership {
    /// Project ID
    pub project_id: Uuid,

    /// Member's user ID
    pub member_id: Uuid,

    /// Role to assign (defaults to Member)
    #[serde(default = "default_role")]
    pub role: MembershipRole,
}

fn default_role() -> MembershipRole {
    MembershipRole::Member
}

impl Membership {
    /// Creates a new membership (adds a user to a project)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The membership already exists (unique constraint violation)
    /// - Project or user doesn't exist (foreign key violation)
    /// - Database connection fails
    pub async fn create(pool: &PgPool, data: CreateMembership) -> Result<Self, sqlx::Error> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO project_memberships (project_id, member_id, role)
            VALUES ($1, $2, $3)
            RETURNING project_id, member_id, role, created_at
            "#,
        )
        .bind(data.project_id)
        .bind(data.member_id)
        .bind(data.role)
        .fetch_one(pool)
        .await?;

        Ok(membership)
    }

    /// Creates a membership inside an open transaction
    ///
    /// Used by the invitation accept flow so the membership insert commits
    /// atomically with the invitation update.
    pub async fn create_in_tx(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        data: CreateMembership,
    ) -> Result<Self, sqlx::Error> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO project_memberships (project_id, member_id, role)
            VALUES ($1, $2, $3)
            RETURNING project_id, member_id, role, created_at
            "#,
        )
        .bind(data.project_id)
        .bind(data.member_id)
        .bind(data.role)
        .fetch_one(&mut **tx)
        .await?;

        Ok(membership)
    }

    /// Finds a specific membership by project and member
    pub async fn find(
        pool: &PgPool,
        project_id: Uuid,
        member_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error> {
        let membership = sqlx::query_as::<_, Membership>(
            r#"
            SELECT project_id, member_id, role, created_at
            FROM project_memberships
            WHERE project_id = $1 AND member_id = $2
            "#,
        )
        .bind(project_id)
        .bind(member_id)
        .fetch_optional(pool)
        .await?;

        Ok(membership)
    }

    /// Checks if a user is a member of a project (any role)
    pub async fn exists(
        pool: &PgPool,
        project_id: Uuid,
        member_id: Uuid,
    ) -> Result<bool, sqlx::Error> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM project_memberships
                WHERE project_id = $1 AND member_id = $2
            )
            "#,
        )
        .bind(project_id)
        .bind(member_id)
        .fetch_one(pool)
        .await?;

        Ok(exists)
    }

    /// Counts members in a project
    pub async fn count_by_project(pool: &PgPool, project_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM project_memberships WHERE project_id = $1")
                .bind(project_id)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }
}
