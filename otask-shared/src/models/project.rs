/// Project model and database operations
///
/// Projects are the top-level aggregate: memberships and invitations belong
/// to a project and are cascade-deleted with it.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE project_access AS ENUM ('private', 'limited', 'open');
///
/// CREATE TABLE projects (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     key VARCHAR(32) NOT NULL,
///     access project_access NOT NULL DEFAULT 'open',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Access-level options for project visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_access", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProjectAccess {
    /// Visible to members only
    Private,

    /// Visible to invited users
    Limited,

    /// Visible to everyone
    Open,
}

impl ProjectAccess {
    /// Converts access level to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectAccess::Private => "private",
            ProjectAccess::Limited => "limited",
            ProjectAccess::Open => "open",
        }
    }
}

/// Project model
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Project {
    /// Unique project ID (UUID v4)
    pub id: Uuid,

    /// Project name
    pub name: String,

    /// Short key derived from the name, e.g. "OTask Project" -> "OP"
    pub key: String,

    /// Visibility level
    pub access: ProjectAccess,

    /// When the project was created
    pub created_at: DateTime<Utc>,

    /// When the project was last updated
    pub updated_at: DateTime<Utc>,
}

/// Input for creating a new project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProject {
    /// Project name (the key is derived from it)
    pub name: String,

    /// Visibility level (defaults to open)
    #[serde(default = "default_access")]
    pub access: ProjectAccess,
}

fn default_access() -> ProjectAccess {
    ProjectAccess::Open
}

/// Derives a project key from a project name by taking the first letter of
/// each word, uppercased.
///
/// # Example
///
/// ```
/// use otask_shared::models::project::format_project_key;
///
/// assert_eq!(format_project_key("OTask Project"), "OP");
/// ```
pub fn format_project_key(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|word| word.chars().next())
        .flat_map(|c| c.to_uppercase())
        .collect()
}

impl Project {
    /// Creates a new project
    ///
    /// The key is derived from the name via [`format_project_key`].
    pub async fn create(pool: &PgPool, data: CreateProject) -> Result<Self, sqlx::Error> {
        let key = format_project_key(&data.name);

        let project = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO projects (name, key, access)
            VALUES ($1, $2, $3)
            RETURNING id, name, key, access, created_at, updated_at
            "#,
        )
        .bind(data.name)
        .bind(key)
        .bind(data.access)
        .fetch_one(pool)
        .await?;

        Ok(project)
    }

    /// Finds a project by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let project = sqlx::query_as::<_, Project>(
            r#"
            SELECT id, name, key, access, created_at, updated_at
            FROM projects
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(project)
    }

    /// Lists the projects a user belongs to, newest first
    pub async fn list_by_member(pool: &PgPool, member_id: Uuid) -> Result<Vec<Self>, sqlx::Error> {
        let projects = sqlx::query_as::<_, Project>(
            r#"
            SELECT p.id, p.name, p.key, p.access, p.created_at, p.updated_at
            FROM projects p
            JOIN project_memberships m ON m.project_id = p.id
            WHERE m.member_id = $1
            ORDER BY p.created_at DESC
            "#,
        )
        .bind(member_id)
        .fetch_all(pool)
        .await?;

        Ok(projects)
    }
}
