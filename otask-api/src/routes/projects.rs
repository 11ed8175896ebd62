/// Project endpoints
///
/// # Endpoints
///
/// - `POST /v1/projects` - Create a project (creator becomes administrator)
/// - `GET /v1/projects` - List the caller's projects

use crate::{
    app::AppState,
    error::ApiResult,
};
use axum::{extract::State, Extension, Json};
use otask_shared::{
    auth::middleware::AuthContext,
    models::{
        membership::{CreateMembership, Membership, MembershipRole},
        project::{CreateProject, Project, ProjectAccess},
    },
};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Create project request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateProjectRequest {
    /// Project name (the key is derived from it)
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    /// Visibility level
    #[serde(default = "default_access")]
    pub access: ProjectAccess,
}

fn default_access() -> ProjectAccess {
    ProjectAccess::Open
}

/// Project response body
#[derive(Debug, Serialize)]
pub struct ProjectResponse {
    /// Project ID
    pub id: String,

    /// Project name
    pub name: String,

    /// Derived short key
    pub key: String,

    /// Visibility level
    pub access: ProjectAccess,
}

impl From<Project> for ProjectResponse {
    fn from(p: Project) -> Self {
        Self {
            id: p.id.to_string(),
            name: p.name,
            key: p.key,
            access: p.access,
        }
    }
}

/// Create a new project
///
/// The caller becomes the project's first administrator.
///
/// # Endpoint
///
/// ```text
/// POST /v1/projects
/// Authorization: Bearer <access_token>
/// Content-Type: application/json
///
/// { "name": "OTask Project", "access": "open" }
/// ```
pub async fn create_project(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateProjectRequest>,
) -> ApiResult<Json<ProjectResponse>> {
    req.validate()?;

    let project = Project::create(
        &state.db,
        CreateProject {
            name: req.name,
            access: req.access,
        },
    )
    .await?;

    Membership::create(
        &state.db,
        CreateMembership {
            project_id: project.id,
            member_id: auth.user_id,
            role: MembershipRole::Administrator,
        },
    )
    .await?;

    Ok(Json(project.into()))
}

/// List the caller's projects
///
/// # Endpoint
///
/// ```text
/// GET /v1/projects
/// Authorization: Bearer <access_token>
/// ```
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<ProjectResponse>>> {
    let projects = Project::list_by_member(&state.db, auth.user_id).await?;

    Ok(Json(projects.into_iter().map(Into::into).collect()))
}
