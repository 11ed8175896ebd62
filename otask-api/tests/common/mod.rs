/// Common test utilities for integration tests
///
/// This module provides shared infrastructure for integration tests:
/// - Test database setup and cleanup
/// - Test user and project creation
/// - JWT token generation
/// - API client helpers
///
/// Tests require a live PostgreSQL instance via `DATABASE_URL`. When the
/// variable is not set, each test logs and returns early so the suite still
/// passes in environments without a database.

use otask_api::app::{build_router, AppState};
use otask_api::config::{ApiConfig, AuthConfig, Config, DatabaseConfig};
use otask_shared::auth::jwt::{create_token, Claims, TokenType};
use otask_shared::models::membership::{CreateMembership, Membership, MembershipRole};
use otask_shared::models::project::{CreateProject, Project, ProjectAccess};
use otask_shared::models::user::{CreateUser, User};
use sqlx::PgPool;
use uuid::Uuid;

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-bytes";

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub config: Config,
    pub project: Project,
    pub admin: User,
    pub admin_token: String,
}

impl TestContext {
    /// Creates a new test context, or None when DATABASE_URL is not set
    pub async fn try_new() -> Option<Self> {
        let database_url = match std::env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) => {
                eprintln!("DATABASE_URL not set; skipping integration test");
                return None;
            }
        };

        let config = Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                base_url: "http://localhost:8080".to_string(),
                cors_origins: vec!["*".to_string()],
                production: false,
            },
            database: DatabaseConfig {
                url: database_url.clone(),
                max_connections: 5,
            },
            auth: AuthConfig {
                jwt_secret: TEST_SECRET.to_string(),
                invite_token_secret: TEST_SECRET.to_string(),
            },
        };

        let db = PgPool::connect(&database_url).await.unwrap();

        // Path relative to this crate's Cargo.toml
        sqlx::migrate!("../otask-shared/migrations")
            .run(&db)
            .await
            .unwrap();

        let admin = create_user(&db, "admin").await;
        let admin_token = token_for(&admin);

        let project = Project::create(
            &db,
            CreateProject {
                name: format!("Test Project {}", Uuid::new_v4()),
                access: ProjectAccess::Open,
            },
        )
        .await
        .unwrap();

        Membership::create(
            &db,
            CreateMembership {
                project_id: project.id,
                member_id: admin.id,
                role: MembershipRole::Administrator,
            },
        )
        .await
        .unwrap();

        let state = AppState::new(db.clone(), config.clone());
        let app = build_router(state);

        Some(TestContext {
            db,
            app,
            config,
            project,
            admin,
            admin_token,
        })
    }

    /// Returns authorization header value for the admin user
    pub fn auth_header(&self) -> String {
        format!("Bearer {}", self.admin_token)
    }

    /// Deletes the test project and everything hanging off it
    pub async fn cleanup(&self) {
        sqlx::query("DELETE FROM projects WHERE id = $1")
            .bind(self.project.id)
            .execute(&self.db)
            .await
            .unwrap();
    }
}

/// Creates a user with a unique email; `label` keeps failures readable
pub async fn create_user(db: &PgPool, label: &str) -> User {
    User::create(
        db,
        CreateUser {
            email: format!("{}-{}@example.com", label, Uuid::new_v4()),
            password_hash: "test_hash".to_string(),
            name: Some(format!("Test {}", label)),
        },
    )
    .await
    .unwrap()
}

/// Issues an access token for a user with the test secret
pub fn token_for(user: &User) -> String {
    let claims = Claims::new(user.id, TokenType::Access);
    create_token(&claims, TEST_SECRET).unwrap()
}

/// Helper to wait for a condition with timeout
pub async fn wait_for<F, Fut>(condition: F, timeout_secs: u64) -> anyhow::Result<()>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_secs(timeout_secs);

    loop {
        if condition().await {
            return Ok(());
        }

        if start.elapsed() > timeout {
            anyhow::bail!("Condition not met within {} seconds", timeout_secs);
        }

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
    }
}
