/// Database models for OTask
///
/// This module contains all database models and their CRUD operations.
///
/// # Models
///
/// - `user`: User accounts
/// - `project`: Projects (the top-level aggregate)
/// - `membership`: User-project relationships with roles
/// - `invitation`: Pending and resolved project invitations
/// - `email_job`: Email outbox rows consumed by the delivery worker
///
/// # Example
///
/// ```no_run
/// use otask_shared::models::user::{User, CreateUser};
/// use otask_shared::db::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let new_user = CreateUser {
///     email: "user@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: Some("Jane Doe".to_string()),
/// };
///
/// let user = User::create(&pool, new_user).await?;
/// # Ok(())
/// # }
/// ```

pub mod email_job;
pub mod invitation;
pub mod membership;
pub mod project;
pub mod user;
