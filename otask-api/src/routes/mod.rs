/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Authentication endpoints (register, login, refresh)
/// - `projects`: Project creation and listing
/// - `invitations`: Invitation issue, verify, and accept

pub mod auth;
pub mod health;
pub mod invitations;
pub mod projects;
