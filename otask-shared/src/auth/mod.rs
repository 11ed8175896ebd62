/// Authentication primitives for OTask
///
/// # Modules
///
/// - `jwt`: Access/refresh token generation and validation
/// - `password`: Argon2id password hashing
/// - `middleware`: Axum auth context and bearer-token extraction

pub mod jwt;
pub mod middleware;
pub mod password;
