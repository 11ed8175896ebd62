/// Invitation token codec
///
/// Encodes and decodes a signed, time-limited invitation payload
/// (email, project id, purpose tag) to and from an opaque string token.
/// This is a pure encode/verify primitive: no persistence, no side effects,
/// and the token carries no meaning to callers beyond what `decode` returns.
///
/// Tokens are HS256-signed JWTs with a custom claims set. There is no `exp`
/// claim; instead the issue timestamp (`iat`) is embedded and the caller
/// supplies the maximum acceptable age at decode time, so expiry policy
/// stays with the caller rather than being baked into the token.
///
/// # Security
///
/// - The signing secret never appears in the payload and is rotateable
///   (rotation invalidates outstanding tokens, which is acceptable for a
///   7-day invitation window).
/// - A token for another purpose signed with the same secret is rejected
///   via the embedded purpose tag.
///
/// # Example
///
/// ```
/// use otask_shared::invite::token::{encode, decode, default_max_age};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "server-held-secret-at-least-32-bytes";
/// let project_id = Uuid::new_v4();
///
/// let token = encode(secret, "a@x.com", project_id)?;
///
/// let decoded = decode(secret, &token, default_max_age())?;
/// assert_eq!(decoded.email, "a@x.com");
/// assert_eq!(decoded.project_id, project_id);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Purpose tag embedded in every invitation token
///
/// Distinguishes invitation tokens from any other signed-token use case the
/// same signing secret might serve.
pub const INVITE_PURPOSE: &str = "project_invite";

/// Default maximum token age (matches the stored invitation expiry)
pub fn default_max_age() -> Duration {
    Duration::days(7)
}

/// Error type for invitation token operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InviteTokenError {
    /// Failed to create token
    #[error("Failed to create invitation token: {0}")]
    CreateError(String),

    /// Signature does not verify or the payload is malformed
    #[error("Invalid invitation token")]
    Invalid,

    /// Token is older than the allowed maximum age
    #[error("Invitation token expired")]
    Expired,

    /// The embedded purpose tag is not `project_invite`
    #[error("Invalid token type")]
    WrongPurpose,
}

/// Signed invitation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
struct InviteClaims {
    /// Invitee email address
    email: String,

    /// Target project
    project: Uuid,

    /// Purpose tag, always [`INVITE_PURPOSE`] for tokens minted here
    purpose: String,

    /// Issued at (Unix timestamp); expiry is computed from this at decode
    iat: i64,
}

/// Decoded invitation token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteToken {
    /// Invitee email address
    pub email: String,

    /// Target project
    pub project_id: Uuid,

    /// When the token was issued
    pub issued_at: DateTime<Utc>,
}

/// Encodes an invitation token for (email, project)
///
/// The issue timestamp is captured implicitly at call time.
///
/// # Errors
///
/// Returns `InviteTokenError::CreateError` if signing fails
pub fn encode(secret: &str, email: &str, project_id: Uuid) -> Result<String, InviteTokenError> {
    let claims = InviteClaims {
        email: email.to_string(),
        project: project_id,
        purpose: INVITE_PURPOSE.to_string(),
        iat: Utc::now().timestamp(),
    };

    sign(secret, &claims)
}

fn sign(secret: &str, claims: &InviteClaims) -> Result<String, InviteTokenError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    jsonwebtoken::encode(&header, claims, &key)
        .map_err(|e| InviteTokenError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Decodes and verifies an invitation token
///
/// Checks, in order:
/// 1. Signature and payload shape (`Invalid` on failure)
/// 2. Age: elapsed time since issuance must be strictly less than `max_age`;
///    a token exactly `max_age` old is already expired (`Expired`)
/// 3. Purpose tag (`WrongPurpose` unless it is `project_invite`)
pub fn decode(
    secret: &str,
    token: &str,
    max_age: Duration,
) -> Result<InviteToken, InviteTokenError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    // The token carries no exp claim; age is validated below against iat.
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    let data = jsonwebtoken::decode::<InviteClaims>(token, &key, &validation)
        .map_err(|_| InviteTokenError::Invalid)?;
    let claims = data.claims;

    let issued_at = Utc
        .timestamp_opt(claims.iat, 0)
        .single()
        .ok_or(InviteTokenError::Invalid)?;

    let age = Utc::now().signed_duration_since(issued_at);
    if age >= max_age {
        return Err(InviteTokenError::Expired);
    }

    if claims.purpose != INVITE_PURPOSE {
        return Err(InviteTokenError::WrongPurpose);
    }

    Ok(InviteToken {
        email: claims.email,
        project_id: claims.project,
        issued_at,
    })
}
