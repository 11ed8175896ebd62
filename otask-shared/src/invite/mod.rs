/// Project invitation core
///
/// The one part of the system with real invariants: signed, time-limited
/// invitation tokens and at-most-once acceptance under concurrency.
///
/// # Modules
///
/// - `token`: Signed invitation token codec (encode / decode with max age)
/// - `service`: Invitation orchestration (invite, verify, accept)

pub mod service;
pub mod token;
