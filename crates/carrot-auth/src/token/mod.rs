//! Credential verification.

pub mod jwt;

use time::OffsetDateTime;

use carrot_core::Identity;

use self::jwt::{JwtError, JwtService};

/// Outcome of a successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCredential {
    pub identity: Identity,
    /// When the credential itself stops being valid.
    pub expires_at: OffsetDateTime,
}

/// Decodes and cryptographically verifies a raw credential.
///
/// Implementations must be pure: the same input always yields the same
/// outcome until the credential expires, and verification has no side
/// effects. The credential cache relies on this to run concurrent misses
/// for the same token without coordination.
pub trait CredentialVerifier: Send + Sync {
    /// Verifies `token` (already stripped of its scheme) and extracts the
    /// identity it carries.
    fn verify(&self, token: &str) -> Result<VerifiedCredential, JwtError>;
}

impl CredentialVerifier for JwtService {
    fn verify(&self, token: &str) -> Result<VerifiedCredential, JwtError> {
        let claims = self.decode(token)?;
        Ok(VerifiedCredential {
            identity: claims.identity()?,
            expires_at: claims.expires_at()?,
        })
    }
}
