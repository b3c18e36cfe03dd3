//! JWT encoding and validation for HMAC-signed credentials.
//!
//! Credentials carry the account email in `sub`, the numeric account id in
//! `userId` and the display name in `nickname`.
//!
//! ## Example
//!
//! ```ignore
//! use carrot_auth::token::jwt::{CredentialClaims, JwtService, SigningAlgorithm};
//!
//! let service = JwtService::from_secret(secret.as_bytes(), SigningAlgorithm::HS256);
//! let token = service.encode(&CredentialClaims::new("a@b.c", 42, "carrot"))?;
//! let claims = service.decode(&token)?;
//! ```

use std::fmt;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use carrot_core::Identity;

use crate::config::AuthConfig;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during JWT operations.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to decode a token.
    #[error("Failed to decode token: {message}")]
    DecodingError {
        /// Description of the decoding error.
        message: String,
    },

    /// The token has expired.
    #[error("Token expired")]
    Expired,

    /// The token signature is invalid.
    #[error("Invalid signature")]
    InvalidSignature,

    /// The token claims are invalid.
    #[error("Invalid claims: {message}")]
    InvalidClaims {
        /// Description of why claims are invalid.
        message: String,
    },

    /// A required claim is missing.
    #[error("Missing required claim: {claim}")]
    MissingClaim {
        /// Name of the missing claim.
        claim: String,
    },
}

impl JwtError {
    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `DecodingError`.
    #[must_use]
    pub fn decoding_error(message: impl Into<String>) -> Self {
        Self::DecodingError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidClaims` error.
    #[must_use]
    pub fn invalid_claims(message: impl Into<String>) -> Self {
        Self::InvalidClaims {
            message: message.into(),
        }
    }

    /// Creates a new `MissingClaim` error.
    #[must_use]
    pub fn missing_claim(claim: impl Into<String>) -> Self {
        Self::MissingClaim {
            claim: claim.into(),
        }
    }
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;

        match err.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidSignature => Self::InvalidSignature,
            ErrorKind::MissingRequiredClaim(claim) => Self::missing_claim(claim.clone()),
            ErrorKind::InvalidSubject | ErrorKind::ImmatureSignature => {
                Self::invalid_claims(err.to_string())
            }
            _ => Self::decoding_error(err.to_string()),
        }
    }
}

// ============================================================================
// Signing Algorithm
// ============================================================================

/// Supported HMAC signing algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SigningAlgorithm {
    /// HMAC with SHA-256.
    HS256,
    /// HMAC with SHA-384.
    HS384,
    /// HMAC with SHA-512.
    HS512,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` Algorithm type.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::HS256 => Algorithm::HS256,
            Self::HS384 => Algorithm::HS384,
            Self::HS512 => Algorithm::HS512,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HS256 => "HS256",
            Self::HS384 => "HS384",
            Self::HS512 => "HS512",
        }
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Token Claims
// ============================================================================

/// Claims carried by a user credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CredentialClaims {
    /// Subject (account email).
    pub sub: String,

    /// Numeric account id. Optional on the wire so a missing claim can be
    /// reported as such instead of as a decoding failure.
    #[serde(rename = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,

    /// Display name.
    #[serde(default)]
    pub nickname: String,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration time (Unix timestamp).
    pub exp: i64,
}

impl CredentialClaims {
    /// Creates claims issued now and valid for one hour.
    #[must_use]
    pub fn new(email: impl Into<String>, user_id: i64, nickname: impl Into<String>) -> Self {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        Self {
            sub: email.into(),
            user_id: Some(user_id),
            nickname: nickname.into(),
            iat: now,
            exp: now + 3600,
        }
    }

    /// Sets the expiration relative to `iat`.
    #[must_use]
    pub fn expires_in_seconds(mut self, seconds: i64) -> Self {
        self.exp = self.iat + seconds;
        self
    }

    /// Returns the identity carried by these claims.
    ///
    /// # Errors
    /// Returns `JwtError::MissingClaim` if `userId` is absent.
    pub fn identity(&self) -> Result<Identity, JwtError> {
        let user_id = self.user_id.ok_or_else(|| JwtError::missing_claim("userId"))?;
        Ok(Identity::new(user_id, self.sub.clone(), self.nickname.clone()))
    }

    /// Returns the expiration as a timestamp.
    ///
    /// # Errors
    /// Returns `JwtError::InvalidClaims` if `exp` is out of range.
    pub fn expires_at(&self) -> Result<OffsetDateTime, JwtError> {
        OffsetDateTime::from_unix_timestamp(self.exp)
            .map_err(|e| JwtError::invalid_claims(format!("exp out of range: {e}")))
    }
}

// ============================================================================
// JWT Service
// ============================================================================

/// Encodes and validates HMAC-signed credentials.
pub struct JwtService {
    algorithm: SigningAlgorithm,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    /// Creates a service from a shared secret.
    #[must_use]
    pub fn from_secret(secret: &[u8], algorithm: SigningAlgorithm) -> Self {
        Self {
            algorithm,
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }

    /// Creates a service from the auth configuration.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::from_secret(config.secret.as_bytes(), config.algorithm)
    }

    /// Encodes claims into a signed JWT string.
    ///
    /// # Errors
    /// Returns an error if encoding fails.
    pub fn encode(&self, claims: &CredentialClaims) -> Result<String, JwtError> {
        let header = Header::new(self.algorithm.to_jwt_algorithm());

        encode(&header, claims, &self.encoding_key)
            .map_err(|e| JwtError::encoding_error(e.to_string()))
    }

    /// Decodes and validates a JWT string.
    ///
    /// The signature and `exp` are checked with no leeway.
    ///
    /// # Errors
    /// Returns an error if decoding or validation fails.
    pub fn decode(&self, token: &str) -> Result<CredentialClaims, JwtError> {
        let mut validation = Validation::new(self.algorithm.to_jwt_algorithm());
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);

        decode::<CredentialClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(JwtError::from)
    }

    #[must_use]
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }
}
