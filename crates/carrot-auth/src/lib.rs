//! Credential verification and the verification cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod token;

pub use cache::{CredentialCache, Fingerprint};
pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, AuthResult};
pub use token::jwt::{CredentialClaims, JwtError, JwtService, SigningAlgorithm};
pub use token::{CredentialVerifier, VerifiedCredential};
