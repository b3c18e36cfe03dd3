//! Credential error types.

use crate::token::jwt::JwtError;

/// Errors raised while resolving a credential into an identity.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The credential was empty or unparseable before verification.
    #[error("Malformed credential: {message}")]
    MalformedCredential {
        /// Description of what was wrong with the input.
        message: String,
    },

    /// Verification of the credential failed.
    #[error("Invalid credential: {message}")]
    InvalidCredential {
        /// Description of why verification failed.
        message: String,
    },

    /// The auth configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `MalformedCredential` error.
    #[must_use]
    pub fn malformed_credential(message: impl Into<String>) -> Self {
        Self::MalformedCredential {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidCredential` error.
    #[must_use]
    pub fn invalid_credential(message: impl Into<String>) -> Self {
        Self::InvalidCredential {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a client error (4xx category).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedCredential { .. } | Self::InvalidCredential { .. }
        )
    }

    /// Returns the message without the variant prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::MalformedCredential { message }
            | Self::InvalidCredential { message }
            | Self::Configuration { message } => message,
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        Self::invalid_credential(err.to_string())
    }
}

/// Result type for credential operations.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(AuthError::malformed_credential("empty").is_client_error());
        assert!(AuthError::invalid_credential("bad").is_client_error());
        assert!(!AuthError::configuration("secret").is_client_error());
    }

    #[test]
    fn test_jwt_error_becomes_invalid_credential() {
        let err: AuthError = JwtError::Expired.into();
        assert!(matches!(err, AuthError::InvalidCredential { .. }));
        assert_eq!(err.message(), "Token expired");
    }
}
