//! Credential verification configuration.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth]
//! secret = "change-me-to-a-32-byte-or-longer-secret"
//! algorithm = "HS256"
//! cache_ttl = "5m"
//! sweep_interval = "1m"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::token::jwt::SigningAlgorithm;

/// Minimum HMAC key length accepted by [`AuthConfig::validate`].
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared HMAC secret used to verify credentials.
    pub secret: String,

    /// HMAC algorithm credentials are signed with.
    pub algorithm: SigningAlgorithm,

    /// Scheme stripped from the raw credential before verification.
    pub bearer_prefix: String,

    /// Lifetime of a cached verification result.
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,

    /// Period of the background sweeper.
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,

    /// Size bound of the verification cache.
    pub max_entries: usize,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            algorithm: SigningAlgorithm::HS256,
            bearer_prefix: "Bearer ".to_string(),
            cache_ttl: Duration::from_secs(5 * 60),
            sweep_interval: Duration::from_secs(60),
            max_entries: 10_000,
        }
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An invalid configuration value was provided.
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// A required configuration value is missing.
    #[error("Missing required configuration: {0}")]
    Missing(String),
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if the secret is empty, and
    /// `ConfigError::InvalidValue` if the secret is shorter than
    /// [`MIN_SECRET_LEN`] bytes or any duration or size bound is zero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret.is_empty() {
            return Err(ConfigError::Missing("auth.secret".to_string()));
        }

        if self.secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::InvalidValue(format!(
                "auth.secret must be at least {} bytes, got {}",
                MIN_SECRET_LEN,
                self.secret.len()
            )));
        }

        if self.cache_ttl.is_zero() {
            return Err(ConfigError::InvalidValue(
                "auth.cache_ttl must be > 0".to_string(),
            ));
        }

        if self.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "auth.sweep_interval must be > 0".to_string(),
            ));
        }

        if self.max_entries == 0 {
            return Err(ConfigError::InvalidValue(
                "auth.max_entries must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> AuthConfig {
        AuthConfig {
            secret: "a".repeat(MIN_SECRET_LEN),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert_eq!(config.bearer_prefix, "Bearer ");
        assert_eq!(config.algorithm, SigningAlgorithm::HS256);
    }

    #[test]
    fn test_missing_secret_fails_validation() {
        let err = AuthConfig::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing(_)));
    }

    #[test]
    fn test_short_secret_fails_validation() {
        let config = AuthConfig {
            secret: "short".to_string(),
            ..AuthConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("at least 32 bytes"));
    }

    #[test]
    fn test_zero_ttl_fails_validation() {
        let mut config = valid();
        config.cache_ttl = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn test_deserialize_humantime() {
        let json = r#"{"secret":"s","algorithm":"HS512","cache_ttl":"90s","sweep_interval":"2m"}"#;
        let config: AuthConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.algorithm, SigningAlgorithm::HS512);
        assert_eq!(config.cache_ttl, Duration::from_secs(90));
        assert_eq!(config.sweep_interval, Duration::from_secs(120));
        assert_eq!(config.max_entries, 10_000);
    }
}
