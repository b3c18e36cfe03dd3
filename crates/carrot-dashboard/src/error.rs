//! Aggregation error types.
//!
//! None of these reach a caller of the read path: fetchers absorb
//! `UpstreamUnavailable` into defaults and the aggregator absorbs the rest
//! into a placeholder or the previous snapshot.

use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    /// The product catalog could not be reached or answered badly.
    #[error("Upstream unavailable: {message}")]
    UpstreamUnavailable {
        /// Description of the upstream failure.
        message: String,
    },

    /// The overall aggregation deadline elapsed before every fetch finished.
    #[error("Aggregation timed out after {}ms", deadline.as_millis())]
    AggregationTimeout {
        /// The deadline that elapsed.
        deadline: Duration,
    },

    /// The refresh was cancelled by an invalidation.
    #[error("Refresh cancelled")]
    Cancelled,

    /// The dashboard configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl DashboardError {
    /// Creates a new `UpstreamUnavailable` error.
    #[must_use]
    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
        }
    }

    /// Creates a new `AggregationTimeout` error.
    #[must_use]
    pub fn aggregation_timeout(deadline: Duration) -> Self {
        Self::AggregationTimeout { deadline }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl From<reqwest::Error> for DashboardError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::upstream_unavailable(format!("request timed out: {err}"))
        } else if err.is_decode() {
            Self::upstream_unavailable(format!("malformed response: {err}"))
        } else {
            Self::upstream_unavailable(err.to_string())
        }
    }
}

/// Result type for dashboard operations.
pub type DashboardResult<T> = Result<T, DashboardError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            DashboardError::aggregation_timeout(Duration::from_secs(3)).to_string(),
            "Aggregation timed out after 3000ms"
        );
        assert_eq!(
            DashboardError::upstream_unavailable("status 503").to_string(),
            "Upstream unavailable: status 503"
        );
    }
}
