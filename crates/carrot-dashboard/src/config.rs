//! Catalog client and aggregation settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{DashboardError, DashboardResult};

/// Product catalog connection settings.
///
/// # Example (TOML)
///
/// ```toml
/// [catalog]
/// base_url = "http://product-service:8082"
/// fetch_timeout = "2s"
/// listing_timeout = "5s"
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Base URL of the product catalog service.
    pub base_url: String,

    /// Per-call timeout for the dashboard fetches.
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Duration,

    /// Timeout for direct listing reads outside the dashboard.
    #[serde(with = "humantime_serde")]
    pub listing_timeout: Duration,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: "http://product-service:8082".to_string(),
            fetch_timeout: Duration::from_secs(2),
            listing_timeout: Duration::from_secs(5),
        }
    }
}

impl CatalogConfig {
    /// Parses `base_url`.
    pub fn parsed_base_url(&self) -> DashboardResult<Url> {
        Url::parse(&self.base_url).map_err(|e| {
            DashboardError::configuration(format!(
                "catalog.base_url '{}' is not a valid URL: {}",
                self.base_url, e
            ))
        })
    }

    pub fn validate(&self) -> DashboardResult<()> {
        let url = self.parsed_base_url()?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DashboardError::configuration(format!(
                "catalog.base_url must be http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.fetch_timeout.is_zero() || self.listing_timeout.is_zero() {
            return Err(DashboardError::configuration(
                "catalog timeouts must be > 0",
            ));
        }

        Ok(())
    }
}

/// Aggregation and snapshot cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Overall deadline for joining the fetches, measured from launch.
    #[serde(with = "humantime_serde")]
    pub deadline: Duration,

    /// Lifetime of a cached snapshot.
    #[serde(with = "humantime_serde")]
    pub snapshot_ttl: Duration,

    /// Maximum number of listings and activity records in a snapshot.
    pub recent_limit: usize,

    /// Size bound of the snapshot cache.
    pub max_entries: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(3),
            snapshot_ttl: Duration::from_secs(5 * 60),
            recent_limit: 5,
            max_entries: 10_000,
        }
    }
}

impl DashboardConfig {
    pub fn validate(&self) -> DashboardResult<()> {
        if self.deadline.is_zero() {
            return Err(DashboardError::configuration("dashboard.deadline must be > 0"));
        }

        if self.snapshot_ttl.is_zero() {
            return Err(DashboardError::configuration(
                "dashboard.snapshot_ttl must be > 0",
            ));
        }

        if self.max_entries == 0 {
            return Err(DashboardError::configuration(
                "dashboard.max_entries must be > 0",
            ));
        }

        Ok(())
    }
}
