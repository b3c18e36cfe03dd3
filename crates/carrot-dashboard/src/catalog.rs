//! Product catalog client.
//!
//! The catalog wraps every payload in a `{ "success": bool, "data": ... }`
//! envelope. Anything other than a 2xx response with `success: true` and a
//! decodable `data` is reported as `UpstreamUnavailable`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use carrot_core::SubjectId;

use crate::config::CatalogConfig;
use crate::error::{DashboardError, DashboardResult};
use crate::model::{ListingSummary, Statistics};

/// Remote source of product data for one account.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Fetches product statistics for `subject`.
    async fn statistics(&self, subject: SubjectId, timeout: Duration) -> DashboardResult<Statistics>;

    /// Fetches every listing owned by `subject`, in catalog order.
    async fn owned_listings(
        &self,
        subject: SubjectId,
        timeout: Duration,
    ) -> DashboardResult<Vec<ListingSummary>>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    data: Option<T>,
}

/// HTTP client for the product catalog service.
#[derive(Clone)]
pub struct HttpCatalogClient {
    http_client: Client,
    base_url: Url,
}

impl HttpCatalogClient {
    /// Endpoint paths are resolved under `base_url`, keeping any path prefix
    /// it carries (`http://gateway/product` serves `.../product/api/...`).
    pub fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let prefixed = format!("{}/", base_url.path());
            base_url.set_path(&prefixed);
        }
        Self {
            http_client: Client::new(),
            base_url,
        }
    }

    pub fn from_config(config: &CatalogConfig) -> DashboardResult<Self> {
        Ok(Self::new(config.parsed_base_url()?))
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> DashboardResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| DashboardError::configuration(format!("invalid catalog path {path}: {e}")))
    }

    async fn get<T: DeserializeOwned>(&self, url: Url, timeout: Duration) -> DashboardResult<T> {
        let response = self
            .http_client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DashboardError::upstream_unavailable(format!(
                "GET {url} returned {status}"
            )));
        }

        let envelope: Envelope<T> = response.json().await?;
        match envelope {
            Envelope {
                success: true,
                data: Some(data),
            } => Ok(data),
            Envelope { success: false, .. } => Err(DashboardError::upstream_unavailable(format!(
                "GET {url} reported success=false"
            ))),
            Envelope { data: None, .. } => Err(DashboardError::upstream_unavailable(format!(
                "GET {url} returned no data"
            ))),
        }
    }
}

#[async_trait]
impl ProductCatalog for HttpCatalogClient {
    async fn statistics(&self, subject: SubjectId, timeout: Duration) -> DashboardResult<Statistics> {
        let url = self.endpoint(&format!("api/products/stats/{subject}"))?;
        self.get(url, timeout).await
    }

    async fn owned_listings(
        &self,
        subject: SubjectId,
        timeout: Duration,
    ) -> DashboardResult<Vec<ListingSummary>> {
        let url = self.endpoint("api/products")?;
        // Decoded item by item: a malformed listing of another account must
        // not hide this account's listings.
        let listings: Vec<Value> = self.get(url, timeout).await?;
        let total = listings.len();

        let owned: Vec<ListingSummary> = listings
            .into_iter()
            .filter(|raw| owned_by(raw, subject))
            .filter_map(|raw| match serde_json::from_value::<ListingSummary>(raw) {
                Ok(listing) => Some(listing),
                Err(e) => {
                    warn!(subject_id = %subject, error = %e, "Skipping unreadable catalog listing");
                    None
                }
            })
            .collect();

        debug!(subject_id = %subject, total, owned = owned.len(), "Filtered catalog listings");
        Ok(owned)
    }
}

fn owned_by(raw: &Value, subject: SubjectId) -> bool {
    ["sellerId", "userId"]
        .iter()
        .any(|field| raw.get(field).and_then(Value::as_i64) == Some(subject.get()))
}
