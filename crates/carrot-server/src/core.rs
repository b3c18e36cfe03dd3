//! The service core: credential resolution and dashboard reads behind one
//! handle shared by every request.

use std::sync::Arc;
use std::time::Duration;

use carrot_auth::{AuthResult, CredentialCache, CredentialVerifier, JwtService};
use carrot_core::{CacheStats, CacheSweeper, Identity, SubjectId};
use carrot_dashboard::{
    Aggregator, DashboardEvent, DashboardSnapshot, HttpCatalogClient, ListingSummary,
    ProductCatalog,
};
use tokio::sync::broadcast;

use crate::config::AppConfig;

pub struct ServiceCore {
    credentials: Arc<CredentialCache>,
    aggregator: Aggregator,
    listing_timeout: Duration,
    sweep_interval: Duration,
}

impl ServiceCore {
    /// Wires the core from explicit collaborators.
    pub fn new(
        verifier: Arc<dyn CredentialVerifier>,
        catalog: Arc<dyn ProductCatalog>,
        config: &AppConfig,
    ) -> Self {
        Self {
            credentials: Arc::new(CredentialCache::from_config(verifier, &config.auth)),
            aggregator: Aggregator::from_config(catalog, &config.catalog, &config.dashboard),
            listing_timeout: config.catalog.listing_timeout,
            sweep_interval: config.auth.sweep_interval,
        }
    }

    /// Wires the core with the JWT verifier and the HTTP catalog client.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let verifier = Arc::new(JwtService::from_config(&config.auth));
        let catalog = Arc::new(HttpCatalogClient::from_config(&config.catalog)?);
        Ok(Self::new(verifier, catalog, config))
    }

    pub fn resolve_identity(&self, raw: &str) -> AuthResult<Identity> {
        self.credentials.resolve(raw)
    }

    /// Drops every cached verification for `subject`. Call after any
    /// mutation of the account (nickname or password change).
    pub fn invalidate_credential(&self, subject: SubjectId) -> usize {
        self.credentials.invalidate_subject(subject)
    }

    pub fn get_dashboard(&self, subject: SubjectId) -> DashboardSnapshot {
        self.aggregator.snapshot(subject)
    }

    pub fn get_cached_dashboard(&self, subject: SubjectId) -> Option<DashboardSnapshot> {
        self.aggregator.cached_snapshot(subject)
    }

    pub fn invalidate_dashboard(&self, subject: SubjectId) {
        self.aggregator.invalidate(subject);
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.credentials.stats()
    }

    pub fn dashboard_stats(&self) -> CacheStats {
        self.aggregator.snapshots().stats()
    }

    pub fn refreshes_in_flight(&self) -> usize {
        self.aggregator.in_flight()
    }

    /// Owned listings in catalog order; empty when the catalog is unavailable.
    pub async fn owned_listings(&self, subject: SubjectId) -> Vec<ListingSummary> {
        self.aggregator
            .fetchers()
            .owned_listings(subject, self.listing_timeout)
            .await
            .into_inner()
    }

    pub fn subscribe_dashboard_events(&self) -> broadcast::Receiver<DashboardEvent> {
        self.aggregator.subscribe()
    }

    /// Sweeper over both caches, not yet started.
    pub fn sweeper(&self) -> CacheSweeper {
        CacheSweeper::new(self.sweep_interval)
            .with_target(self.credentials.clone())
            .with_target(self.aggregator.snapshots().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carrot_auth::{CredentialClaims, SigningAlgorithm};
    use carrot_dashboard::{DashboardResult, Statistics};

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    struct FixedCatalog;

    #[async_trait::async_trait]
    impl ProductCatalog for FixedCatalog {
        async fn statistics(&self, _: SubjectId, _: Duration) -> DashboardResult<Statistics> {
            Ok(Statistics {
                registered_count: 3,
                ..Statistics::default()
            })
        }

        async fn owned_listings(&self, _: SubjectId, _: Duration) -> DashboardResult<Vec<ListingSummary>> {
            Ok(Vec::new())
        }
    }

    fn core() -> (JwtService, ServiceCore) {
        let mut config = AppConfig::default();
        config.auth.secret = SECRET.into();
        let issuer = JwtService::from_secret(SECRET.as_bytes(), SigningAlgorithm::HS256);
        let core = ServiceCore::new(
            Arc::new(JwtService::from_config(&config.auth)),
            Arc::new(FixedCatalog),
            &config,
        );
        (issuer, core)
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_then_stats() {
        let (issuer, core) = core();
        let token = issuer
            .encode(&CredentialClaims::new("carrot@example.com", 42, "carrot"))
            .unwrap();

        let identity = core.resolve_identity(&format!("Bearer {token}")).unwrap();
        assert_eq!(identity.subject_id, SubjectId::new(42));

        let stats = core.cache_stats();
        assert_eq!((stats.total, stats.active, stats.expired), (1, 1, 0));

        assert_eq!(core.invalidate_credential(SubjectId::new(42)), 1);
        assert_eq!(core.cache_stats().total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dashboard_placeholder_then_cached() {
        let (_, core) = core();
        let mut events = core.subscribe_dashboard_events();

        assert!(core.get_dashboard(SubjectId::new(42)).loading);
        assert!(matches!(events.recv().await.unwrap(), DashboardEvent::Refreshed { .. }));

        let cached = core.get_cached_dashboard(SubjectId::new(42)).unwrap();
        assert_eq!(cached.stats.registered_count, 3);

        core.invalidate_dashboard(SubjectId::new(42));
        assert!(core.get_cached_dashboard(SubjectId::new(42)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_covers_both_caches() {
        let (issuer, core) = core();
        let token = issuer
            .encode(&CredentialClaims::new("carrot@example.com", 42, "carrot"))
            .unwrap();
        core.resolve_identity(&token).unwrap();
        let mut events = core.subscribe_dashboard_events();
        core.get_dashboard(SubjectId::new(42));
        events.recv().await.unwrap();

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(core.sweeper().sweep_once(), 2);
    }
}
