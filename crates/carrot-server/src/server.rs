use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post},
};
use carrot_auth::{CredentialVerifier, JwtService};
use carrot_dashboard::{HttpCatalogClient, ProductCatalog};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::core::ServiceCore;
use crate::handlers::{self, AppState};
use crate::observability;

pub fn build_app(state: AppState) -> Router {
    let users = Router::new()
        .route("/health", get(handlers::health))
        .route("/profile", get(handlers::profile))
        .route("/dashboard", get(handlers::dashboard))
        .route("/dashboard/refresh", get(handlers::dashboard_refresh))
        .route("/dashboard/cache", delete(handlers::invalidate_dashboard))
        .route("/products/mine", get(handlers::my_products))
        .route("/credentials/cache", delete(handlers::invalidate_credentials));

    let events = Router::new()
        .route("/product/registered", post(handlers::product_registered))
        .route("/product/purchased", post(handlers::product_purchased))
        .route(
            "/product/status-changed",
            post(handlers::product_status_changed),
        )
        .route("/dashboard/refresh", post(handlers::dashboard_refresh_event));

    Router::new()
        .nest("/api/users", users)
        .nest("/api/events", events)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub struct CarrotServer {
    addr: SocketAddr,
    config: AppConfig,
    core: Arc<ServiceCore>,
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    verifier: Option<Arc<dyn CredentialVerifier>>,
    catalog: Option<Arc<dyn ProductCatalog>>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            verifier: None,
            catalog: None,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Replaces the JWT verifier built from `auth`.
    pub fn with_verifier(mut self, verifier: Arc<dyn CredentialVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Replaces the HTTP catalog client built from `catalog`.
    pub fn with_catalog(mut self, catalog: Arc<dyn ProductCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn build(self) -> anyhow::Result<CarrotServer> {
        self.config.validate().map_err(anyhow::Error::msg)?;

        let core = match (self.verifier, self.catalog) {
            (None, None) => ServiceCore::from_config(&self.config)?,
            (verifier, catalog) => {
                let verifier: Arc<dyn CredentialVerifier> = match verifier {
                    Some(verifier) => verifier,
                    None => Arc::new(JwtService::from_config(&self.config.auth)),
                };
                let catalog: Arc<dyn ProductCatalog> = match catalog {
                    Some(catalog) => catalog,
                    None => Arc::new(HttpCatalogClient::from_config(&self.config.catalog)?),
                };
                ServiceCore::new(verifier, catalog, &self.config)
            }
        };

        Ok(CarrotServer {
            addr: self.addr,
            config: self.config,
            core: Arc::new(core),
        })
    }
}

impl CarrotServer {
    pub fn core(&self) -> &Arc<ServiceCore> {
        &self.core
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener, shutdown_signal()).await
    }

    /// Serves on `listener` until `shutdown` resolves, then stops the cache
    /// sweeper within the configured grace period.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sweeper = self.core.sweeper().start();
        let event_log = observability::spawn_dashboard_event_log(&self.core);

        let app = build_app(AppState::new(self.core.clone()));
        tracing::info!("listening on {}", listener.local_addr()?);
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await;

        event_log.abort();
        let grace = self.config.shutdown_grace();
        if !sweeper.shutdown(grace).await {
            tracing::warn!(grace_ms = grace.as_millis() as u64, "Background tasks forced to stop");
        }

        served?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
