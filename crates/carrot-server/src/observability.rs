// Tracing initialization with a reloadable log level.
use std::sync::OnceLock;

use carrot_dashboard::DashboardEvent;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

use crate::core::ServiceCore;

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

pub fn init_tracing() {
    init_tracing_with_level("info");
}

pub fn init_tracing_with_level(level: &str) {
    // Prefer RUST_LOG from env, otherwise use provided level string.
    let base_filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let (reload_layer, handle) = reload::Layer::new(base_filter);
    let _ = LOG_RELOAD_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer())
        .try_init();
}

/// Apply a new logging level at runtime if reload handle is configured.
///
/// `RUST_LOG` keeps precedence over the configured level.
pub fn apply_logging_level(level: &str) {
    if std::env::var_os("RUST_LOG").is_some() {
        return;
    }
    if let Some(handle) = LOG_RELOAD_HANDLE.get() {
        let _ = handle.modify(|f| {
            *f = EnvFilter::new(level);
        });
    }
}

pub fn shutdown_tracing() {
    tracing::info!("Tracing shut down");
}

/// Logs dashboard refresh lifecycle events until the broadcaster closes.
pub fn spawn_dashboard_event_log(core: &ServiceCore) -> JoinHandle<()> {
    let mut events = core.subscribe_dashboard_events();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(DashboardEvent::Refreshed {
                    subject_id,
                    elapsed_ms,
                }) => {
                    tracing::debug!(subject_id = %subject_id, elapsed_ms, "Dashboard refreshed");
                }
                Ok(DashboardEvent::RefreshFailed { subject_id, reason }) => {
                    tracing::warn!(subject_id = %subject_id, %reason, "Dashboard refresh failed");
                }
                Ok(DashboardEvent::Invalidated { subject_id }) => {
                    tracing::debug!(subject_id = %subject_id, "Dashboard invalidated");
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Dashboard event log lagging");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
