//! Dashboard Module
//!
//! Provides a small HTTP API for the local ratio UI.
//! Only compiled when the `dashboard` feature is enabled.

mod api;
mod types;

pub use api::create_router;
pub use types::*;

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

use crate::config::AnalyticsConfig;

/// Shared, read-only state for the dashboard handlers
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub store_path: PathBuf,
    pub analytics: AnalyticsConfig,
}

impl DashboardState {
    pub fn new(store_path: impl Into<PathBuf>, analytics: AnalyticsConfig) -> Self {
        Self {
            store_path: store_path.into(),
            analytics,
        }
    }
}

/// Start the dashboard server; returns once `shutdown` flips to true
pub async fn start_server(
    state: Arc<DashboardState>,
    bind_addr: &str,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!("🖥️ Dashboard API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await?;

    Ok(())
}
