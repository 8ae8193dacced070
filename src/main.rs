//! oiwatch collector
//!
//! Polls Hyperliquid and Lighter for BTC/ETH open interest on a fixed
//! interval and appends every cycle to the CSV series until Ctrl-C.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

use oiwatch::collector::Collector;
use oiwatch::config::AppConfig;
use oiwatch::persistence::{CsvStore, OiSink};
use oiwatch::sources::{build_sources, SourceSettings};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    config.logging.init_tracing();

    info!("🚀 Starting oiwatch v{}", env!("CARGO_PKG_VERSION"));
    info!(config = %config, "Configuration loaded");

    let store = Arc::new(CsvStore::new(&config.storage.csv_path));
    if let Err(e) = store.init() {
        error!(path = %config.storage.csv_path, error = %e, "❌ Failed to initialize CSV store");
        return Err(e);
    }

    let sources = build_sources(&config.venue_table(), &SourceSettings::from_config(&config))?;
    let collector = Collector::from_config(&config, sources, store.clone());

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("🛑 Ctrl-C received, shutting down");
                let _ = stop_tx.send(true);
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for Ctrl-C");
                // Dropping the sender would stop the collector
                std::future::pending::<()>().await;
            }
        }
    });

    #[cfg(feature = "dashboard")]
    let dashboard = if config.dashboard.enabled {
        let state = Arc::new(oiwatch::dashboard::DashboardState::new(
            &config.storage.csv_path,
            config.analytics.clone(),
        ));
        let bind_addr = config.dashboard.bind_addr.clone();
        let shutdown = stop_rx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = oiwatch::dashboard::start_server(state, &bind_addr, shutdown).await {
                error!(error = %e, "❌ Dashboard server failed");
            }
        }))
    } else {
        None
    };

    #[cfg(not(feature = "dashboard"))]
    {
        if config.dashboard.enabled {
            tracing::warn!("dashboard.enabled is set but this build has no `dashboard` feature");
        }
    }

    collector.run(stop_rx).await?;

    #[cfg(feature = "dashboard")]
    {
        if let Some(handle) = dashboard {
            let _ = handle.await;
        }
    }

    info!("👋 oiwatch stopped");
    Ok(())
}
