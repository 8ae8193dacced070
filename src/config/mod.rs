//! Configuration management for oiwatch
//!
//! Loads from YAML files + environment variables via .env

mod types;

pub use types::*;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;

use crate::types::{Asset, Venue};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub collector: CollectorConfig,
    pub storage: StorageConfig,
    pub analytics: AnalyticsConfig,
    pub logging: LoggingConfig,
    pub dashboard: DashboardConfig,
    /// Explicit venue table. Empty means "use the built-in table for `collector.source_mode`".
    #[serde(default)]
    pub venues: Vec<VenueConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CollectorConfig {
    /// Seconds between cycle starts
    pub interval_secs: u64,
    /// Pause after a failed cycle before resuming
    pub error_cooldown_secs: u64,
    /// Upper bound for every venue request
    pub request_timeout_secs: u64,
    /// Built-in venue table selection
    pub source_mode: SourceMode,
    /// WebDriver server (chromedriver/geckodriver) for page sources that render
    pub webdriver_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// CSV series location
    pub csv_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyticsConfig {
    /// Projection horizons in days
    pub horizons_days: Vec<u32>,
    /// Rows required before any ratio is reported
    pub min_rows: usize,
    /// Polling cadence advertised to presentation clients
    pub refresh_secs: u64,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            horizons_days: vec![1, 7, 30, 90, 365],
            min_rows: 4,
            refresh_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Fallback filter when RUST_LOG is unset
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl LoggingConfig {
    /// Install the global subscriber; RUST_LOG wins over `level`
    pub fn init_tracing(&self) {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&self.level));
        let builder = tracing_subscriber::fmt().with_env_filter(filter);
        if self.json {
            builder.json().init();
        } else {
            builder.init();
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub bind_addr: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Config::builder()
            // Collector defaults
            .set_default("collector.interval_secs", 300)?
            .set_default("collector.error_cooldown_secs", 30)?
            .set_default("collector.request_timeout_secs", 30)?
            .set_default("collector.source_mode", "api")?
            .set_default("collector.webdriver_url", "http://localhost:4444")?
            // Storage defaults
            .set_default("storage.csv_path", "./data/defi_oi_data.csv")?
            // Analytics defaults
            .set_default("analytics.horizons_days", vec![1i64, 7, 30, 90, 365])?
            .set_default("analytics.min_rows", 4)?
            .set_default("analytics.refresh_secs", 60)?
            // Logging defaults
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Dashboard defaults
            .set_default("dashboard.enabled", false)?
            .set_default("dashboard.bind_addr", "127.0.0.1:8787")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (OIWATCH__*)
            .add_source(Environment::with_prefix("OIWATCH").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        app_config.validate()?;

        Ok(app_config)
    }

    /// Effective venue table (explicit table or the built-in one)
    pub fn venue_table(&self) -> Vec<VenueConfig> {
        if self.venues.is_empty() {
            default_venues(self.collector.source_mode)
        } else {
            self.venues.clone()
        }
    }

    /// Validate once at startup so misconfiguration never shows up as failed readings
    pub fn validate(&self) -> Result<()> {
        if self.collector.interval_secs == 0 {
            bail!("collector.interval_secs must be greater than zero");
        }
        if self.collector.request_timeout_secs == 0 {
            bail!("collector.request_timeout_secs must be greater than zero");
        }
        if self.analytics.horizons_days.is_empty() {
            bail!("analytics.horizons_days must list at least one horizon");
        }
        if self.storage.csv_path.trim().is_empty() {
            bail!("storage.csv_path must not be empty");
        }

        let table = self.venue_table();
        let needs_browser = table.iter().any(|v| {
            matches!(
                v.source,
                SourceConfig::Page {
                    renderer: PageRenderer::Webdriver,
                    ..
                }
            )
        });
        if needs_browser && self.collector.webdriver_url.trim().is_empty() {
            bail!("collector.webdriver_url is required by webdriver page sources");
        }

        validate_venue_table(&table)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.collector.interval_secs)
    }

    pub fn error_cooldown(&self) -> Duration {
        Duration::from_secs(self.collector.error_cooldown_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.collector.request_timeout_secs)
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        let table = self.venue_table();
        let venues: Vec<String> = table
            .iter()
            .map(|v| format!("{}:{}", v.venue, v.source.kind()))
            .collect();
        format!(
            "venues={:?} interval={}s timeout={}s csv={} horizons={:?}",
            venues,
            self.collector.interval_secs,
            self.collector.request_timeout_secs,
            self.storage.csv_path,
            self.analytics.horizons_days
        )
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}

/// Every supported venue exactly once, every venue mapping every asset exactly once
pub fn validate_venue_table(table: &[VenueConfig]) -> Result<()> {
    let mut seen_venues = HashSet::new();
    for entry in table {
        if !seen_venues.insert(entry.venue) {
            bail!("venue {} is configured more than once", entry.venue);
        }

        match &entry.source {
            SourceConfig::Api { endpoint, .. } if endpoint.trim().is_empty() => {
                bail!("venue {} has an empty endpoint", entry.venue);
            }
            SourceConfig::Page {
                url_base, label, ..
            } if url_base.trim().is_empty() || label.trim().is_empty() => {
                bail!("venue {} needs both url_base and label", entry.venue);
            }
            _ => {}
        }

        let assets = entry.source.assets();
        let mut seen_assets = HashSet::new();
        for asset in &assets {
            if !seen_assets.insert(*asset) {
                bail!("venue {} maps asset {} more than once", entry.venue, asset);
            }
        }
        for asset in Asset::ALL {
            if !seen_assets.contains(&asset) {
                bail!("venue {} has no mapping for asset {}", entry.venue, asset);
            }
        }
    }

    for venue in Venue::ALL {
        if !seen_venues.contains(&venue) {
            bail!("venue {} is missing from the venue table", venue);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            collector: CollectorConfig {
                interval_secs: 300,
                error_cooldown_secs: 30,
                request_timeout_secs: 30,
                source_mode: SourceMode::Api,
                webdriver_url: "http://localhost:4444".to_string(),
            },
            storage: StorageConfig {
                csv_path: "./data/defi_oi_data.csv".to_string(),
            },
            analytics: AnalyticsConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
                json: false,
            },
            dashboard: DashboardConfig {
                enabled: false,
                bind_addr: "127.0.0.1:8787".to_string(),
            },
            venues: Vec::new(),
        }
    }

    #[test]
    fn built_in_tables_are_valid() {
        validate_venue_table(&default_venues(SourceMode::Api)).unwrap();
        validate_venue_table(&default_venues(SourceMode::Page)).unwrap();
    }

    #[test]
    fn empty_venue_list_falls_back_to_mode_table() {
        let mut cfg = base_config();
        cfg.collector.source_mode = SourceMode::Page;
        let table = cfg.venue_table();
        assert_eq!(table.len(), 2);
        assert!(table.iter().all(|v| v.source.kind() == "page"));
        cfg.validate().unwrap();
    }

    #[test]
    fn missing_asset_mapping_is_rejected() {
        let mut table = default_venues(SourceMode::Api);
        if let SourceConfig::Api { assets, .. } = &mut table[1].source {
            assets.retain(|m| m.asset != Asset::ETH);
        }
        let err = validate_venue_table(&table).unwrap_err().to_string();
        assert!(err.contains("Lighter"), "unexpected error: {}", err);
        assert!(err.contains("ETH"), "unexpected error: {}", err);
    }

    #[test]
    fn duplicate_venue_is_rejected() {
        let mut table = default_venues(SourceMode::Api);
        table.push(table[0].clone());
        assert!(validate_venue_table(&table).is_err());
    }

    #[test]
    fn missing_venue_is_rejected() {
        let mut table = default_venues(SourceMode::Api);
        table.pop();
        assert!(validate_venue_table(&table).is_err());
    }

    #[test]
    fn renderer_defaults_to_plain_http() {
        let yaml = r#"
kind: page
url_base: https://example.com/oi/
label: Open Interest
assets:
  - asset: BTC
    path: btc
"#;
        let source: SourceConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(matches!(
            source,
            SourceConfig::Page {
                renderer: PageRenderer::Http,
                ..
            }
        ));
        assert_eq!(SourceMode::default(), SourceMode::Api);
    }

    #[test]
    fn page_mode_requires_webdriver_url() {
        let mut cfg = base_config();
        cfg.collector.source_mode = SourceMode::Page;
        cfg.collector.webdriver_url = " ".to_string();
        let err = cfg.validate().unwrap_err().to_string();
        assert!(err.contains("webdriver_url"), "unexpected error: {}", err);

        cfg.collector.source_mode = SourceMode::Api;
        cfg.validate().unwrap();
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut cfg = base_config();
        cfg.collector.interval_secs = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn venue_table_parses_from_yaml() {
        let yaml = r#"
- venue: Hyperliquid
  source:
    kind: api
    endpoint: https://api.hyperliquid.xyz/info
    method: POST
    body:
      type: metaAndAssetCtxs
    denomination:
      kind: base_units
      oi_field: openInterest
      price_field: markPx
    assets:
      - asset: BTC
        locator: { by: index, position: 0 }
      - asset: ETH
        locator: { by: index, position: 1 }
- venue: Lighter
  source:
    kind: page
    url_base: https://app.lighter.xyz/trade/
    label: Open Interest
    renderer: webdriver
    assets:
      - asset: BTC
        path: BTC
      - asset: ETH
        path: ETH
"#;
        let table: Vec<VenueConfig> = serde_yaml::from_str(yaml).unwrap();
        validate_venue_table(&table).unwrap();
        assert_eq!(table[0].source, default_venues(SourceMode::Api)[0].source);
        assert_eq!(table[1].source, default_venues(SourceMode::Page)[1].source);
    }

    #[test]
    fn digest_names_every_venue() {
        let digest = base_config().digest();
        assert!(digest.contains("Hyperliquid:api"));
        assert!(digest.contains("Lighter:api"));
    }
}
