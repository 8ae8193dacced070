//! Open-interest source adapters (structured API, page)
//!
//! Every adapter answers `fetch(asset) -> OiValue` and never fails past that
//! boundary: transport, timeout and schema errors become a failed reading.

mod api;
mod page;

pub use api::{extract_oi_usd, ApiSource};
pub use page::{clean_usd_text, extract_labeled_value, html_to_text, PageSource};

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{AppConfig, SourceConfig, VenueConfig};
use crate::types::{Asset, OiValue, Venue};

/// Everything that can go wrong while producing a single reading
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("venue returned HTTP {0}")]
    Status(u16),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("asset {0} not present in payload")]
    MissingAsset(String),

    #[error("field {0} missing from asset entry")]
    MissingField(String),

    #[error("field {0} is not numeric")]
    NotNumeric(String),

    #[error("matched a percentage instead of a value: {0}")]
    PercentageMatch(String),

    #[error("label {0:?} not found in page")]
    LabelNotFound(String),

    #[error("no value found after label {0:?}")]
    ValueNotFound(String),

    #[error("invalid value: {0}")]
    InvalidValue(String),

    #[error("browser session error: {0}")]
    Browser(String),
}

impl FetchError {
    /// Collapse reqwest timeouts into the dedicated variant
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Http(err)
        }
    }
}

/// Trait for open-interest source adapters
#[async_trait]
pub trait OiSource: Send + Sync {
    /// Venue served by this adapter
    fn venue(&self) -> Venue;

    /// Single reading; failures come back as `OiValue::failed()`
    async fn fetch(&self, asset: Asset) -> OiValue;

    /// One reading per requested asset, in request order
    async fn fetch_all(&self, assets: &[Asset]) -> Vec<(Asset, OiValue)> {
        let mut readings = Vec::with_capacity(assets.len());
        for &asset in assets {
            readings.push((asset, self.fetch(asset).await));
        }
        readings
    }
}

/// Turn an adapter result into a reading, logging the failure reason
pub(crate) fn into_reading(venue: Venue, asset: Asset, result: Result<f64, FetchError>) -> OiValue {
    match result {
        Ok(millions) => {
            let reading = OiValue::ok(millions);
            if reading.is_ok() {
                tracing::info!(
                    venue = %venue,
                    asset = %asset,
                    oi_millions = millions,
                    "✅ ${:.2}M", millions
                );
            } else {
                tracing::warn!(venue = %venue, asset = %asset, value = millions, "Rejected non-finite OI value");
            }
            reading
        }
        Err(e) => {
            tracing::warn!(venue = %venue, asset = %asset, error = %e, "OI fetch failed, recording 0.0");
            OiValue::failed()
        }
    }
}

/// Shared HTTP client with the request timeout applied to every call
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("oiwatch/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to create HTTP client")
}

/// Runtime knobs shared by every adapter
#[derive(Debug, Clone)]
pub struct SourceSettings {
    /// Upper bound for one request, or for one browser step when rendering
    pub request_timeout: Duration,
    /// WebDriver endpoint used by rendering page sources
    pub webdriver_url: String,
}

impl SourceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            request_timeout: config.request_timeout(),
            webdriver_url: config.collector.webdriver_url.clone(),
        }
    }
}

/// A configured adapter with the assets it must report each cycle
#[derive(Clone)]
pub struct ConfiguredSource {
    pub source: Arc<dyn OiSource>,
    pub assets: Vec<Asset>,
}

impl ConfiguredSource {
    pub fn new(source: Arc<dyn OiSource>, assets: Vec<Asset>) -> Self {
        Self { source, assets }
    }

    pub fn venue(&self) -> Venue {
        self.source.venue()
    }
}

/// Build one adapter per venue from the static venue table
pub fn build_sources(
    table: &[VenueConfig],
    settings: &SourceSettings,
) -> Result<Vec<ConfiguredSource>> {
    let client = http_client(settings.request_timeout)?;
    let sources = table
        .iter()
        .map(|entry| {
            let assets = entry.source.assets();
            let source: Arc<dyn OiSource> = match &entry.source {
                SourceConfig::Api { .. } => Arc::new(ApiSource::from_config(
                    entry.venue,
                    &entry.source,
                    client.clone(),
                )?),
                SourceConfig::Page { .. } => Arc::new(PageSource::from_config(
                    entry.venue,
                    &entry.source,
                    client.clone(),
                    settings,
                )?),
            };
            Ok(ConfiguredSource::new(source, assets))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(sources)
}
