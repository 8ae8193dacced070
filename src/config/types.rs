//! Venue table types
//!
//! Static description of how each venue is fetched: endpoint, request shape,
//! and where every asset lives in the response.

use serde::{Deserialize, Serialize};

use crate::types::{Asset, Venue};

/// Which built-in venue table to use when none is configured
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Structured JSON APIs
    #[default]
    Api,
    /// Rendered trade pages, label-based extraction
    Page,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

/// How a venue denominates open interest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Denomination {
    /// Field already holds USD notional
    UsdNotional { oi_field: String },
    /// Field holds contracts in the base asset; USD = quantity x mark price
    BaseUnits {
        oi_field: String,
        price_field: String,
    },
}

/// How a page source obtains the document it reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageRenderer {
    /// Plain GET; only for server-rendered documents
    #[default]
    Http,
    /// Load through a WebDriver-controlled headless browser so client-side
    /// rendering has run before extraction
    Webdriver,
}

/// Where an asset sits inside a structured payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum AssetLocator {
    /// Position inside the asset-context array (`payload[1][position]`)
    Index { position: usize },
    /// Market symbol, matched against list entries or `{SYMBOL}-PERP` keys
    Symbol { symbol: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiAssetMapping {
    pub asset: Asset,
    pub locator: AssetLocator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageAssetMapping {
    pub asset: Asset,
    /// Appended to `url_base` (e.g., "BTC")
    pub path: String,
}

/// Per-venue source description, selecting the adapter variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Api {
        endpoint: String,
        method: HttpMethod,
        #[serde(default)]
        body: Option<serde_json::Value>,
        denomination: Denomination,
        assets: Vec<ApiAssetMapping>,
    },
    Page {
        url_base: String,
        label: String,
        #[serde(default)]
        renderer: PageRenderer,
        assets: Vec<PageAssetMapping>,
    },
}

impl SourceConfig {
    /// Assets this source is configured to produce, in configuration order
    pub fn assets(&self) -> Vec<Asset> {
        match self {
            SourceConfig::Api { assets, .. } => assets.iter().map(|m| m.asset).collect(),
            SourceConfig::Page { assets, .. } => assets.iter().map(|m| m.asset).collect(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::Api { .. } => "api",
            SourceConfig::Page { .. } => "page",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VenueConfig {
    pub venue: Venue,
    pub source: SourceConfig,
}

/// Built-in venue table for a source mode
pub fn default_venues(mode: SourceMode) -> Vec<VenueConfig> {
    match mode {
        SourceMode::Api => vec![
            VenueConfig {
                venue: Venue::Hyperliquid,
                source: SourceConfig::Api {
                    endpoint: "https://api.hyperliquid.xyz/info".to_string(),
                    method: HttpMethod::Post,
                    body: Some(serde_json::json!({ "type": "metaAndAssetCtxs" })),
                    denomination: Denomination::BaseUnits {
                        oi_field: "openInterest".to_string(),
                        price_field: "markPx".to_string(),
                    },
                    assets: vec![
                        ApiAssetMapping {
                            asset: Asset::BTC,
                            locator: AssetLocator::Index { position: 0 },
                        },
                        ApiAssetMapping {
                            asset: Asset::ETH,
                            locator: AssetLocator::Index { position: 1 },
                        },
                    ],
                },
            },
            VenueConfig {
                venue: Venue::Lighter,
                source: SourceConfig::Api {
                    endpoint: "https://mainnet.zklighter.elliot.ai/api/v1/exchangestats"
                        .to_string(),
                    method: HttpMethod::Get,
                    body: None,
                    denomination: Denomination::UsdNotional {
                        oi_field: "openInterest".to_string(),
                    },
                    assets: Asset::ALL
                        .iter()
                        .map(|&asset| ApiAssetMapping {
                            asset,
                            locator: AssetLocator::Symbol {
                                symbol: asset.symbol().to_string(),
                            },
                        })
                        .collect(),
                },
            },
        ],
        SourceMode::Page => vec![
            VenueConfig {
                venue: Venue::Hyperliquid,
                source: SourceConfig::Page {
                    url_base: "https://app.hyperliquid.xyz/trade/".to_string(),
                    label: "Open Interest".to_string(),
                    renderer: PageRenderer::Webdriver,
                    assets: page_paths(),
                },
            },
            VenueConfig {
                venue: Venue::Lighter,
                source: SourceConfig::Page {
                    url_base: "https://app.lighter.xyz/trade/".to_string(),
                    label: "Open Interest".to_string(),
                    renderer: PageRenderer::Webdriver,
                    assets: page_paths(),
                },
            },
        ],
    }
}

fn page_paths() -> Vec<PageAssetMapping> {
    Asset::ALL
        .iter()
        .map(|&asset| PageAssetMapping {
            asset,
            path: asset.symbol().to_string(),
        })
        .collect()
}
