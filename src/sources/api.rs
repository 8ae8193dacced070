//! Structured-API adapter
//!
//! One request per venue per cycle; every asset is read out of the same
//! payload by index (Hyperliquid `metaAndAssetCtxs`) or by symbol (Lighter
//! exchange stats).

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use super::{into_reading, FetchError, OiSource};
use crate::config::{AssetLocator, Denomination, HttpMethod, SourceConfig};
use crate::types::{Asset, OiValue, Venue};

const USD_PER_MILLION: f64 = 1_000_000.0;

pub struct ApiSource {
    venue: Venue,
    client: reqwest::Client,
    endpoint: String,
    method: HttpMethod,
    body: Option<Value>,
    denomination: Denomination,
    locators: Vec<(Asset, AssetLocator)>,
}

impl ApiSource {
    pub fn from_config(venue: Venue, source: &SourceConfig, client: reqwest::Client) -> Result<Self> {
        let SourceConfig::Api {
            endpoint,
            method,
            body,
            denomination,
            assets,
        } = source
        else {
            bail!("venue {} is not configured as an API source", venue);
        };

        Ok(Self {
            venue,
            client,
            endpoint: endpoint.clone(),
            method: *method,
            body: body.clone(),
            denomination: denomination.clone(),
            locators: assets
                .iter()
                .map(|m| (m.asset, m.locator.clone()))
                .collect(),
        })
    }

    async fn request_payload(&self) -> Result<Value, FetchError> {
        let request = match self.method {
            HttpMethod::Get => self.client.get(&self.endpoint),
            HttpMethod::Post => {
                let request = self.client.post(&self.endpoint);
                match &self.body {
                    Some(body) => request.json(body),
                    None => request,
                }
            }
        };

        let response = request.send().await.map_err(FetchError::from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let text = response.text().await.map_err(FetchError::from_reqwest)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// OI in USD millions for one asset of an already fetched payload
    fn read_asset(&self, payload: &Value, asset: Asset) -> Result<f64, FetchError> {
        let locator = self
            .locators
            .iter()
            .find(|(a, _)| *a == asset)
            .map(|(_, l)| l)
            .ok_or_else(|| FetchError::MissingAsset(asset.to_string()))?;

        let usd = extract_oi_usd(payload, locator, &self.denomination)?;
        Ok(usd / USD_PER_MILLION)
    }
}

#[async_trait]
impl OiSource for ApiSource {
    fn venue(&self) -> Venue {
        self.venue
    }

    async fn fetch(&self, asset: Asset) -> OiValue {
        let result = match self.request_payload().await {
            Ok(payload) => self.read_asset(&payload, asset),
            Err(e) => Err(e),
        };
        into_reading(self.venue, asset, result)
    }

    async fn fetch_all(&self, assets: &[Asset]) -> Vec<(Asset, OiValue)> {
        match self.request_payload().await {
            Ok(payload) => assets
                .iter()
                .map(|&asset| {
                    (
                        asset,
                        into_reading(self.venue, asset, self.read_asset(&payload, asset)),
                    )
                })
                .collect(),
            Err(e) => {
                tracing::warn!(
                    venue = %self.venue,
                    endpoint = %self.endpoint,
                    error = %e,
                    "Payload fetch failed, recording 0.0 for every asset"
                );
                assets.iter().map(|&a| (a, OiValue::failed())).collect()
            }
        }
    }
}

/// OI in USD for the entry selected by `locator`
pub fn extract_oi_usd(
    payload: &Value,
    locator: &AssetLocator,
    denomination: &Denomination,
) -> Result<f64, FetchError> {
    let entry = locate_entry(payload, locator)?;

    let usd = match denomination {
        Denomination::UsdNotional { oi_field } => numeric_field(entry, oi_field)?,
        Denomination::BaseUnits {
            oi_field,
            price_field,
        } => {
            let quantity = numeric_field(entry, oi_field)?;
            let mark = numeric_field(entry, price_field)?;
            if mark <= 0.0 {
                return Err(FetchError::InvalidValue(format!(
                    "{} must be positive, got {}",
                    price_field, mark
                )));
            }
            quantity * mark
        }
    };

    if !usd.is_finite() || usd < 0.0 {
        return Err(FetchError::InvalidValue(format!("open interest {}", usd)));
    }
    Ok(usd)
}

fn locate_entry<'a>(payload: &'a Value, locator: &AssetLocator) -> Result<&'a Value, FetchError> {
    match locator {
        AssetLocator::Index { position } => payload
            .get(1)
            .and_then(Value::as_array)
            .and_then(|contexts| contexts.get(*position))
            .ok_or_else(|| FetchError::MissingAsset(format!("index {}", position))),
        AssetLocator::Symbol { symbol } => {
            let symbol = symbol.to_uppercase();
            let found = match payload {
                Value::Array(markets) => find_market(markets, &symbol),
                Value::Object(map) => map.get(&format!("{}-PERP", symbol)).or_else(|| {
                    map.values()
                        .filter_map(Value::as_array)
                        .find_map(|markets| find_market(markets, &symbol))
                }),
                _ => None,
            };
            found.ok_or(FetchError::MissingAsset(symbol))
        }
    }
}

/// Exact symbol match first, then the first symbol containing it
fn find_market<'a>(markets: &'a [Value], symbol: &str) -> Option<&'a Value> {
    let symbol_of = |m: &Value| {
        m.get("symbol")
            .and_then(Value::as_str)
            .map(|s| s.to_uppercase())
    };
    markets
        .iter()
        .find(|m| symbol_of(m).as_deref() == Some(symbol))
        .or_else(|| {
            markets
                .iter()
                .find(|m| symbol_of(m).map(|s| s.contains(symbol)).unwrap_or(false))
        })
}

/// Venues send numbers either as JSON numbers or numeric strings
fn numeric_field(entry: &Value, field: &str) -> Result<f64, FetchError> {
    let raw = entry
        .get(field)
        .ok_or_else(|| FetchError::MissingField(field.to_string()))?;
    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.ok_or_else(|| FetchError::NotNumeric(field.to_string()))
}
