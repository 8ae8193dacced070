//! Page adapter
//!
//! Loads the venue's trade page for one asset and reads the value printed
//! next to a known label ("Open Interest"). Client-rendered apps go through a
//! WebDriver session so the value exists in the DOM; server-rendered documents
//! use one plain GET. Percentages adjacent to the label mean the wrong field
//! was matched and are rejected.

use anyhow::{bail, Result};
use async_trait::async_trait;
use fantoccini::ClientBuilder;
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;
use std::time::Duration;

use super::{into_reading, FetchError, OiSource, SourceSettings};
use crate::config::{PageRenderer, SourceConfig};
use crate::types::{Asset, OiValue, Venue};

const USD_PER_MILLION: f64 = 1_000_000.0;

/// How far past the label (in chars) a value may start
const LABEL_WINDOW_CHARS: usize = 80;

/// Delay between DOM reads while the app is still hydrating
const RENDER_POLL_INTERVAL: Duration = Duration::from_millis(500);

macro_rules! re {
    ($pat:expr) => {
        LazyLock::new(|| Regex::new($pat).expect("static regex"))
    };
}

static RE_SCRIPT: LazyLock<Regex> = re!(r"(?is)<script\b.*?</script\s*>");
static RE_STYLE: LazyLock<Regex> = re!(r"(?is)<style\b.*?</style\s*>");
static RE_TAG: LazyLock<Regex> = re!(r"(?s)<[^>]*>");
static RE_SPACE: LazyLock<Regex> = re!(r"\s+");
static RE_CANDIDATE: LazyLock<Regex> = re!(r"(\$)?\s?(\d[\d,]*(?:\.\d+)?)(\s?%)?");

enum PageFetcher {
    Http(reqwest::Client),
    Webdriver { endpoint: String, timeout: Duration },
}

pub struct PageSource {
    venue: Venue,
    fetcher: PageFetcher,
    url_base: String,
    label: String,
    paths: Vec<(Asset, String)>,
}

impl PageSource {
    pub fn from_config(
        venue: Venue,
        source: &SourceConfig,
        client: reqwest::Client,
        settings: &SourceSettings,
    ) -> Result<Self> {
        let SourceConfig::Page {
            url_base,
            label,
            renderer,
            assets,
        } = source
        else {
            bail!("venue {} is not configured as a page source", venue);
        };

        let fetcher = match renderer {
            PageRenderer::Http => PageFetcher::Http(client),
            PageRenderer::Webdriver => PageFetcher::Webdriver {
                endpoint: settings.webdriver_url.clone(),
                timeout: settings.request_timeout,
            },
        };

        Ok(Self {
            venue,
            fetcher,
            url_base: url_base.clone(),
            label: label.clone(),
            paths: assets.iter().map(|m| (m.asset, m.path.clone())).collect(),
        })
    }

    fn url_for(&self, asset: Asset) -> Option<String> {
        self.paths
            .iter()
            .find(|(a, _)| *a == asset)
            .map(|(_, path)| format!("{}{}", self.url_base, path))
    }

    async fn scrape(&self, asset: Asset) -> Result<f64, FetchError> {
        let url = self
            .url_for(asset)
            .ok_or_else(|| FetchError::MissingAsset(asset.to_string()))?;
        tracing::debug!(venue = %self.venue, asset = %asset, url = %url, "Scraping page");

        let usd = match &self.fetcher {
            PageFetcher::Http(client) => {
                let html = fetch_document(client, &url).await?;
                extract_labeled_value(&html_to_text(&html), &self.label)?
            }
            PageFetcher::Webdriver { endpoint, timeout } => {
                self.scrape_rendered(endpoint, &url, *timeout).await?
            }
        };
        Ok(usd / USD_PER_MILLION)
    }

    /// One WebDriver session per page; always closed before returning
    async fn scrape_rendered(
        &self,
        endpoint: &str,
        url: &str,
        timeout: Duration,
    ) -> Result<f64, FetchError> {
        let mut builder = ClientBuilder::native();
        builder.capabilities(headless_capabilities());
        let browser = tokio::time::timeout(timeout, builder.connect(endpoint))
            .await
            .map_err(|_| FetchError::Timeout)?
            .map_err(|e| FetchError::Browser(e.to_string()))?;

        let result = tokio::time::timeout(timeout, self.poll_rendered(&browser, url))
            .await
            .unwrap_or(Err(FetchError::Timeout));

        if let Err(e) = browser.close().await {
            tracing::debug!(venue = %self.venue, error = %e, "WebDriver session close failed");
        }
        result
    }

    /// Re-read the DOM until the label has a value next to it
    async fn poll_rendered(
        &self,
        browser: &fantoccini::Client,
        url: &str,
    ) -> Result<f64, FetchError> {
        browser
            .goto(url)
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;

        loop {
            let html = browser
                .source()
                .await
                .map_err(|e| FetchError::Browser(e.to_string()))?;
            match extract_labeled_value(&html_to_text(&html), &self.label) {
                Err(FetchError::LabelNotFound(_)) | Err(FetchError::ValueNotFound(_)) => {
                    tokio::time::sleep(RENDER_POLL_INTERVAL).await;
                }
                other => return other,
            }
        }
    }
}

#[async_trait]
impl OiSource for PageSource {
    fn venue(&self) -> Venue {
        self.venue
    }

    async fn fetch(&self, asset: Asset) -> OiValue {
        into_reading(self.venue, asset, self.scrape(asset).await)
    }
}

async fn fetch_document(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(FetchError::from_reqwest)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    response.text().await.map_err(FetchError::from_reqwest)
}

fn headless_capabilities() -> serde_json::Map<String, serde_json::Value> {
    let mut caps = serde_json::Map::new();
    caps.insert(
        "goog:chromeOptions".to_string(),
        json!({ "args": ["--headless=new", "--disable-gpu", "--no-sandbox"] }),
    );
    caps.insert(
        "moz:firefoxOptions".to_string(),
        json!({ "args": ["-headless"] }),
    );
    caps
}

/// Reduce markup to visible text: tags become spaces, common entities decoded
pub fn html_to_text(html: &str) -> String {
    let stripped = RE_SCRIPT.replace_all(html, " ");
    let stripped = RE_STYLE.replace_all(&stripped, " ");
    let stripped = RE_TAG.replace_all(&stripped, " ");
    let decoded = stripped
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&#36;", "$")
        .replace("&dollar;", "$")
        .replace("&#44;", ",")
        .replace("&amp;", "&");
    RE_SPACE.replace_all(&decoded, " ").trim().to_string()
}

/// USD value of the first number printed after `label`
pub fn extract_labeled_value(text: &str, label: &str) -> Result<f64, FetchError> {
    let label_re = Regex::new(&format!("(?i){}", regex::escape(label.trim())))
        .map_err(|e| FetchError::InvalidValue(e.to_string()))?;
    let found = label_re
        .find(text)
        .ok_or_else(|| FetchError::LabelNotFound(label.to_string()))?;

    let window: String = text[found.end()..].chars().take(LABEL_WINDOW_CHARS).collect();
    let caps = RE_CANDIDATE
        .captures(&window)
        .ok_or_else(|| FetchError::ValueNotFound(label.to_string()))?;

    if caps.get(3).is_some() {
        return Err(FetchError::PercentageMatch(caps[0].to_string()));
    }
    // A dollar amount or nothing; "24h" and friends belong to other fields
    if caps.get(1).is_none() {
        return Err(FetchError::ValueNotFound(label.to_string()));
    }

    let number = &caps[2];
    let rest = &window[caps.get(0).map_or(0, |m| m.end())..];
    match magnitude_suffix(rest) {
        Some(suffix) => clean_usd_text(&format!("{}{}", number, suffix)),
        None if rest.starts_with(char::is_alphabetic) => {
            let glued: String = rest.chars().take_while(|c| c.is_alphanumeric()).collect();
            Err(FetchError::InvalidValue(format!("{}{}", number, glued)))
        }
        None => clean_usd_text(number),
    }
}

/// `K`/`M`/`B` right after a number, optionally one space apart; a following
/// lowercase letter means it starts a word instead ("$5 Mark")
fn magnitude_suffix(rest: &str) -> Option<char> {
    let mut chars = rest.strip_prefix(' ').unwrap_or(rest).chars();
    let suffix = chars.next().filter(|c| matches!(c, 'K' | 'M' | 'B'))?;
    match chars.next() {
        Some(next) if next.is_lowercase() => None,
        _ => Some(suffix),
    }
}

/// Parse "$1,234,567.89" / "1.2B" style text into USD
pub fn clean_usd_text(raw: &str) -> Result<f64, FetchError> {
    let trimmed = raw.trim();
    if trimmed.contains('%') {
        return Err(FetchError::PercentageMatch(trimmed.to_string()));
    }

    let mut cleaned: String = trimmed
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();

    let multiplier = match cleaned.chars().last() {
        Some('K') | Some('k') => Some(1e3),
        Some('M') | Some('m') => Some(1e6),
        Some('B') | Some('b') => Some(1e9),
        _ => None,
    };
    if multiplier.is_some() {
        cleaned.pop();
    }

    let value: f64 = cleaned
        .parse()
        .map_err(|_| FetchError::NotNumeric(trimmed.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(FetchError::InvalidValue(trimmed.to_string()));
    }

    Ok(value * multiplier.unwrap_or(1.0))
}
