//! CSV Persistence Module
//!
//! Append-only storage of the canonical OI series. Each cycle's batch is
//! encoded in memory and written with a single append so readers never see a
//! half-written batch.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::types::{Asset, CanonicalRecord, Venue};

/// Column names of the persisted series, in order
pub const CSV_HEADERS: [&str; 4] = [
    "Timestamp (UTC)",
    "Platform",
    "Asset",
    "Open Interest (Millions USD)",
];

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One CSV row as stored on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OiRow {
    #[serde(rename = "Timestamp (UTC)")]
    pub timestamp: String,
    #[serde(rename = "Platform")]
    pub platform: String,
    #[serde(rename = "Asset")]
    pub asset: String,
    #[serde(rename = "Open Interest (Millions USD)")]
    pub oi_usd_millions: f64,
}

impl From<&CanonicalRecord> for OiRow {
    fn from(record: &CanonicalRecord) -> Self {
        Self {
            timestamp: record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            platform: record.venue.to_string(),
            asset: record.asset.to_string(),
            oi_usd_millions: record.oi_usd_millions,
        }
    }
}

impl TryFrom<OiRow> for CanonicalRecord {
    type Error = anyhow::Error;

    fn try_from(row: OiRow) -> Result<Self> {
        let timestamp = parse_timestamp(&row.timestamp)?;
        let venue = Venue::from_name(&row.platform)
            .ok_or_else(|| anyhow!("unknown platform {:?}", row.platform))?;
        let asset =
            Asset::from_str(&row.asset).ok_or_else(|| anyhow!("unknown asset {:?}", row.asset))?;
        if !row.oi_usd_millions.is_finite() || row.oi_usd_millions < 0.0 {
            return Err(anyhow!("invalid open interest {}", row.oi_usd_millions));
        }

        Ok(CanonicalRecord {
            timestamp,
            venue,
            asset,
            oi_usd_millions: row.oi_usd_millions,
        })
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| naive.and_utc())
        .with_context(|| format!("invalid timestamp {:?}", raw))
}

/// Storage seam used by the collector
#[cfg_attr(test, mockall::automock)]
pub trait OiSink: Send + Sync {
    /// Create the backing store with its header if absent; no-op otherwise
    fn init(&self) -> Result<()>;

    /// Append one cycle's batch as a single write
    fn append(&self, records: &[CanonicalRecord]) -> Result<()>;
}

/// CSV-backed OI series
#[derive(Debug)]
pub struct CsvStore {
    path: PathBuf,
    append_lock: Mutex<()>,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            append_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full series in insertion order
    pub fn load(&self) -> Result<Vec<CanonicalRecord>> {
        load_series(&self.path)
    }

    fn has_data(&self) -> bool {
        fs::metadata(&self.path)
            .map(|m| m.len() > 0)
            .unwrap_or(false)
    }

    fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        file.write_all(bytes)
            .with_context(|| format!("Failed to append to {}", self.path.display()))?;
        file.flush().context("Failed to flush CSV file")?;
        Ok(())
    }
}

impl OiSink for CsvStore {
    fn init(&self) -> Result<()> {
        let _guard = self
            .append_lock
            .lock()
            .map_err(|_| anyhow!("CSV append lock poisoned"))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).context("Failed to create data directory")?;
            }
        }

        if self.has_data() {
            debug!(path = %self.path.display(), "CSV file already initialized");
            return Ok(());
        }

        self.write_bytes(&encode_rows(&[], true)?)?;
        info!(path = %self.path.display(), "Created new CSV file");
        Ok(())
    }

    fn append(&self, records: &[CanonicalRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let _guard = self
            .append_lock
            .lock()
            .map_err(|_| anyhow!("CSV append lock poisoned"))?;

        // A file removed under us gets its header back in the same write
        let bytes = encode_rows(records, !self.has_data())?;
        self.write_bytes(&bytes)?;

        debug!(path = %self.path.display(), rows = records.len(), "Appended OI batch");
        Ok(())
    }
}

fn encode_rows(records: &[CanonicalRecord], with_header: bool) -> Result<Vec<u8>> {
    let mut writer = WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    if with_header {
        writer
            .write_record(CSV_HEADERS)
            .context("Failed to write CSV header")?;
    }
    for record in records {
        writer
            .serialize(OiRow::from(record))
            .context("Failed to write OI record")?;
    }

    writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to finish CSV buffer: {}", e.error()))
}

/// Read the series at `path` in file order.
///
/// A missing or empty file is an empty series. A trailing line without a
/// newline belongs to an append still in progress and is ignored. Rows that
/// fail to parse are skipped with a warning.
pub fn load_series(path: &Path) -> Result<Vec<CanonicalRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let complete = match bytes.iter().rposition(|&b| b == b'\n') {
        Some(last_newline) => &bytes[..=last_newline],
        None => &bytes[..0],
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(complete);

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for (line, result) in reader.deserialize::<OiRow>().enumerate() {
        let parsed = result
            .map_err(anyhow::Error::from)
            .and_then(CanonicalRecord::try_from);
        match parsed {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                warn!(path = %path.display(), row = line + 1, error = %e, "Skipping malformed OI row");
            }
        }
    }

    if skipped > 0 {
        warn!(path = %path.display(), skipped, loaded = records.len(), "Series loaded with skipped rows");
    }

    Ok(records)
}
