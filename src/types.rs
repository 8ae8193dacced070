//! Core types used throughout oiwatch
//!
//! Defines venues, assets, adapter readings and the canonical OI record.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported derivatives venues
///
/// `Hyperliquid` is venue A (ratio denominator), `Lighter` is venue B
/// (ratio numerator).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Venue {
    Hyperliquid,
    Lighter,
}

impl Venue {
    pub const ALL: [Venue; 2] = [Venue::Hyperliquid, Venue::Lighter];

    /// Parse from a persisted platform name
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "hyperliquid" => Some(Venue::Hyperliquid),
            "lighter" => Some(Venue::Lighter),
            _ => None,
        }
    }
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Venue::Hyperliquid => write!(f, "Hyperliquid"),
            Venue::Lighter => write!(f, "Lighter"),
        }
    }
}

/// Supported assets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Asset {
    BTC,
    ETH,
}

impl Asset {
    pub const ALL: [Asset; 2] = [Asset::BTC, Asset::ETH];

    /// Ticker symbol as venues list it (e.g., "BTC")
    pub fn symbol(&self) -> &'static str {
        match self {
            Asset::BTC => "BTC",
            Asset::ETH => "ETH",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "BTC" => Some(Asset::BTC),
            "ETH" => Some(Asset::ETH),
            _ => None,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Outcome of a single adapter reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FetchStatus {
    Ok,
    Failed,
}

/// Best-effort OI reading produced by a source adapter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OiValue {
    /// Open interest in millions of USD. Always 0.0 when `status` is `Failed`.
    pub value_millions: f64,
    pub status: FetchStatus,
}

impl OiValue {
    /// A successful reading. Non-finite or negative values are demoted to a failure.
    pub fn ok(value_millions: f64) -> Self {
        if value_millions.is_finite() && value_millions >= 0.0 {
            Self {
                value_millions,
                status: FetchStatus::Ok,
            }
        } else {
            Self::failed()
        }
    }

    pub fn failed() -> Self {
        Self {
            value_millions: 0.0,
            status: FetchStatus::Failed,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == FetchStatus::Ok
    }
}

/// One OI observation as persisted in the series
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    /// UTC, whole seconds, shared by every record of a cycle
    pub timestamp: DateTime<Utc>,
    pub venue: Venue,
    pub asset: Asset,
    /// 0.0 means the reading could not be determined this cycle
    pub oi_usd_millions: f64,
}

impl CanonicalRecord {
    pub fn new(timestamp: DateTime<Utc>, venue: Venue, asset: Asset, reading: OiValue) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(0),
            venue,
            asset,
            oi_usd_millions: reading.value_millions,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.oi_usd_millions == 0.0
    }
}

/// Current UTC time truncated to whole seconds
pub fn cycle_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn failed_reading_carries_zero() {
        let v = OiValue::failed();
        assert_eq!(v.value_millions, 0.0);
        assert!(!v.is_ok());
    }

    #[test]
    fn invalid_numbers_are_demoted_to_failure() {
        assert!(!OiValue::ok(f64::NAN).is_ok());
        assert!(!OiValue::ok(f64::INFINITY).is_ok());
        assert!(!OiValue::ok(-3.0).is_ok());
        assert!(OiValue::ok(0.0).is_ok());
        assert!(OiValue::ok(1_234.5).is_ok());
    }

    #[test]
    fn record_timestamp_is_second_precision() {
        let ts = Utc.timestamp_opt(1_700_000_000, 987_000_000).unwrap();
        let record = CanonicalRecord::new(ts, Venue::Lighter, Asset::ETH, OiValue::ok(12.0));
        assert_eq!(record.timestamp.timestamp_subsec_nanos(), 0);
        assert_eq!(record.timestamp.timestamp(), 1_700_000_000);
    }

    #[test]
    fn names_round_trip() {
        for venue in Venue::ALL {
            assert_eq!(Venue::from_name(&venue.to_string()), Some(venue));
        }
        for asset in Asset::ALL {
            assert_eq!(Asset::from_str(&asset.to_string()), Some(asset));
        }
        assert_eq!(Venue::from_name("Binance"), None);
    }
}
