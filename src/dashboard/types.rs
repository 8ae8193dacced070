//! Dashboard API Types
//!
//! DTOs returned by the local polling UI endpoints.

use serde::{Deserialize, Serialize};

use crate::persistence::TIMESTAMP_FORMAT;
use crate::types::CanonicalRecord;

/// Raw series row as shown in the "latest records" table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordResponse {
    pub timestamp: String,
    pub platform: String,
    pub asset: String,
    pub oi_usd_millions: f64,
}

impl From<&CanonicalRecord> for RecordResponse {
    fn from(record: &CanonicalRecord) -> Self {
        Self {
            timestamp: record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            platform: record.venue.to_string(),
            asset: record.asset.to_string(),
            oi_usd_millions: record.oi_usd_millions,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub store_path: String,
    pub store_exists: bool,
    pub rows: usize,
    pub last_record_at: Option<String>,
    /// How often clients should poll /api/ratio
    pub refresh_secs: u64,
}

/// Generic API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    pub timestamp: i64,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}
