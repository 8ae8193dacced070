//! Ratio/Trend Engine
//!
//! Read-only analysis of the persisted OI series:
//! pivot by timestamp, forward-fill failed readings, sum per venue, take the
//! Lighter/Hyperliquid ratio, fit a linear trend over elapsed days and
//! extrapolate it to fixed horizons.
//!
//! The engine keeps no state between calls and only ever reads complete
//! appends, so it can run while the collector is writing.

mod ratio;
mod trend;

pub use ratio::{
    forward_fill, pivot, ratio_series, safe_ratio, PivotTable, RatioPoint, VENUE_A, VENUE_B,
};
pub use trend::{elapsed_days, fit_trend, project, Projection, TrendModel};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::AnalyticsConfig;
use crate::persistence::load_series;
use crate::types::CanonicalRecord;

/// Everything a presentation layer needs for one refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    /// Row at the most recent timestamp
    pub latest: RatioPoint,
    pub series: Vec<RatioPoint>,
    pub trend: TrendModel,
    /// Empty when the trend is degenerate
    pub projections: Vec<Projection>,
}

impl AnalyticsSnapshot {
    /// Most recent point whose ratio is defined
    pub fn latest_defined(&self) -> Option<&RatioPoint> {
        self.series.iter().rev().find(|p| p.ratio.is_some())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalyticsView {
    NotEnoughData { rows: usize, required: usize },
    Ready(AnalyticsSnapshot),
}

impl AnalyticsView {
    pub fn is_ready(&self) -> bool {
        matches!(self, AnalyticsView::Ready(_))
    }
}

/// Analyze an in-memory series
pub fn analyze(records: &[CanonicalRecord], config: &AnalyticsConfig) -> AnalyticsView {
    let rows = records.len();
    if rows < config.min_rows {
        return AnalyticsView::NotEnoughData {
            rows,
            required: config.min_rows,
        };
    }

    let series = ratio_series(&pivot(records));
    let Some(latest) = series.last().cloned() else {
        return AnalyticsView::NotEnoughData {
            rows,
            required: config.min_rows.max(1),
        };
    };

    let trend = fit_trend(&series);
    let projections = project(&trend, latest.timestamp, &config.horizons_days);
    tracing::debug!(
        rows,
        points = series.len(),
        trend_points = trend.points,
        valid = trend.valid,
        "Analytics computed"
    );

    AnalyticsView::Ready(AnalyticsSnapshot {
        latest,
        series,
        trend,
        projections,
    })
}

/// Load the series at `path` and analyze it. A missing store is simply not
/// enough data; I/O errors on an existing one propagate.
pub fn analyze_store(path: impl AsRef<Path>, config: &AnalyticsConfig) -> Result<AnalyticsView> {
    let records = load_series(path.as_ref())?;
    Ok(analyze(&records, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Asset, OiValue, Venue};
    use chrono::{TimeZone, Utc};

    fn day_records(day: i64, a: f64, b: f64) -> Vec<CanonicalRecord> {
        let ts = Utc.timestamp_opt(1_704_067_200 + day * 86_400, 0).unwrap();
        vec![
            CanonicalRecord::new(ts, Venue::Hyperliquid, Asset::BTC, OiValue::ok(a)),
            CanonicalRecord::new(ts, Venue::Lighter, Asset::BTC, OiValue::ok(b)),
        ]
    }

    #[test]
    fn too_few_rows_is_not_enough_data() {
        let records = day_records(0, 10.0, 5.0);
        match analyze(&records, &AnalyticsConfig::default()) {
            AnalyticsView::NotEnoughData { rows, required } => {
                assert_eq!(rows, 2);
                assert_eq!(required, 4);
            }
            other => panic!("expected NotEnoughData, got {:?}", other),
        }
    }

    #[test]
    fn gap_is_filled_and_projection_follows_the_line() {
        let records: Vec<CanonicalRecord> = [(10.0, 5.0), (0.0, 6.0), (14.0, 7.0)]
            .iter()
            .enumerate()
            .flat_map(|(day, &(a, b))| day_records(day as i64, a, b))
            .collect();

        let AnalyticsView::Ready(snapshot) = analyze(&records, &AnalyticsConfig::default()) else {
            panic!("expected a ready snapshot");
        };

        let sums: Vec<Option<f64>> = snapshot.series.iter().map(|p| p.sum_a).collect();
        assert_eq!(sums, vec![Some(10.0), Some(10.0), Some(14.0)]);
        let ratios: Vec<f64> = snapshot.series.iter().map(|p| p.ratio.unwrap()).collect();
        assert!((ratios[0] - 0.5).abs() < 1e-12);
        assert!((ratios[1] - 0.6).abs() < 1e-12);
        assert!((ratios[2] - 0.5).abs() < 1e-12);

        assert!(snapshot.trend.valid);
        assert_eq!(snapshot.latest.ratio, Some(0.5));
        assert_eq!(snapshot.projections.len(), 5);
        let one_day = &snapshot.projections[0];
        assert_eq!(one_day.horizon_days, 1);
        assert!((one_day.ratio - snapshot.trend.value_at(3.0)).abs() < 1e-9);
    }

    #[test]
    fn missing_store_is_not_enough_data() {
        let path = std::env::temp_dir().join(format!("oiwatch_missing_{}.csv", uuid::Uuid::new_v4()));
        let view = analyze_store(&path, &AnalyticsConfig::default()).unwrap();
        assert!(matches!(view, AnalyticsView::NotEnoughData { rows: 0, .. }));
    }

    #[test]
    fn view_serializes_with_status_tag() {
        let json = serde_json::to_value(AnalyticsView::NotEnoughData {
            rows: 1,
            required: 4,
        })
        .unwrap();
        assert_eq!(json["status"], "not_enough_data");
        assert_eq!(json["required"], 4);
    }
}
