//! Pivot, forward-fill and per-timestamp venue ratio

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::types::{Asset, CanonicalRecord, Venue};

/// Venue in the ratio denominator
pub const VENUE_A: Venue = Venue::Hyperliquid;
/// Venue in the ratio numerator
pub const VENUE_B: Venue = Venue::Lighter;

/// Per-timestamp cross-venue comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioPoint {
    pub timestamp: DateTime<Utc>,
    /// Hyperliquid total; `None` when the venue never appears in the series
    pub sum_a: Option<f64>,
    /// Lighter total; `None` when the venue never appears in the series
    pub sum_b: Option<f64>,
    /// `sum_b / sum_a`, undefined when `sum_a` is not positive
    pub ratio: Option<f64>,
}

/// One row per distinct timestamp, one column per observed (venue, asset)
#[derive(Debug, Clone, Default)]
pub struct PivotTable {
    pub timestamps: Vec<DateTime<Utc>>,
    pub columns: BTreeMap<(Venue, Asset), Vec<f64>>,
}

impl PivotTable {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Rows sorted by timestamp. Absent cells are 0.0 and duplicate
/// (timestamp, venue, asset) readings are averaged.
pub fn pivot(records: &[CanonicalRecord]) -> PivotTable {
    let timestamps: Vec<DateTime<Utc>> = records
        .iter()
        .map(|r| r.timestamp)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let row_of: HashMap<DateTime<Utc>, usize> = timestamps
        .iter()
        .enumerate()
        .map(|(i, ts)| (*ts, i))
        .collect();

    // (sum, count) per cell
    let mut cells: BTreeMap<(Venue, Asset), Vec<(f64, u32)>> = BTreeMap::new();
    for record in records {
        let column = cells
            .entry((record.venue, record.asset))
            .or_insert_with(|| vec![(0.0, 0); timestamps.len()]);
        if let Some(&row) = row_of.get(&record.timestamp) {
            column[row].0 += record.oi_usd_millions;
            column[row].1 += 1;
        }
    }

    let columns: BTreeMap<(Venue, Asset), Vec<f64>> = cells
        .into_iter()
        .map(|(key, column)| {
            let means = column
                .into_iter()
                .map(|(sum, count)| if count == 0 { 0.0 } else { sum / count as f64 })
                .collect();
            (key, means)
        })
        .collect();

    PivotTable {
        timestamps,
        columns,
    }
}

/// Replace each exact 0.0 with the last non-zero value before it
pub fn forward_fill(values: &[f64]) -> Vec<f64> {
    let mut last_seen: Option<f64> = None;
    values
        .iter()
        .map(|&v| {
            if v == 0.0 {
                last_seen.unwrap_or(0.0)
            } else {
                last_seen = Some(v);
                v
            }
        })
        .collect()
}

/// `b / a`, or `None` when the division is undefined
pub fn safe_ratio(sum_a: Option<f64>, sum_b: Option<f64>) -> Option<f64> {
    match (sum_a, sum_b) {
        (Some(a), Some(b)) if a > 0.0 => Some(b / a).filter(|r| r.is_finite()),
        _ => None,
    }
}

/// Forward-filled venue totals and their ratio for every row of `table`
pub fn ratio_series(table: &PivotTable) -> Vec<RatioPoint> {
    let filled: BTreeMap<(Venue, Asset), Vec<f64>> = table
        .columns
        .iter()
        .map(|(key, values)| (*key, forward_fill(values)))
        .collect();

    let venue_total = |venue: Venue, row: usize| -> Option<f64> {
        let mut cells = filled
            .iter()
            .filter(|((v, _), _)| *v == venue)
            .map(|(_, values)| values[row])
            .peekable();
        cells.peek()?;
        Some(cells.sum())
    };

    table
        .timestamps
        .iter()
        .enumerate()
        .map(|(row, ts)| {
            let sum_a = venue_total(VENUE_A, row);
            let sum_b = venue_total(VENUE_B, row);
            RatioPoint {
                timestamp: *ts,
                sum_a,
                sum_b,
                ratio: safe_ratio(sum_a, sum_b),
            }
        })
        .collect()
}
