//! Linear trend of the ratio over elapsed days

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::ratio::RatioPoint;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// OLS fit of `ratio(t) = slope * t + intercept`, `t` in days since `origin`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendModel {
    pub slope: f64,
    pub intercept: f64,
    /// Defined-ratio points used by the fit
    pub points: usize,
    /// Timestamp of the first defined ratio (t = 0)
    pub origin: Option<DateTime<Utc>>,
    /// False when there were too few points or no spread in time
    pub valid: bool,
}

impl TrendModel {
    pub fn degenerate(points: usize, origin: Option<DateTime<Utc>>) -> Self {
        Self {
            slope: 0.0,
            intercept: 0.0,
            points,
            origin,
            valid: false,
        }
    }

    /// Fitted ratio at `t` days since the origin
    pub fn value_at(&self, t_days: f64) -> f64 {
        self.slope * t_days + self.intercept
    }
}

/// Ratio extrapolated `horizon_days` past the latest row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub horizon_days: u32,
    pub at: DateTime<Utc>,
    pub ratio: f64,
}

pub fn elapsed_days(origin: DateTime<Utc>, ts: DateTime<Utc>) -> f64 {
    (ts - origin).num_milliseconds() as f64 / MILLIS_PER_DAY
}

pub fn fit_trend(series: &[RatioPoint]) -> TrendModel {
    let defined: Vec<(DateTime<Utc>, f64)> = series
        .iter()
        .filter_map(|p| p.ratio.map(|r| (p.timestamp, r)))
        .collect();

    let Some(&(origin, _)) = defined.first() else {
        return TrendModel::degenerate(0, None);
    };
    let n = defined.len();
    if n < 2 {
        return TrendModel::degenerate(n, Some(origin));
    }

    let xs: Vec<f64> = defined
        .iter()
        .map(|(ts, _)| elapsed_days(origin, *ts))
        .collect();
    let ys: Vec<f64> = defined.iter().map(|(_, r)| *r).collect();

    let mean_x = xs.iter().sum::<f64>() / n as f64;
    let mean_y = ys.iter().sum::<f64>() / n as f64;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in xs.iter().zip(&ys) {
        sxx += (x - mean_x) * (x - mean_x);
        sxy += (x - mean_x) * (y - mean_y);
    }

    if sxx == 0.0 {
        return TrendModel::degenerate(n, Some(origin));
    }

    let slope = sxy / sxx;
    TrendModel {
        slope,
        intercept: mean_y - slope * mean_x,
        points: n,
        origin: Some(origin),
        valid: true,
    }
}

/// Projections anchored on `last` (the most recent row of the full series).
/// Empty for a degenerate trend. Values are not clamped.
pub fn project(trend: &TrendModel, last: DateTime<Utc>, horizons_days: &[u32]) -> Vec<Projection> {
    let Some(origin) = trend.origin.filter(|_| trend.valid) else {
        return Vec::new();
    };
    let t_last = elapsed_days(origin, last);

    horizons_days
        .iter()
        .map(|&h| Projection {
            horizon_days: h,
            at: last + Duration::days(i64::from(h)),
            ratio: trend.value_at(t_last + f64::from(h)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn point(day: i64, ratio: Option<f64>) -> RatioPoint {
        RatioPoint {
            timestamp: Utc.timestamp_opt(1_700_000_000 + day * 86_400, 0).unwrap(),
            sum_a: Some(1.0),
            sum_b: ratio,
            ratio,
        }
    }

    #[test]
    fn exact_line_is_recovered() {
        let series: Vec<RatioPoint> = (0..5).map(|d| point(d, Some(2.0 * d as f64 + 1.0))).collect();
        let trend = fit_trend(&series);

        assert!(trend.valid);
        assert_eq!(trend.points, 5);
        assert!((trend.slope - 2.0).abs() < 1e-9);
        assert!((trend.intercept - 1.0).abs() < 1e-9);

        let projections = project(&trend, series[4].timestamp, &[1, 7]);
        assert_eq!(projections.len(), 2);
        assert!((projections[0].ratio - (2.0 * 5.0 + 1.0)).abs() < 1e-9);
        assert!((projections[1].ratio - (2.0 * 11.0 + 1.0)).abs() < 1e-9);
        assert_eq!(projections[0].at, series[4].timestamp + Duration::days(1));
    }

    #[test]
    fn undefined_points_are_skipped_and_origin_is_first_defined() {
        let series = vec![
            point(0, None),
            point(1, Some(1.0)),
            point(2, None),
            point(3, Some(5.0)),
        ];
        let trend = fit_trend(&series);
        assert!(trend.valid);
        assert_eq!(trend.points, 2);
        assert_eq!(trend.origin, Some(series[1].timestamp));
        assert!((trend.slope - 2.0).abs() < 1e-9);
        assert!((trend.intercept - 1.0).abs() < 1e-9);
    }

    #[test]
    fn projection_anchors_on_latest_row_even_if_undefined() {
        let series = vec![point(0, Some(1.0)), point(1, Some(2.0)), point(4, None)];
        let trend = fit_trend(&series);
        let projections = project(&trend, series[2].timestamp, &[1]);
        // t_last = 4, so +1 day is t = 5
        assert!((projections[0].ratio - 6.0).abs() < 1e-9);
    }

    #[test]
    fn degenerate_inputs_yield_no_projection() {
        let trend = fit_trend(&[]);
        assert!(!trend.valid);
        assert_eq!(trend.origin, None);

        let single = vec![point(0, Some(0.4))];
        let trend = fit_trend(&single);
        assert!(!trend.valid);
        assert_eq!(trend.points, 1);
        assert!(project(&trend, single[0].timestamp, &[1, 7]).is_empty());

        let same_time = vec![point(0, Some(0.4)), point(0, Some(0.6))];
        let trend = fit_trend(&same_time);
        assert!(!trend.valid);
        assert_eq!((trend.slope, trend.intercept), (0.0, 0.0));
    }

    #[test]
    fn negative_extrapolation_is_not_clamped() {
        let series = vec![point(0, Some(1.0)), point(1, Some(0.5))];
        let trend = fit_trend(&series);
        let projections = project(&trend, series[1].timestamp, &[30]);
        assert!(projections[0].ratio < 0.0);
    }
}
