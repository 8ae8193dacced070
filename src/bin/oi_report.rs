//! One-shot ratio report
//!
//! Usage: cargo run --bin oi_report
//!
//! Reads the CSV series, computes the Lighter/Hyperliquid ratio, fits the
//! trend and logs the projections.

use oiwatch::analytics::{analyze_store, AnalyticsSnapshot, AnalyticsView};
use oiwatch::config::AppConfig;
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;
    config.logging.init_tracing();

    let path = &config.storage.csv_path;
    info!("📂 Reading OI series from {}", path);

    match analyze_store(path, &config.analytics)? {
        AnalyticsView::NotEnoughData { rows, required } => {
            warn!(
                rows,
                required, "⏳ Not enough data yet ({} rows, need {})", rows, required
            );
        }
        AnalyticsView::Ready(snapshot) => report(&snapshot),
    }

    Ok(())
}

fn fmt_opt(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) => format!("{:.*}", decimals, v),
        None => "n/a".to_string(),
    }
}

fn report(snapshot: &AnalyticsSnapshot) {
    let latest = &snapshot.latest;

    info!("");
    info!("📊 OI RATIO REPORT");
    info!("============================");
    info!("As of:              {}", latest.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    info!("Hyperliquid total:  ${}M", fmt_opt(latest.sum_a, 2));
    info!("Lighter total:      ${}M", fmt_opt(latest.sum_b, 2));
    info!("Lighter/Hyperliquid: {}", fmt_opt(latest.ratio, 4));
    if latest.ratio.is_none() {
        if let Some(defined) = snapshot.latest_defined() {
            info!(
                "Last defined ratio: {} at {}",
                fmt_opt(defined.ratio, 4),
                defined.timestamp.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }
    info!("Rows:               {}", snapshot.series.len());

    let trend = &snapshot.trend;
    if !trend.valid {
        warn!(
            points = trend.points,
            "📉 Trend unavailable (need at least 2 ratio points at distinct times)"
        );
        return;
    }

    info!(
        "Trend:              {:+.6}/day (intercept {:.4}, {} points)",
        trend.slope, trend.intercept, trend.points
    );
    for projection in &snapshot.projections {
        info!(
            "  +{:>3}d  {}  →  {:.4}",
            projection.horizon_days,
            projection.at.format("%Y-%m-%d"),
            projection.ratio
        );
    }
}
