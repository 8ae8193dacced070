//! Collection Cycle Scheduler
//!
//! Polls every configured source on a fixed cadence and hands each cycle's
//! batch to the sink as one append. Adapters never fail past their boundary,
//! so the only cycle errors come from the sink.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::AppConfig;
use crate::persistence::OiSink;
use crate::sources::ConfiguredSource;
use crate::types::{cycle_timestamp, CanonicalRecord, OiValue};

/// Scheduler lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorState {
    Idle,
    Running,
    Waiting,
}

/// Outcome of one persisted cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub timestamp: DateTime<Utc>,
    pub records: Vec<CanonicalRecord>,
    /// Readings recorded as the 0.0 sentinel
    pub failed: usize,
    pub elapsed: Duration,
}

/// Time left in the interval after a cycle took `elapsed`
pub fn compute_wait(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

/// Resolves once the stop flag is set or the sender is gone
async fn stop_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

pub struct Collector {
    sources: Vec<ConfiguredSource>,
    sink: Arc<dyn OiSink>,
    interval: Duration,
    error_cooldown: Duration,
    state: RwLock<CollectorState>,
}

impl Collector {
    pub fn new(
        sources: Vec<ConfiguredSource>,
        sink: Arc<dyn OiSink>,
        interval: Duration,
        error_cooldown: Duration,
    ) -> Self {
        Self {
            sources,
            sink,
            interval,
            error_cooldown,
            state: RwLock::new(CollectorState::Idle),
        }
    }

    pub fn from_config(
        config: &AppConfig,
        sources: Vec<ConfiguredSource>,
        sink: Arc<dyn OiSink>,
    ) -> Self {
        Self::new(sources, sink, config.interval(), config.error_cooldown())
    }

    pub async fn state(&self) -> CollectorState {
        *self.state.read().await
    }

    async fn set_state(&self, state: CollectorState) {
        *self.state.write().await = state;
    }

    /// Number of (venue, asset) pairs written per cycle
    pub fn pairs(&self) -> usize {
        self.sources.iter().map(|s| s.assets.len()).sum()
    }

    /// Query every source concurrently and build the batch for `timestamp`.
    ///
    /// Records come out in venue-table order, then configured asset order.
    pub async fn collect(&self, timestamp: DateTime<Utc>) -> Vec<CanonicalRecord> {
        let fetches = self.sources.iter().map(|configured| async move {
            let readings = configured.source.fetch_all(&configured.assets).await;
            (configured, readings)
        });

        let mut records = Vec::with_capacity(self.pairs());
        for (configured, readings) in join_all(fetches).await {
            let venue = configured.venue();
            for &asset in &configured.assets {
                let reading = match readings.iter().find(|(a, _)| *a == asset) {
                    Some((_, value)) => *value,
                    None => {
                        warn!(venue = %venue, asset = %asset, "Source returned no reading, recording 0.0");
                        OiValue::failed()
                    }
                };
                records.push(CanonicalRecord::new(timestamp, venue, asset, reading));
            }
        }
        records
    }

    /// Sinks do blocking file I/O, so the append runs on the blocking pool
    async fn persist(
        &self,
        timestamp: DateTime<Utc>,
        records: Vec<CanonicalRecord>,
        started: Instant,
    ) -> Result<CycleReport> {
        let sink = self.sink.clone();
        let records = tokio::task::spawn_blocking(move || sink.append(&records).map(|_| records))
            .await
            .context("sink append task panicked")??;

        let failed = records.iter().filter(|r| r.is_sentinel()).count();
        for record in &records {
            debug!(
                venue = %record.venue,
                asset = %record.asset,
                oi_millions = record.oi_usd_millions,
                "Recorded OI"
            );
        }
        info!(
            timestamp = %timestamp,
            records = records.len(),
            failed,
            "💾 Saved {} records", records.len()
        );

        Ok(CycleReport {
            timestamp,
            records,
            failed,
            elapsed: started.elapsed(),
        })
    }

    /// One full cycle: collect, then a single append
    pub async fn run_cycle(&self, timestamp: DateTime<Utc>) -> Result<CycleReport> {
        let started = Instant::now();
        let records = self.collect(timestamp).await;
        self.persist(timestamp, records, started).await
    }

    /// Run cycles until `shutdown` flips to true (or its sender is dropped)
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        info!(
            sources = self.sources.len(),
            pairs = self.pairs(),
            interval_secs = self.interval.as_secs(),
            "🚀 Collector started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.set_state(CollectorState::Running).await;
            let started = Instant::now();
            let timestamp = cycle_timestamp();

            let records = tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => {
                    warn!(timestamp = %timestamp, "🛑 Stop requested mid-cycle, discarding in-flight batch");
                    break;
                }
                records = self.collect(timestamp) => records,
            };

            let wait = match self.persist(timestamp, records, started).await {
                Ok(report) => {
                    let wait = compute_wait(self.interval, report.elapsed);
                    let next_run = Utc::now()
                        + chrono::Duration::from_std(wait)
                            .unwrap_or_else(|_| chrono::Duration::zero());
                    info!(
                        timestamp = %report.timestamp,
                        records = report.records.len(),
                        failed = report.failed,
                        elapsed_ms = report.elapsed.as_millis() as u64,
                        wait_secs = wait.as_secs(),
                        next_run = %next_run.format("%H:%M:%S"),
                        "📊 Cycle complete"
                    );
                    wait
                }
                Err(e) => {
                    error!(
                        timestamp = %timestamp,
                        error = %e,
                        cooldown_secs = self.error_cooldown.as_secs(),
                        "❌ Cycle failed, cooling down"
                    );
                    self.error_cooldown
                }
            };

            self.set_state(CollectorState::Waiting).await;
            tokio::select! {
                biased;
                _ = stop_requested(&mut shutdown) => break,
                _ = tokio::time::sleep(wait) => {}
            }
        }

        self.set_state(CollectorState::Idle).await;
        info!("🛑 Collector stopped");
        Ok(())
    }
}
