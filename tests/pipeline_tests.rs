//! End-to-end tests: collect → CSV store → ratio/trend

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use oiwatch::analytics::{analyze_store, AnalyticsView};
    use oiwatch::collector::Collector;
    use oiwatch::config::AnalyticsConfig;
    use oiwatch::persistence::{load_series, CsvStore, OiSink};
    use oiwatch::sources::{ConfiguredSource, OiSource};
    use oiwatch::types::{Asset, OiValue, Venue};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Replays one `[BTC, ETH]` pair of readings per cycle; `None` is a failed fetch
    struct ScriptedSource {
        venue: Venue,
        script: Vec<[Option<f64>; 2]>,
        cycle: AtomicUsize,
    }

    impl ScriptedSource {
        fn reading(&self, cycle: usize, asset: Asset) -> OiValue {
            let row = self.script[cycle.min(self.script.len() - 1)];
            let value = match asset {
                Asset::BTC => row[0],
                Asset::ETH => row[1],
            };
            value.map(OiValue::ok).unwrap_or_else(OiValue::failed)
        }
    }

    #[async_trait]
    impl OiSource for ScriptedSource {
        fn venue(&self) -> Venue {
            self.venue
        }

        async fn fetch(&self, asset: Asset) -> OiValue {
            self.reading(self.cycle.load(Ordering::SeqCst), asset)
        }

        async fn fetch_all(&self, assets: &[Asset]) -> Vec<(Asset, OiValue)> {
            let cycle = self.cycle.fetch_add(1, Ordering::SeqCst);
            assets.iter().map(|&a| (a, self.reading(cycle, a))).collect()
        }
    }

    fn scripted(venue: Venue, script: Vec<[Option<f64>; 2]>) -> ConfiguredSource {
        ConfiguredSource::new(
            Arc::new(ScriptedSource {
                venue,
                script,
                cycle: AtomicUsize::new(0),
            }),
            Asset::ALL.to_vec(),
        )
    }

    fn temp_store(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("oiwatch_pipeline_{}_{}", name, uuid::Uuid::new_v4()))
            .join("defi_oi_data.csv")
    }

    fn day(n: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_717_200_000 + n * 86_400, 0).unwrap()
    }

    // ============================================================================
    // Collect → persist → analyze
    // ============================================================================

    #[tokio::test]
    async fn test_cycles_round_trip_through_csv_into_ratio() {
        let path = temp_store("round_trip");
        let store = Arc::new(CsvStore::new(&path));
        store.init().unwrap();

        // Hyperliquid BTC fails on day 1 and is forward-filled
        let sources = vec![
            scripted(
                Venue::Hyperliquid,
                vec![
                    [Some(8.0), Some(2.0)],
                    [None, Some(2.0)],
                    [Some(12.0), Some(2.0)],
                ],
            ),
            scripted(
                Venue::Lighter,
                vec![
                    [Some(4.0), Some(1.0)],
                    [Some(5.0), Some(1.0)],
                    [Some(6.0), Some(1.0)],
                ],
            ),
        ];
        let collector = Collector::new(
            sources,
            store.clone(),
            Duration::from_secs(300),
            Duration::from_secs(30),
        );

        for n in 0..3 {
            let report = collector.run_cycle(day(n)).await.unwrap();
            assert_eq!(report.records.len(), 4);
        }

        let records = load_series(&path).unwrap();
        assert_eq!(records.len(), 12);
        assert!(records[..4].iter().all(|r| r.timestamp == day(0)));
        assert!(records[8..].iter().all(|r| r.timestamp == day(2)));
        assert_eq!(records[4].venue, Venue::Hyperliquid);
        assert_eq!(records[4].asset, Asset::BTC);
        assert_eq!(records[4].oi_usd_millions, 0.0);

        let view = analyze_store(&path, &AnalyticsConfig::default()).unwrap();
        let AnalyticsView::Ready(snapshot) = view else {
            panic!("expected a ready snapshot");
        };

        let totals: Vec<(Option<f64>, Option<f64>)> =
            snapshot.series.iter().map(|p| (p.sum_a, p.sum_b)).collect();
        assert_eq!(
            totals,
            vec![
                (Some(10.0), Some(5.0)),
                (Some(10.0), Some(6.0)),
                (Some(14.0), Some(7.0)),
            ]
        );
        assert_eq!(snapshot.latest.ratio, Some(0.5));
        assert!(snapshot.trend.valid);
        assert_eq!(snapshot.trend.points, 3);

        let horizons: Vec<u32> = snapshot.projections.iter().map(|p| p.horizon_days).collect();
        assert_eq!(horizons, vec![1, 7, 30, 90, 365]);
        let expected = snapshot.trend.slope * 3.0 + snapshot.trend.intercept;
        assert!((snapshot.projections[0].ratio - expected).abs() < 1e-9);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_single_cycle_is_ready_but_has_no_trend() {
        let path = temp_store("single");
        let store = Arc::new(CsvStore::new(&path));
        store.init().unwrap();

        let collector = Collector::new(
            vec![
                scripted(Venue::Hyperliquid, vec![[Some(100.0), Some(50.0)]]),
                scripted(Venue::Lighter, vec![[Some(30.0), Some(15.0)]]),
            ],
            store,
            Duration::from_secs(300),
            Duration::from_secs(30),
        );
        collector.run_cycle(day(0)).await.unwrap();

        let AnalyticsView::Ready(snapshot) =
            analyze_store(&path, &AnalyticsConfig::default()).unwrap()
        else {
            panic!("one full cycle meets the minimum row count");
        };
        assert_eq!(snapshot.latest.ratio, Some(0.3));
        assert!(!snapshot.trend.valid);
        assert!(snapshot.projections.is_empty());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn test_dead_denominator_never_yields_infinite_ratio() {
        let path = temp_store("dead_venue");
        let store = Arc::new(CsvStore::new(&path));
        store.init().unwrap();

        let collector = Collector::new(
            vec![
                scripted(Venue::Hyperliquid, vec![[None, None]]),
                scripted(Venue::Lighter, vec![[Some(30.0), Some(15.0)]]),
            ],
            store,
            Duration::from_secs(300),
            Duration::from_secs(30),
        );
        for n in 0..2 {
            collector.run_cycle(day(n)).await.unwrap();
        }

        let AnalyticsView::Ready(snapshot) =
            analyze_store(&path, &AnalyticsConfig::default()).unwrap()
        else {
            panic!("expected a ready snapshot");
        };
        assert!(snapshot.series.iter().all(|p| p.ratio.is_none()));
        assert_eq!(snapshot.latest.sum_a, Some(0.0));
        assert_eq!(snapshot.latest.sum_b, Some(45.0));
        assert!(!snapshot.trend.valid);
        assert!(snapshot.latest_defined().is_none());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    // ============================================================================
    // Store edge cases
    // ============================================================================

    #[test]
    fn test_header_only_store_is_not_enough_data() {
        let path = temp_store("header_only");
        CsvStore::new(&path).init().unwrap();

        let config = AnalyticsConfig::default();
        match analyze_store(&path, &config).unwrap() {
            AnalyticsView::NotEnoughData { rows, required } => {
                assert_eq!(rows, 0);
                assert_eq!(required, config.min_rows);
            }
            AnalyticsView::Ready(_) => panic!("header-only store has no data"),
        }

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
