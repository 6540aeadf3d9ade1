//! End-to-end tests for the analysis pipeline against in-memory and
//! fault-injecting historical sources.

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use spotlift_core::types::{EventRecord, MetricName, MetricSample, WindowStatus};
    use spotlift_core::{AppConfig, SpotliftError, SpotliftResult, TimeWindow};
    use spotlift_engine::{
        AnalysisOrchestrator, AnalysisStatus, EventConversions, HistoricalSource, InMemorySource,
    };
    use spotlift_funnel::{ConversionData, FunnelStageKind};
    use spotlift_predict::HistoricalData;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::watch;

    fn event_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 20, 0, 0).unwrap()
    }

    /// Flat hourly traffic of 100 from eight weeks before the spot until `days_after`.
    fn flat_history(days_after: i64) -> HistoricalData {
        let start = event_time() - Duration::days(56);
        let samples = (0..24 * (56 + days_after))
            .map(|i| MetricSample::new(start + Duration::hours(i), 100.0, 100.0, 200.0))
            .collect();
        HistoricalData::from_samples(samples)
    }

    /// Hourly traffic of 100 from eight weeks before the spot to a month after,
    /// with a 300-user spike in the hour the spot airs.
    fn spiked_history() -> HistoricalData {
        let event = event_time();
        let start = event - Duration::days(56);
        let samples = (0..24 * (56 + 31))
            .map(|i| {
                let ts = start + Duration::hours(i);
                let users = if ts == event { 300.0 } else { 100.0 };
                MetricSample::new(ts, users, users, users * 2.0)
            })
            .collect();
        HistoricalData::from_samples(samples)
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.engine.retry_backoff_ms = 1;
        config.engine.event_timeout_ms = 5_000;
        config
    }

    fn orchestrator(
        source: impl HistoricalSource + 'static,
        config: &AppConfig,
    ) -> AnalysisOrchestrator {
        AnalysisOrchestrator::new(config, Arc::new(source))
    }

    /// A closed channel never signals cancellation.
    fn never_cancelled() -> watch::Receiver<bool> {
        let (_tx, rx) = watch::channel(false);
        rx
    }

    /// Fails the first `failures` sample fetches, then serves from memory.
    struct FlakySource {
        inner: InMemorySource,
        failures: usize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl HistoricalSource for FlakySource {
        async fn fetch_samples(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> SpotliftResult<Vec<MetricSample>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(SpotliftError::ExternalFetch(format!("provider error {call}")));
            }
            self.inner.fetch_samples(start, end).await
        }
    }

    /// Every fetch fails.
    struct DownSource;

    #[async_trait]
    impl HistoricalSource for DownSource {
        async fn fetch_samples(
            &self,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> SpotliftResult<Vec<MetricSample>> {
            Err(SpotliftError::ExternalFetch("provider unreachable".to_string()))
        }
    }

    /// Stalls conversion lookups for events named `slow`.
    struct StallingSource {
        inner: InMemorySource,
        stall: std::time::Duration,
    }

    #[async_trait]
    impl HistoricalSource for StallingSource {
        async fn fetch_samples(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> SpotliftResult<Vec<MetricSample>> {
            self.inner.fetch_samples(start, end).await
        }

        async fn fetch_conversions(
            &self,
            event: &EventRecord,
        ) -> SpotliftResult<Option<EventConversions>> {
            if event.id == "slow" {
                tokio::time::sleep(self.stall).await;
            }
            Ok(None)
        }
    }

    /// Counts sample fetches.
    struct CountingSource {
        inner: InMemorySource,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl HistoricalSource for CountingSource {
        async fn fetch_samples(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> SpotliftResult<Vec<MetricSample>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.fetch_samples(start, end).await
        }
    }

    #[tokio::test]
    async fn test_empty_history_end_to_end() {
        let orchestrator = orchestrator(InMemorySource::new(HistoricalData::default()), &config());
        let event = EventRecord::new("spot-1", event_time());

        let analysis = orchestrator.analyze_event(&event).await;
        assert_eq!(analysis.status, AnalysisStatus::Complete);
        assert_eq!(analysis.impact.len(), 4);
        for report in analysis.impact.values() {
            assert_eq!(report.status, WindowStatus::InsufficientData);
            assert_eq!(report.confidence, 0.0);
            assert!(report.metrics.is_empty());
        }
        assert!(analysis.funnel.is_none());

        let prediction = analysis.prediction.expect("prediction is always produced");
        assert!(prediction.confidence >= 0.1 && prediction.confidence <= 0.95);
        assert_eq!(prediction.historical_samples, 0);
    }

    #[tokio::test]
    async fn test_spike_is_measured() {
        let orchestrator = orchestrator(InMemorySource::new(spiked_history()), &config());
        let event = EventRecord::new("spot-1", event_time());

        let analysis = orchestrator.analyze_event(&event).await;
        assert_eq!(analysis.status, AnalysisStatus::Complete);

        let immediate = &analysis.impact[&TimeWindow::Immediate];
        assert_eq!(immediate.status, WindowStatus::Measured);
        let users = &immediate.metrics[&MetricName::ActiveUsers];
        assert_eq!(users.window_value, 300.0);
        assert_eq!(users.reference_value, 100.0);
        assert_eq!(users.percentage_change, 200.0);
        assert!(users.is_significant);

        let long = &analysis.impact[&TimeWindow::LongTerm];
        let users = &long.metrics[&MetricName::ActiveUsers];
        assert_eq!(users.percentage_change, 0.0);
        assert!(!users.is_significant);

        let prediction = analysis.prediction.unwrap();
        assert_eq!(prediction.historical_samples, 24 * 56);
    }

    #[tokio::test]
    async fn test_history_ending_at_spot_reports_no_change() {
        let orchestrator = orchestrator(InMemorySource::new(flat_history(0)), &config());
        let analysis = orchestrator
            .analyze_event(&EventRecord::new("spot-1", event_time()))
            .await;

        assert_eq!(analysis.status, AnalysisStatus::Complete);
        assert_eq!(analysis.impact.len(), 4);
        for report in analysis.impact.values() {
            assert_eq!(report.status, WindowStatus::InsufficientData);
            assert!(report.metrics.is_empty());
            assert_eq!(report.confidence, 0.0);
            assert_eq!(report.significance.significant_metric_count, 0);
        }
    }

    #[tokio::test]
    async fn test_partially_elapsed_window_is_not_measured() {
        let orchestrator = orchestrator(InMemorySource::new(flat_history(7)), &config());
        let analysis = orchestrator
            .analyze_event(&EventRecord::new("spot-1", event_time()))
            .await;

        let medium = &analysis.impact[&TimeWindow::MediumTerm];
        assert_eq!(medium.status, WindowStatus::Measured);
        let users = &medium.metrics[&MetricName::ActiveUsers];
        assert_eq!(users.window_value, 14_400.0);
        assert_eq!(users.percentage_change, 0.0);

        let long = &analysis.impact[&TimeWindow::LongTerm];
        assert_eq!(long.status, WindowStatus::InsufficientData);
        assert!(long.metrics.is_empty());
    }

    #[tokio::test]
    async fn test_transient_fetch_failures_are_retried() {
        let source = FlakySource {
            inner: InMemorySource::new(spiked_history()),
            failures: 2,
            calls: AtomicUsize::new(0),
        };
        let orchestrator = orchestrator(source, &config());
        let analysis = orchestrator
            .analyze_event(&EventRecord::new("spot-1", event_time()))
            .await;
        assert_eq!(analysis.status, AnalysisStatus::Complete);
        assert!(analysis.notes.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_provider_degrades_every_window() {
        let orchestrator = orchestrator(DownSource, &config());
        let analysis = orchestrator
            .analyze_event(&EventRecord::new("spot-1", event_time()))
            .await;

        assert_eq!(analysis.status, AnalysisStatus::Degraded);
        // History plus four windows.
        assert_eq!(analysis.notes.len(), 5);
        for report in analysis.impact.values() {
            assert_eq!(report.confidence, 0.0);
            assert_eq!(report.status, WindowStatus::InsufficientData);
        }
        assert!(analysis.prediction.is_some());
    }

    #[tokio::test]
    async fn test_missing_timestamp_is_unavailable() {
        let orchestrator = orchestrator(InMemorySource::new(spiked_history()), &config());
        let mut event = EventRecord::new("spot-1", event_time());
        event.timestamp = None;

        let analysis = orchestrator.analyze_event(&event).await;
        assert_eq!(analysis.status, AnalysisStatus::Unavailable);
        assert!(analysis.notes[0].contains("spot-1"));
        assert!(analysis.prediction.is_none());
    }

    #[tokio::test]
    async fn test_funnel_and_control_from_conversions() {
        let mut conversions = BTreeMap::new();
        conversions.insert(
            "spot-1".to_string(),
            EventConversions {
                spot: ConversionData::from_counts([10_000.0, 400.0, 300.0, 150.0, 30.0])
                    .with_revenue(FunnelStageKind::Conversion, 1500.0)
                    .with_cost(1000.0),
                reference: ConversionData::from_counts([10_000.0, 300.0, 150.0, 75.0, 15.0]),
                control: Some(ConversionData::from_counts([10_000.0, 200.0, 150.0, 75.0, 15.0])),
            },
        );
        let source = InMemorySource::new(spiked_history()).with_conversions(conversions);
        let orchestrator = orchestrator(source, &config());

        let analysis = orchestrator
            .analyze_event(&EventRecord::new("spot-1", event_time()))
            .await;
        let funnel = analysis.funnel.expect("funnel report");
        assert_eq!(funnel.stages.len(), 5);
        assert_eq!(funnel.roi.roas, 1.5);
        let control = analysis.control.expect("control comparison");
        assert_eq!(control[&FunnelStageKind::Clicks].lift, 100.0);

        // The reference funnel feeds projected step rates.
        let prediction = analysis.prediction.unwrap();
        assert!((prediction.conversions.step_rates.click_through - 0.03).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_analysis_is_idempotent() {
        let mut config = config();
        config.cache.enabled = false;
        let orchestrator = orchestrator(InMemorySource::new(spiked_history()), &config);
        let event = EventRecord::new("spot-1", event_time());

        let first = orchestrator.analyze_event(&event).await;
        let second = orchestrator.analyze_event(&event).await;
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[tokio::test]
    async fn test_cache_skips_window_fetches() {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            inner: InMemorySource::new(spiked_history()),
            calls: calls.clone(),
        };
        let orchestrator = orchestrator(source, &config());
        let event = EventRecord::new("spot-1", event_time());

        let first = orchestrator.analyze_event(&event).await;
        assert_eq!(calls.load(Ordering::SeqCst), 5);
        let second = orchestrator.analyze_event(&event).await;
        // Only the history fetch repeats.
        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(first.impact, second.impact);
    }

    #[tokio::test]
    async fn test_batch_preserves_order_and_isolates_failures() {
        let mut config = config();
        config.engine.workers = 2;
        config.engine.event_timeout_ms = 1_000;
        let source = StallingSource {
            inner: InMemorySource::new(spiked_history()),
            stall: std::time::Duration::from_secs(30),
        };
        let orchestrator = orchestrator(source, &config);

        let mut undated = EventRecord::new("undated", event_time());
        undated.timestamp = None;
        let events = vec![
            EventRecord::new("a", event_time()),
            EventRecord::new("slow", event_time()),
            undated,
            EventRecord::new("b", event_time() + Duration::hours(1)),
        ];

        let report = orchestrator.analyze_batch(events, never_cancelled()).await;
        let ids: Vec<&str> = report.events.iter().map(|e| e.event_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "slow", "undated", "b"]);

        assert_eq!(report.events[0].status, AnalysisStatus::Complete);
        assert_eq!(report.events[1].status, AnalysisStatus::Degraded);
        assert!(report.events[1].notes[0].contains("timed out"));
        assert_eq!(report.events[1].impact.len(), 4);
        assert_eq!(report.events[2].status, AnalysisStatus::Unavailable);
        assert_eq!(report.events[3].status, AnalysisStatus::Complete);

        assert_eq!(report.summary.total, 4);
        assert_eq!(report.summary.complete, 2);
        assert_eq!(report.summary.degraded, 1);
        assert_eq!(report.summary.unavailable, 1);
        assert!(!report.summary.cancelled);
    }

    #[tokio::test]
    async fn test_cancellation_keeps_completed_results() {
        let source = StallingSource {
            inner: InMemorySource::new(spiked_history()),
            stall: std::time::Duration::from_secs(30),
        };
        let mut config = config();
        config.engine.event_timeout_ms = 60_000;
        let orchestrator = orchestrator(source, &config);

        let events = vec![
            EventRecord::new("a", event_time()),
            EventRecord::new("slow", event_time()),
            EventRecord::new("b", event_time()),
        ];
        let (tx, rx) = watch::channel(false);
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(1_500)).await;
            let _ = tx.send(true);
        });

        let report = orchestrator.analyze_batch(events, rx).await;
        assert!(report.summary.cancelled);
        assert_eq!(report.events.len(), 3);
        assert_eq!(report.events[0].status, AnalysisStatus::Complete);
        assert_eq!(report.events[2].status, AnalysisStatus::Complete);

        let slow = &report.events[1];
        assert_eq!(slow.status, AnalysisStatus::Degraded);
        assert_eq!(slow.notes, vec!["Insufficient data: analysis cancelled".to_string()]);
        for window in slow.impact.values() {
            assert_eq!(window.confidence, 0.0);
        }
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let orchestrator = orchestrator(InMemorySource::new(spiked_history()), &config());
        let (tx, rx) = watch::channel(true);
        let report = orchestrator
            .analyze_batch(vec![EventRecord::new("a", event_time())], rx)
            .await;
        drop(tx);
        assert!(report.summary.cancelled);
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].event_id, "a");
    }
}
