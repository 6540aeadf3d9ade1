//! Analysis orchestrator: runs the full per-event pipeline and supervises a
//! bounded pool of analysis tasks for batches.

use crate::cache::{CachedWindow, ReferenceCache};
use crate::report::{AnalysisStatus, BatchReport, EventAnalysis};
use crate::source::{EventConversions, HistoricalSource};
use anyhow::anyhow;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::Rng;
use spotlift_core::config::{AppConfig, EngineConfig};
use spotlift_core::types::{EventRecord, MetricName, MetricSample, ReferenceMap, WindowMetrics};
use spotlift_core::validation::AnomalyGate;
use spotlift_core::{SpotliftError, SpotliftResult, TimeWindow};
use spotlift_funnel::{FunnelAnalyzer, ValidatedFunnelAnalyzer};
use spotlift_impact::{
    aggregate_window, ReferenceCalculator, SignificanceEngine, ValidatedImpactAnalyzer,
    WindowImpactAnalyzer,
};
use spotlift_predict::{HistoricalData, MarketData, Predictor, ValidatedPredictor};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Metrics every window report carries, zero when nothing was observed.
const CORE_METRICS: [MetricName; 3] = [
    MetricName::ActiveUsers,
    MetricName::Sessions,
    MetricName::Pageviews,
];

/// Resolution of provider telemetry.
const SAMPLE_GRANULARITY: ChronoDuration = ChronoDuration::hours(1);

#[derive(Clone)]
pub struct AnalysisOrchestrator {
    source: Arc<dyn HistoricalSource>,
    references: ReferenceCalculator,
    impact: ValidatedImpactAnalyzer,
    funnel: ValidatedFunnelAnalyzer,
    predictor: ValidatedPredictor,
    cache: Option<ReferenceCache>,
    market: MarketData,
    config: EngineConfig,
}

impl AnalysisOrchestrator {
    pub fn new(config: &AppConfig, source: Arc<dyn HistoricalSource>) -> Self {
        let gate = AnomalyGate::new(&config.gate);
        let cache = config
            .cache
            .enabled
            .then(|| ReferenceCache::new(&config.cache));

        info!(
            workers = config.engine.workers,
            event_timeout_ms = config.engine.event_timeout_ms,
            fetch_retries = config.engine.fetch_retries,
            cache_enabled = config.cache.enabled,
            gate_enabled = config.gate.enabled,
            "Analysis orchestrator initialized"
        );

        Self {
            source,
            references: ReferenceCalculator::new(),
            impact: ValidatedImpactAnalyzer::new(
                WindowImpactAnalyzer::new(SignificanceEngine::new()),
                gate.clone(),
            ),
            funnel: ValidatedFunnelAnalyzer::new(FunnelAnalyzer::new(), gate.clone()),
            predictor: ValidatedPredictor::new(Predictor::new(&config.prediction), gate),
            cache,
            market: MarketData::default(),
            config: config.engine.clone(),
        }
    }

    pub fn with_market(mut self, market: MarketData) -> Self {
        self.market = market;
        self
    }

    pub fn with_predictor(mut self, predictor: ValidatedPredictor) -> Self {
        self.predictor = predictor;
        self
    }

    /// Analyze one event. Never fails: problems are reported through the
    /// result's status and notes.
    pub async fn analyze_event(&self, event: &EventRecord) -> EventAnalysis {
        let analysis = match event.require_timestamp() {
            Ok(event_time) => self.run_pipeline(event, event_time).await,
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "Event cannot be analyzed");
                EventAnalysis::unavailable(event, e.to_string())
            }
        };
        record_outcome(&analysis);
        analysis
    }

    async fn run_pipeline(&self, event: &EventRecord, event_time: DateTime<Utc>) -> EventAnalysis {
        let mut notes = Vec::new();

        let lookback_start = event_time - ChronoDuration::days(self.config.lookback_days.max(0));
        let history = match self
            .fetch_with_retry(event, "history", lookback_start, event_time)
            .await
        {
            Ok(samples) => samples,
            Err(e) => {
                notes.push(format!("history unavailable: {e}"));
                Vec::new()
            }
        };

        let horizon = match self.source.data_horizon().await {
            Ok(horizon) => horizon,
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "Data horizon unavailable");
                None
            }
        };
        let now = Utc::now();

        let mut observed: BTreeMap<TimeWindow, WindowMetrics> = BTreeMap::new();
        let mut references = ReferenceMap::new();
        for window in TimeWindow::ALL {
            let cached = match &self.cache {
                Some(cache) => cache.get(&event.id, window),
                None => None,
            };
            let entry = match cached {
                Some(entry) => entry,
                None => match self
                    .measure_window(event, event_time, window, &history, horizon, now)
                    .await
                {
                    Ok((entry, complete)) => {
                        // An unfinished window is measured again once data arrives.
                        if let (Some(cache), true) = (&self.cache, complete) {
                            cache.put(&event.id, window, entry.clone());
                        }
                        entry
                    }
                    Err(e) => {
                        warn!(
                            event_id = %event.id,
                            window = %window,
                            error = %e,
                            "Window degraded to zero-sample reference"
                        );
                        notes.push(format!("{window} window degraded: {e}"));
                        CachedWindow {
                            reference: self.references.compute_window_reference(
                                event_time,
                                window,
                                &[],
                            ),
                            observed: WindowMetrics::new(),
                        }
                    }
                },
            };
            observed.insert(window, entry.observed);
            references.insert(window, entry.reference);
        }

        let impact = self
            .impact
            .analyze_temporal_impact(event, &observed, &references);

        let conversions = match self.source.fetch_conversions(event).await {
            Ok(conversions) => conversions,
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "Conversion data unavailable");
                metrics::counter!("engine.fetch_failures").increment(1);
                notes.push(format!("conversions unavailable: {e}"));
                None
            }
        };
        let (funnel, control, validation) = self.analyze_conversions(event, conversions.as_ref());

        let prediction = self
            .predict(event, history, conversions.as_ref(), &mut notes)
            .await;

        let status = if notes.is_empty() {
            AnalysisStatus::Complete
        } else {
            AnalysisStatus::Degraded
        };

        EventAnalysis {
            event_id: event.id.clone(),
            status,
            notes,
            impact,
            funnel,
            control,
            prediction,
            validation,
        }
    }

    /// Reference and observed aggregates for one window, and whether the
    /// window has fully elapsed in the source's data. An unfinished window
    /// has no observed aggregate.
    async fn measure_window(
        &self,
        event: &EventRecord,
        event_time: DateTime<Utc>,
        window: TimeWindow,
        history: &[MetricSample],
        horizon: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> SpotliftResult<(CachedWindow, bool)> {
        let reference = self
            .references
            .compute_window_reference(event_time, window, history);

        let (start, end) = window.bounds(event_time);
        if !window_is_complete(start, end, horizon, now) {
            debug!(
                event_id = %event.id,
                window = %window,
                window_end = %end,
                "Window not yet elapsed"
            );
            let pending = CachedWindow {
                reference,
                observed: WindowMetrics::new(),
            };
            return Ok((pending, false));
        }

        let samples = self
            .fetch_with_retry(event, window.name(), start, end)
            .await?;
        let observed = aggregate_window(event_time, &samples, window);

        debug!(
            event_id = %event.id,
            window = %window,
            observed_samples = samples.len(),
            "Window measured"
        );
        Ok((
            CachedWindow {
                reference,
                observed,
            },
            true,
        ))
    }

    fn analyze_conversions(
        &self,
        event: &EventRecord,
        conversions: Option<&EventConversions>,
    ) -> (
        Option<spotlift_funnel::FunnelReport>,
        Option<spotlift_funnel::control::ComparisonMap>,
        Vec<spotlift_core::ValidationFlag>,
    ) {
        let Some(conversions) = conversions else {
            return (None, None, Vec::new());
        };
        let funnel = self
            .funnel
            .analyze_funnel(event, &conversions.spot, &conversions.reference);
        match &conversions.control {
            Some(control) => {
                let (comparison, flags) =
                    self.funnel.compare_control_groups(&conversions.spot, control);
                (Some(funnel), Some(comparison), flags)
            }
            None => (Some(funnel), None, Vec::new()),
        }
    }

    async fn predict(
        &self,
        event: &EventRecord,
        samples: Vec<MetricSample>,
        conversions: Option<&EventConversions>,
        notes: &mut Vec<String>,
    ) -> Option<spotlift_predict::PredictionBundle> {
        let prior_impacts = match self.source.prior_impacts(event).await {
            Ok(priors) => priors,
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "Prior impacts unavailable");
                notes.push(format!("prior impacts unavailable: {e}"));
                Vec::new()
            }
        };
        let funnel_baseline = match self.source.funnel_baseline().await {
            Ok(Some(baseline)) => Some(baseline),
            Ok(None) => conversions.map(|c| c.reference.clone()),
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "Funnel baseline unavailable");
                notes.push(format!("funnel baseline unavailable: {e}"));
                None
            }
        };
        let historical = HistoricalData {
            samples,
            prior_impacts,
            funnel_baseline,
        };

        match self.predictor.project(event, &historical, &self.market) {
            Ok(bundle) => Some(bundle),
            Err(e) => {
                warn!(event_id = %event.id, error = %e, "Prediction failed");
                notes.push(format!("prediction failed: {e}"));
                None
            }
        }
    }

    async fn fetch_with_retry(
        &self,
        event: &EventRecord,
        what: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SpotliftResult<Vec<MetricSample>> {
        let mut attempt = 0u32;
        loop {
            match self.source.fetch_samples(start, end).await {
                Ok(samples) => return Ok(samples),
                Err(e) if e.is_degradable() && attempt < self.config.fetch_retries => {
                    attempt += 1;
                    let backoff = self.backoff(attempt);
                    debug!(
                        event_id = %event.id,
                        what,
                        attempt,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %e,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => {
                    metrics::counter!("engine.fetch_failures").increment(1);
                    warn!(
                        event_id = %event.id,
                        what,
                        attempts = attempt + 1,
                        error = %e,
                        "Fetch failed"
                    );
                    return Err(e);
                }
            }
        }
    }

    /// Exponential backoff with up to 50% random jitter.
    fn backoff(&self, attempt: u32) -> Duration {
        let base = self
            .config
            .retry_backoff_ms
            .saturating_mul(1u64 << attempt.saturating_sub(1).min(10));
        let jitter = rand::thread_rng().gen_range(0..=base / 2);
        Duration::from_millis(base + jitter)
    }

    /// Analyze events on a bounded worker pool.
    ///
    /// Results come back in input order. Setting `cancel` to `true` stops the
    /// batch: finished results are kept and every other event gets the
    /// degraded insufficient-data result. A slow or failing event never
    /// affects its siblings.
    pub async fn analyze_batch(
        &self,
        events: Vec<EventRecord>,
        mut cancel: watch::Receiver<bool>,
    ) -> BatchReport {
        let workers = self.config.workers.max(1);
        let timeout = Duration::from_millis(self.config.event_timeout_ms);
        info!(events = events.len(), workers, "Batch analysis started");

        let this = Arc::new(self.clone());
        let semaphore = Arc::new(Semaphore::new(workers));
        let mut set = JoinSet::new();

        for (index, event) in events.iter().cloned().enumerate() {
            let this = this.clone();
            let semaphore = semaphore.clone();
            set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        let closed = SpotliftError::Internal(anyhow!("worker pool closed"));
                        return (index, this.insufficient(&event, &closed));
                    }
                };
                match tokio::time::timeout(timeout, this.analyze_event(&event)).await {
                    Ok(analysis) => (index, analysis),
                    Err(_) => {
                        warn!(
                            event_id = %event.id,
                            timeout_ms = timeout.as_millis() as u64,
                            "Event analysis timed out"
                        );
                        let timed_out = SpotliftError::Timeout(timeout.as_millis() as u64);
                        (index, this.insufficient(&event, &timed_out))
                    }
                }
            });
        }

        let mut results: Vec<Option<EventAnalysis>> = vec![None; events.len()];
        let mut cancelled = *cancel.borrow();
        let mut listening = true;

        while !cancelled {
            tokio::select! {
                joined = set.join_next() => match joined {
                    None => break,
                    Some(Ok((index, analysis))) => results[index] = Some(analysis),
                    Some(Err(e)) => error!(error = %e, "Analysis task panicked"),
                },
                changed = cancel.changed(), if listening => match changed {
                    Ok(()) => cancelled = *cancel.borrow(),
                    Err(_) => listening = false,
                },
            }
        }

        if cancelled {
            warn!(remaining = set.len(), "Batch cancelled");
            set.abort_all();
            while let Some(joined) = set.join_next().await {
                if let Ok((index, analysis)) = joined {
                    results[index] = Some(analysis);
                }
            }
        }

        let cause = if cancelled {
            SpotliftError::InsufficientData("analysis cancelled".to_string())
        } else {
            SpotliftError::Internal(anyhow!("analysis task failed"))
        };
        let analyses: Vec<EventAnalysis> = results
            .into_iter()
            .zip(&events)
            .map(|(result, event)| result.unwrap_or_else(|| self.insufficient(event, &cause)))
            .collect();

        let report = BatchReport::new(analyses, cancelled);
        info!(
            total = report.summary.total,
            complete = report.summary.complete,
            degraded = report.summary.degraded,
            unavailable = report.summary.unavailable,
            cancelled,
            "Batch analysis finished"
        );
        report
    }

    /// Zero-valued, zero-confidence result for an event that could not finish.
    pub fn insufficient(&self, event: &EventRecord, cause: &SpotliftError) -> EventAnalysis {
        let reason = cause.to_string();
        let analysis = match event.timestamp {
            None => EventAnalysis::unavailable(event, reason),
            Some(event_time) => {
                let observed: BTreeMap<TimeWindow, WindowMetrics> = TimeWindow::ALL
                    .iter()
                    .map(|w| {
                        let mut metrics = WindowMetrics::new();
                        fill_core_metrics(&mut metrics);
                        (*w, metrics)
                    })
                    .collect();
                EventAnalysis {
                    event_id: event.id.clone(),
                    status: AnalysisStatus::Degraded,
                    notes: vec![reason],
                    impact: self.impact.analyze_temporal_impact(
                        event,
                        &observed,
                        &self.references.compute_reference(event_time, &[]),
                    ),
                    funnel: None,
                    control: None,
                    prediction: None,
                    validation: Vec::new(),
                }
            }
        };
        record_outcome(&analysis);
        analysis
    }
}

impl std::fmt::Debug for AnalysisOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalysisOrchestrator")
            .field("config", &self.config)
            .field("cache", &self.cache)
            .finish()
    }
}

/// A window `[start, end)` is complete once `now` has passed its end and the
/// source holds data for its last hour (or, for sub-hour windows, from its start).
fn window_is_complete(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    horizon: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    if end > now {
        return false;
    }
    let last_slot = (end - SAMPLE_GRANULARITY).max(start);
    horizon.map_or(true, |h| h >= last_slot)
}

fn fill_core_metrics(metrics: &mut WindowMetrics) {
    for metric in CORE_METRICS {
        metrics.entry(metric).or_insert(0.0);
    }
}

fn record_outcome(analysis: &EventAnalysis) {
    metrics::counter!("engine.events_analyzed").increment(1);
    match analysis.status {
        AnalysisStatus::Complete => {}
        AnalysisStatus::Degraded => metrics::counter!("engine.events_degraded").increment(1),
        AnalysisStatus::Unavailable => {
            metrics::counter!("engine.events_unavailable").increment(1)
        }
    }
}
