//! Reference calculator: builds a robust per-window baseline for an event
//! timestamp from historically comparable periods.

use chrono::{DateTime, Datelike, Duration, DurationRound, Timelike, Utc};
use spotlift_core::types::{
    MetricName, MetricSample, ReferenceMap, ReferenceStatistic, WindowMetrics, WindowReference,
};
use spotlift_core::{stats, TimeWindow};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Confidence ceiling for a baseline, in percent.
const MAX_REFERENCE_CONFIDENCE: f64 = 95.0;

/// Selects comparable historical periods and summarizes them per window.
#[derive(Debug, Clone)]
pub struct ReferenceCalculator {
    weekday_tolerance: u32,
    hour_tolerance: u32,
}

impl ReferenceCalculator {
    pub fn new() -> Self {
        Self {
            weekday_tolerance: 1,
            hour_tolerance: 2,
        }
    }

    /// Baseline statistics for every window and metric.
    ///
    /// Windows without comparable periods get the zero-sample baseline,
    /// which is a valid degraded result rather than an error.
    pub fn compute_reference(
        &self,
        event_timestamp: DateTime<Utc>,
        historical_samples: &[MetricSample],
    ) -> ReferenceMap {
        let sorted = sorted_samples(historical_samples);
        let anchors = self.comparable_anchors(event_timestamp, &sorted);

        TimeWindow::ALL
            .iter()
            .map(|window| {
                (
                    *window,
                    self.window_reference_sorted(event_timestamp, *window, &sorted, &anchors),
                )
            })
            .collect()
    }

    /// Baseline statistics for a single window.
    pub fn compute_window_reference(
        &self,
        event_timestamp: DateTime<Utc>,
        window: TimeWindow,
        historical_samples: &[MetricSample],
    ) -> WindowReference {
        let sorted = sorted_samples(historical_samples);
        let anchors = self.comparable_anchors(event_timestamp, &sorted);
        self.window_reference_sorted(event_timestamp, window, &sorted, &anchors)
    }

    fn window_reference_sorted(
        &self,
        event_timestamp: DateTime<Utc>,
        window: TimeWindow,
        sorted: &[&MetricSample],
        anchors: &BTreeSet<DateTime<Utc>>,
    ) -> WindowReference {
        let mut observations: BTreeMap<MetricName, Vec<f64>> = BTreeMap::new();
        let mut periods = 0usize;

        for anchor in anchors {
            let (start, end) = window.bounds(*anchor);
            // The period must close before the spot airs.
            if end > event_timestamp {
                continue;
            }
            let period = slice_between(sorted, start, end);
            if period.is_empty() {
                continue;
            }
            periods += 1;
            for (metric, value) in aggregate(period) {
                observations.entry(metric).or_default().push(value);
            }
        }

        debug!(window = %window, periods, "Comparable periods selected");

        MetricName::ALL
            .iter()
            .map(|metric| {
                let stat = observations
                    .get(metric)
                    .map(|values| summarize(values))
                    .unwrap_or_else(ReferenceStatistic::insufficient);
                (*metric, stat)
            })
            .collect()
    }

    /// Hour-truncated timestamps of samples that fall on a similar weekday
    /// and hour of day as the event.
    fn comparable_anchors(
        &self,
        event_timestamp: DateTime<Utc>,
        sorted: &[&MetricSample],
    ) -> BTreeSet<DateTime<Utc>> {
        let event_weekday = event_timestamp.weekday().num_days_from_monday();
        let event_hour = event_timestamp.hour();

        sorted
            .iter()
            .filter(|s| s.timestamp < event_timestamp)
            .filter(|s| {
                circular_distance(s.timestamp.weekday().num_days_from_monday(), event_weekday, 7)
                    <= self.weekday_tolerance
                    && circular_distance(s.timestamp.hour(), event_hour, 24) <= self.hour_tolerance
            })
            .map(|s| truncate_to_hour(s.timestamp))
            .collect()
    }
}

impl Default for ReferenceCalculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate the samples observed in `window` after `event_timestamp`.
pub fn aggregate_window(
    event_timestamp: DateTime<Utc>,
    samples: &[MetricSample],
    window: TimeWindow,
) -> WindowMetrics {
    let (start, end) = window.bounds(event_timestamp);
    let in_window: Vec<&MetricSample> = samples
        .iter()
        .filter(|s| s.timestamp >= start && s.timestamp < end)
        .collect();
    aggregate(&in_window)
}

/// Sum additive metrics and average the rest. Optional metrics appear only
/// when at least one sample carries them.
fn aggregate(samples: &[&MetricSample]) -> WindowMetrics {
    let mut metrics = WindowMetrics::new();
    for metric in MetricName::ALL {
        let values: Vec<f64> = samples.iter().filter_map(|s| s.value(metric)).collect();
        if values.is_empty() {
            continue;
        }
        let value = if metric.is_additive() {
            values.iter().sum()
        } else {
            stats::mean(&values)
        };
        metrics.insert(metric, value);
    }
    metrics
}

fn summarize(values: &[f64]) -> ReferenceStatistic {
    let sample_size = values.len();
    ReferenceStatistic {
        mean: stats::mean(values),
        median: stats::median(values),
        std_dev: stats::std_dev(values),
        confidence: reference_confidence(sample_size),
        sample_size,
    }
}

/// `min(95, 60 + 2n)` for a non-empty baseline, `0` otherwise.
pub fn reference_confidence(sample_size: usize) -> f64 {
    if sample_size == 0 {
        return 0.0;
    }
    (60.0 + 2.0 * sample_size as f64).min(MAX_REFERENCE_CONFIDENCE)
}

fn sorted_samples(samples: &[MetricSample]) -> Vec<&MetricSample> {
    let mut sorted: Vec<&MetricSample> = samples.iter().collect();
    sorted.sort_by_key(|s| s.timestamp);
    sorted
}

fn slice_between<'a>(
    sorted: &'a [&'a MetricSample],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> &'a [&'a MetricSample] {
    let lo = sorted.partition_point(|s| s.timestamp < start);
    let hi = sorted.partition_point(|s| s.timestamp < end);
    &sorted[lo..hi.max(lo)]
}

fn circular_distance(a: u32, b: u32, modulus: u32) -> u32 {
    let d = (a as i64 - b as i64).rem_euclid(modulus as i64) as u32;
    d.min(modulus - d)
}

fn truncate_to_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(Duration::hours(1)).unwrap_or(ts)
}
