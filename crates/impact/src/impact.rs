//! Window impact analyzer: compares what happened after a spot against
//! the baseline for each window.

use crate::significance::SignificanceEngine;
use spotlift_core::types::{
    EventRecord, ImpactMap, MetricName, ReferenceMap, ReferenceStatistic, WindowImpact,
    WindowMetrics, WindowReference, WindowReport, WindowStatus,
};
use spotlift_core::TimeWindow;
use std::collections::BTreeMap;
use tracing::debug;

/// Minimum absolute percentage change treated as significant. Calibration constant.
pub const SIGNIFICANCE_THRESHOLD_PCT: f64 = 10.0;

#[derive(Debug, Clone, Default)]
pub struct WindowImpactAnalyzer {
    significance: SignificanceEngine,
}

impl WindowImpactAnalyzer {
    pub fn new(significance: SignificanceEngine) -> Self {
        Self { significance }
    }

    pub fn significance(&self) -> &SignificanceEngine {
        &self.significance
    }

    pub fn compare_to_reference(&self, actual: f64, reference: &ReferenceStatistic) -> WindowImpact {
        let absolute_change = actual - reference.mean;
        let percentage_change = if reference.mean > 0.0 {
            absolute_change / reference.mean * 100.0
        } else {
            0.0
        };
        let effect_size = if reference.std_dev > 0.0 {
            absolute_change / reference.std_dev
        } else {
            0.0
        };

        WindowImpact {
            window_value: actual,
            reference_value: reference.mean,
            absolute_change,
            percentage_change,
            is_significant: percentage_change.abs() > SIGNIFICANCE_THRESHOLD_PCT,
            effect_size,
        }
    }

    /// Impact of one event in one window.
    pub fn analyze_window(
        &self,
        window: TimeWindow,
        actual: Option<&WindowMetrics>,
        reference: Option<&WindowReference>,
    ) -> WindowReport {
        let actual = match (actual.filter(|a| !a.is_empty()), reference) {
            (Some(actual), Some(_)) => actual,
            (observed, _) => {
                // Nothing to compare: no actuals means nothing was measured.
                let confidence = match observed {
                    Some(actual) => self.significance.confidence_for(actual, None),
                    None => 0.0,
                };
                return WindowReport {
                    window,
                    label: window.label().to_string(),
                    status: WindowStatus::InsufficientData,
                    significance: self.significance.score_significance(&BTreeMap::new()),
                    confidence,
                    metrics: BTreeMap::new(),
                    validation: Vec::new(),
                };
            }
        };

        let metrics: BTreeMap<MetricName, WindowImpact> = actual
            .iter()
            .map(|(metric, value)| {
                let stat = reference
                    .and_then(|r| r.get(metric))
                    .copied()
                    .unwrap_or_else(ReferenceStatistic::insufficient);
                (*metric, self.compare_to_reference(*value, &stat))
            })
            .collect();

        let has_baseline = reference.is_some_and(|r| {
            actual
                .keys()
                .any(|m| r.get(m).is_some_and(|s| !s.is_insufficient()))
        });
        let status = if has_baseline {
            WindowStatus::Measured
        } else {
            WindowStatus::InsufficientData
        };

        WindowReport {
            window,
            label: window.label().to_string(),
            status,
            significance: self.significance.score_significance(&metrics),
            confidence: self.significance.confidence_for(actual, reference),
            metrics,
            validation: Vec::new(),
        }
    }

    /// Impact of one event across all four windows. Pure: identical inputs
    /// produce identical output.
    pub fn analyze_temporal_impact(
        &self,
        event: &EventRecord,
        actual_metrics_per_window: &BTreeMap<TimeWindow, WindowMetrics>,
        reference_map: &ReferenceMap,
    ) -> ImpactMap {
        TimeWindow::ALL
            .iter()
            .map(|window| {
                let report = self.analyze_window(
                    *window,
                    actual_metrics_per_window.get(window),
                    reference_map.get(window),
                );
                debug!(
                    event_id = %event.id,
                    window = %window,
                    significant = report.significance.significant_metric_count,
                    confidence = report.confidence,
                    "Window impact computed"
                );
                (*window, report)
            })
            .collect()
    }
}
