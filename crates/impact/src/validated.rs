//! Validation decorator for the impact analyzer. Wraps the pure analyzer and
//! passes every reported value through the anomaly gate.

use crate::impact::{WindowImpactAnalyzer, SIGNIFICANCE_THRESHOLD_PCT};
use spotlift_core::types::{EventRecord, ImpactMap, ReferenceMap, WindowMetrics, WindowReport};
use spotlift_core::validation::{AnomalyGate, ValueKind};
use spotlift_core::TimeWindow;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct ValidatedImpactAnalyzer {
    inner: WindowImpactAnalyzer,
    gate: AnomalyGate,
}

impl ValidatedImpactAnalyzer {
    pub fn new(inner: WindowImpactAnalyzer, gate: AnomalyGate) -> Self {
        Self { inner, gate }
    }

    pub fn inner(&self) -> &WindowImpactAnalyzer {
        &self.inner
    }

    pub fn gate(&self) -> &AnomalyGate {
        &self.gate
    }

    pub fn analyze_temporal_impact(
        &self,
        event: &EventRecord,
        actual_metrics_per_window: &BTreeMap<TimeWindow, WindowMetrics>,
        reference_map: &ReferenceMap,
    ) -> ImpactMap {
        let mut impacts =
            self.inner
                .analyze_temporal_impact(event, actual_metrics_per_window, reference_map);
        for report in impacts.values_mut() {
            self.validate_report(report);
        }
        impacts
    }

    /// Gate the values of one window report. A rejected window or reference
    /// value voids the changes derived from it; significance is re-scored from
    /// the surviving values.
    pub fn validate_report(&self, report: &mut WindowReport) {
        let window = report.window;
        let mut flags = std::mem::take(&mut report.validation);

        for (metric, impact) in report.metrics.iter_mut() {
            let prefix = format!("{window}.{metric}");
            let before = flags.len();
            self.gate.check(
                &mut impact.window_value,
                ValueKind::Count,
                format!("{prefix}.window_value"),
                &mut flags,
            );
            self.gate.check(
                &mut impact.reference_value,
                ValueKind::Count,
                format!("{prefix}.reference_value"),
                &mut flags,
            );
            if flags.len() > before {
                impact.absolute_change = 0.0;
                impact.percentage_change = 0.0;
                impact.effect_size = 0.0;
            }
            self.gate.check(
                &mut impact.percentage_change,
                ValueKind::Change,
                format!("{prefix}.percentage_change"),
                &mut flags,
            );
            impact.is_significant = impact.percentage_change.abs() > SIGNIFICANCE_THRESHOLD_PCT;
        }

        self.gate.check(
            &mut report.confidence,
            ValueKind::Confidence,
            format!("{window}.confidence"),
            &mut flags,
        );

        report.significance = self.inner.significance().score_significance(&report.metrics);
        report.validation = flags;
    }
}
