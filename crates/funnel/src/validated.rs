//! Validation decorator for the funnel analyzer.

use crate::analyzer::FunnelAnalyzer;
use crate::control::ComparisonMap;
use crate::types::{ConversionData, FunnelReport, StageMetrics};
use spotlift_core::types::EventRecord;
use spotlift_core::validation::{AnomalyGate, Validate, ValidationFlag, ValueKind};

#[derive(Debug, Clone)]
pub struct ValidatedFunnelAnalyzer {
    inner: FunnelAnalyzer,
    gate: AnomalyGate,
}

impl ValidatedFunnelAnalyzer {
    pub fn new(inner: FunnelAnalyzer, gate: AnomalyGate) -> Self {
        Self { inner, gate }
    }

    pub fn analyze_funnel(
        &self,
        event: &EventRecord,
        conversion_data: &ConversionData,
        reference: &ConversionData,
    ) -> FunnelReport {
        let mut report = self.inner.analyze_funnel(event, conversion_data, reference);
        report.validate(&self.gate);
        report
    }

    /// Control lift per stage. Rejections are returned alongside the map.
    pub fn compare_control_groups(
        &self,
        spot_funnel: &ConversionData,
        control_funnel: &ConversionData,
    ) -> (ComparisonMap, Vec<ValidationFlag>) {
        let mut comparison = self.inner.compare_control_groups(spot_funnel, control_funnel);
        let mut flags = Vec::new();
        for (stage, c) in comparison.iter_mut() {
            let prefix = format!("control.{stage}");
            self.gate
                .check(&mut c.spot_count, ValueKind::Count, format!("{prefix}.spot_count"), &mut flags);
            self.gate.check(
                &mut c.control_count,
                ValueKind::Count,
                format!("{prefix}.control_count"),
                &mut flags,
            );
            self.gate
                .check(&mut c.lift, ValueKind::Change, format!("{prefix}.lift"), &mut flags);
        }
        (comparison, flags)
    }
}

fn check_metrics(
    gate: &AnomalyGate,
    metrics: &mut StageMetrics,
    prefix: &str,
    flags: &mut Vec<ValidationFlag>,
) {
    gate.check(&mut metrics.count, ValueKind::Count, format!("{prefix}.count"), flags);
    gate.check(&mut metrics.rate, ValueKind::Rate, format!("{prefix}.rate"), flags);
    gate.check(&mut metrics.revenue, ValueKind::Count, format!("{prefix}.revenue"), flags);
}

impl Validate for FunnelReport {
    fn validate(&mut self, gate: &AnomalyGate) {
        let mut flags = std::mem::take(&mut self.validation);

        for (kind, stage) in self.stages.iter_mut() {
            let prefix = format!("funnel.{kind}");
            check_metrics(gate, &mut stage.metrics, &prefix, &mut flags);
            check_metrics(
                gate,
                &mut stage.reference_metrics,
                &format!("{prefix}.reference"),
                &mut flags,
            );
            gate.check(
                &mut stage.impact.count_change,
                ValueKind::Change,
                format!("{prefix}.count_change"),
                &mut flags,
            );
            gate.check(
                &mut stage.impact.revenue_change,
                ValueKind::Change,
                format!("{prefix}.revenue_change"),
                &mut flags,
            );
            gate.check(
                &mut stage.confidence,
                ValueKind::Confidence,
                format!("{prefix}.confidence"),
                &mut flags,
            );
            gate.check(
                &mut stage.drop_off_rate,
                ValueKind::Rate,
                format!("{prefix}.drop_off_rate"),
                &mut flags,
            );
        }

        gate.check(
            &mut self.overall_conversion_rate,
            ValueKind::Rate,
            "funnel.overall_conversion_rate",
            &mut flags,
        );
        gate.check(&mut self.roi.roi, ValueKind::Change, "funnel.roi", &mut flags);

        self.validation = flags;
    }
}
