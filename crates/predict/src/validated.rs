//! Validation decorator for the projector.

use crate::projector::Predictor;
use crate::types::{HistoricalData, MarketData, PredictionBundle};
use spotlift_core::types::EventRecord;
use spotlift_core::validation::{AnomalyGate, Validate, ValueKind};
use spotlift_core::SpotliftResult;

#[derive(Debug, Clone)]
pub struct ValidatedPredictor {
    inner: Predictor,
    gate: AnomalyGate,
}

impl ValidatedPredictor {
    pub fn new(inner: Predictor, gate: AnomalyGate) -> Self {
        Self { inner, gate }
    }

    pub fn inner(&self) -> &Predictor {
        &self.inner
    }

    pub fn project(
        &self,
        event: &EventRecord,
        historical_data: &HistoricalData,
        market_data: &MarketData,
    ) -> SpotliftResult<PredictionBundle> {
        let mut bundle = self.inner.project(event, historical_data, market_data)?;
        bundle.validate(&self.gate);
        if !bundle.validation.is_empty() {
            // Risk, recommendations and confidence were derived from raw values.
            self.inner.reassess(&mut bundle, historical_data, market_data);
            let mut flags = std::mem::take(&mut bundle.validation);
            flags.retain(|f| f.field != "confidence");
            self.gate.check(&mut bundle.confidence, ValueKind::Probability, "confidence", &mut flags);
            bundle.validation = flags;
        }
        Ok(bundle)
    }
}

impl Validate for PredictionBundle {
    fn validate(&mut self, gate: &AnomalyGate) {
        let mut flags = std::mem::take(&mut self.validation);

        for (window, p) in self.performance.windows.iter_mut() {
            let prefix = format!("performance.{window}");
            for (name, value) in [
                ("baseline", &mut p.baseline),
                ("projected", &mut p.projected),
                ("incremental", &mut p.incremental),
                ("lower_bound", &mut p.lower_bound),
                ("upper_bound", &mut p.upper_bound),
            ] {
                gate.check(value, ValueKind::Count, format!("{prefix}.{name}"), &mut flags);
            }
            gate.check(
                &mut p.expected_lift_pct,
                ValueKind::Change,
                format!("{prefix}.expected_lift_pct"),
                &mut flags,
            );
        }

        gate.check(
            &mut self.performance.historical_average,
            ValueKind::Count,
            "performance.historical_average",
            &mut flags,
        );

        for (window, r) in self.roi.windows.iter_mut() {
            let prefix = format!("roi.{window}");
            gate.check(&mut r.revenue, ValueKind::Count, format!("{prefix}.revenue"), &mut flags);
            gate.check(&mut r.roi, ValueKind::Change, format!("{prefix}.roi"), &mut flags);
        }
        gate.check(&mut self.roi.total_revenue, ValueKind::Count, "roi.total_revenue", &mut flags);
        gate.check(&mut self.roi.total_roi, ValueKind::Change, "roi.total_roi", &mut flags);
        gate.check(&mut self.roi.total_roas, ValueKind::Count, "roi.total_roas", &mut flags);
        gate.check(
            &mut self.roi.confidence,
            ValueKind::Probability,
            "roi.confidence",
            &mut flags,
        );

        for (window, e) in self.engagement.categories.iter_mut() {
            gate.check(
                &mut e.score,
                ValueKind::Count,
                format!("engagement.{window}.score"),
                &mut flags,
            );
        }
        gate.check(
            &mut self.engagement.overall_score,
            ValueKind::Count,
            "engagement.overall_score",
            &mut flags,
        );

        for (stage, s) in self.conversions.stages.iter_mut() {
            let prefix = format!("conversions.{stage}");
            gate.check(&mut s.count, ValueKind::Count, format!("{prefix}.count"), &mut flags);
            gate.check(&mut s.rate, ValueKind::Rate, format!("{prefix}.rate"), &mut flags);
            gate.check(
                &mut s.drop_off_rate,
                ValueKind::Rate,
                format!("{prefix}.drop_off_rate"),
                &mut flags,
            );
        }
        gate.check(
            &mut self.conversions.expected_conversions,
            ValueKind::Count,
            "conversions.expected_conversions",
            &mut flags,
        );
        gate.check(
            &mut self.conversions.expected_revenue,
            ValueKind::Count,
            "conversions.expected_revenue",
            &mut flags,
        );
        gate.check(
            &mut self.conversions.overall_conversion_rate,
            ValueKind::Rate,
            "conversions.overall_conversion_rate",
            &mut flags,
        );

        gate.check(&mut self.confidence, ValueKind::Probability, "confidence", &mut flags);

        self.validation = flags;
    }
}
