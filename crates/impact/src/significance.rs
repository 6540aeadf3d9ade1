//! Significance engine: rolls per-metric impacts into a window-level verdict
//! and scores how much the baseline can be trusted.

use serde::{Deserialize, Serialize};
use spotlift_core::types::{
    MetricName, ReferenceStatistic, SignificanceResult, WindowImpact, WindowMetrics,
    WindowReference,
};
use std::collections::BTreeMap;

/// Confidence returned when no baseline exists at all.
pub const NEUTRAL_CONFIDENCE: f64 = 50.0;
const MIN_CONFIDENCE: f64 = 50.0;
const MAX_CONFIDENCE: f64 = 95.0;
/// Coefficient of variation below which a baseline counts as stable.
const STABLE_CV: f64 = 0.3;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignificanceEngine;

impl SignificanceEngine {
    pub fn new() -> Self {
        Self
    }

    /// Share of metrics whose change crossed the significance threshold.
    pub fn score_significance(
        &self,
        impacts: &BTreeMap<MetricName, WindowImpact>,
    ) -> SignificanceResult {
        let total_metric_count = impacts.len();
        let significant_metric_count = impacts.values().filter(|i| i.is_significant).count();
        let overall_ratio = if total_metric_count > 0 {
            significant_metric_count as f64 / total_metric_count as f64
        } else {
            0.0
        };

        SignificanceResult {
            overall_ratio,
            significant_metric_count,
            total_metric_count,
            effect_sizes: impacts.values().map(|i| i.effect_size).collect(),
        }
    }

    /// Window confidence: the mean per-metric confidence over the metrics
    /// observed in the window (or, when none were observed, over the baseline's metrics).
    pub fn confidence_for(
        &self,
        window_metrics: &WindowMetrics,
        reference: Option<&WindowReference>,
    ) -> f64 {
        let Some(reference) = reference else {
            return NEUTRAL_CONFIDENCE;
        };

        let metrics: Vec<MetricName> = if window_metrics.is_empty() {
            reference.keys().copied().collect()
        } else {
            window_metrics.keys().copied().collect()
        };
        if metrics.is_empty() {
            return NEUTRAL_CONFIDENCE;
        }

        let total: f64 = metrics
            .iter()
            .map(|m| self.metric_confidence(reference.get(m)))
            .sum();
        total / metrics.len() as f64
    }

    /// Confidence in a single metric's baseline, in `[0, 95]`.
    pub fn metric_confidence(&self, reference: Option<&ReferenceStatistic>) -> f64 {
        let Some(reference) = reference else {
            return NEUTRAL_CONFIDENCE;
        };
        if reference.is_insufficient() {
            return 0.0;
        }

        let mut confidence = reference.confidence;
        if reference.sample_size >= 30 {
            confidence += 10.0;
        } else if reference.sample_size >= 15 {
            confidence += 5.0;
        }
        if reference
            .coefficient_of_variation()
            .is_some_and(|cv| cv < STABLE_CV)
        {
            confidence += 5.0;
        }
        confidence.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
    }
}
