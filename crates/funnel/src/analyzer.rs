//! Funnel analysis: tracks how a spot moved users through the conversion path
//! compared with a reference period.

use crate::roi::RoiSummary;
use crate::stats::{cohens_h, two_proportion_z_test, EffectSizeClass};
use crate::types::{
    ConversionData, FunnelReport, FunnelStage, FunnelStageKind, StageImpact, StageMetrics,
    StageSignificance,
};
use spotlift_core::types::{EventRecord, Priority, Recommendation, RecommendationCategory};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FunnelAnalyzer {
    significance_level: f64,
    drop_off_alert_pct: f64,
}

impl FunnelAnalyzer {
    pub fn new() -> Self {
        Self {
            significance_level: 0.05,
            drop_off_alert_pct: 70.0,
        }
    }

    pub fn analyze_funnel(
        &self,
        event: &EventRecord,
        conversion_data: &ConversionData,
        reference: &ConversionData,
    ) -> FunnelReport {
        let stages: BTreeMap<FunnelStageKind, FunnelStage> = FunnelStageKind::ALL
            .iter()
            .map(|stage| (*stage, self.analyze_stage(*stage, conversion_data, reference)))
            .collect();

        let impressions = conversion_data.count(FunnelStageKind::Impressions);
        let conversions = conversion_data.count(FunnelStageKind::Conversion);
        let overall_conversion_rate = if impressions > 0.0 {
            conversions / impressions * 100.0
        } else {
            0.0
        };

        let cost = if conversion_data.cost > 0.0 {
            conversion_data.cost
        } else {
            event.investment.unwrap_or(0.0)
        };
        let roi = RoiSummary::compute(conversion_data.total_revenue(), cost, conversions);

        debug!(
            event_id = %event.id,
            overall_conversion_rate,
            roi = roi.roi,
            "Funnel analyzed"
        );

        FunnelReport {
            event_id: event.id.clone(),
            stages,
            overall_conversion_rate,
            roi,
            validation: Vec::new(),
        }
    }

    fn analyze_stage(
        &self,
        stage: FunnelStageKind,
        data: &ConversionData,
        reference: &ConversionData,
    ) -> FunnelStage {
        let metrics = stage_metrics(stage, data);
        let reference_metrics = stage_metrics(stage, reference);

        let impact = StageImpact {
            count_change: percent_change(metrics.count, reference_metrics.count),
            revenue_change: percent_change(metrics.revenue, reference_metrics.revenue),
        };

        let significance = self.stage_significance(stage, data, reference);
        let confidence = ((1.0 - significance.p_value) * 100.0).clamp(0.0, 100.0);

        let drop_off_rate = match stage.previous() {
            Some(prev) => drop_off(data.count(prev), metrics.count),
            None => 0.0,
        };

        let recommendations =
            self.stage_recommendations(stage, &impact, &significance, drop_off_rate);

        FunnelStage {
            stage,
            metrics,
            reference_metrics,
            impact,
            significance,
            confidence,
            drop_off_rate,
            recommendations,
        }
    }

    /// Two-proportion test of the stage's step conversion (count over the
    /// previous stage's count) between two funnels.
    pub(crate) fn stage_significance(
        &self,
        stage: FunnelStageKind,
        a: &ConversionData,
        b: &ConversionData,
    ) -> StageSignificance {
        let (x1, n1) = trials(stage, a);
        let (x2, n2) = trials(stage, b);
        let test = two_proportion_z_test(x1, n1, x2, n2);
        let h = cohens_h(test.p1, test.p2);

        StageSignificance {
            z_score: test.z_score,
            p_value: test.p_value,
            cohens_h: h,
            is_significant: test.p_value < self.significance_level,
            effect_size: EffectSizeClass::from_cohens_h(h),
        }
    }

    fn stage_recommendations(
        &self,
        stage: FunnelStageKind,
        impact: &StageImpact,
        significance: &StageSignificance,
        drop_off_rate: f64,
    ) -> Vec<Recommendation> {
        let mut recs = Vec::new();

        if let Some(prev) = stage.previous() {
            if drop_off_rate > self.drop_off_alert_pct {
                recs.push(Recommendation {
                    category: RecommendationCategory::Funnel,
                    priority: Priority::High,
                    title: format!("High drop-off between {prev} and {stage}"),
                    detail: format!(
                        "{drop_off_rate:.1}% of users are lost before the {stage} stage; \
                         review the hand-off between the spot's call to action and this step."
                    ),
                });
            }
        }

        if significance.is_significant && impact.count_change < 0.0 {
            recs.push(Recommendation {
                category: RecommendationCategory::Funnel,
                priority: Priority::Medium,
                title: format!("{stage} below reference"),
                detail: format!(
                    "{stage} volume is {:.1}% below the reference period (p = {:.3}).",
                    impact.count_change.abs(),
                    significance.p_value
                ),
            });
        } else if significance.is_significant && impact.count_change > 0.0 {
            recs.push(Recommendation {
                category: RecommendationCategory::Funnel,
                priority: Priority::Low,
                title: format!("{stage} lifted by the spot"),
                detail: format!(
                    "{stage} volume is {:.1}% above the reference period (p = {:.3}).",
                    impact.count_change, significance.p_value
                ),
            });
        }

        recs
    }
}

impl Default for FunnelAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// Count and step rate for a stage. The first stage's rate is 100% when it has volume.
pub fn stage_metrics(stage: FunnelStageKind, data: &ConversionData) -> StageMetrics {
    let count = data.count(stage);
    let rate = match stage.previous() {
        Some(prev) => {
            let prev_count = data.count(prev);
            if prev_count > 0.0 {
                count / prev_count * 100.0
            } else {
                0.0
            }
        }
        None if count > 0.0 => 100.0,
        None => 0.0,
    };
    StageMetrics {
        count,
        rate,
        revenue: data.revenue(stage),
    }
}

/// Percentage of the previous stage lost before this one.
pub fn drop_off(previous_count: f64, count: f64) -> f64 {
    if previous_count > 0.0 {
        (previous_count - count) / previous_count * 100.0
    } else {
        0.0
    }
}

fn percent_change(value: f64, reference: f64) -> f64 {
    if reference > 0.0 {
        (value - reference) / reference * 100.0
    } else {
        0.0
    }
}

fn trials(stage: FunnelStageKind, data: &ConversionData) -> (f64, f64) {
    let count = data.count(stage);
    let n = stage.previous().map(|p| data.count(p)).unwrap_or(count);
    (count, n)
}
