//! Forward funnel projection.

use serde::{Deserialize, Serialize};
use spotlift_funnel::analyzer::{drop_off, stage_metrics};
use spotlift_funnel::{ConversionData, FunnelStageKind};
use std::collections::BTreeMap;

/// Step conversion rates as fractions of the previous stage.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRates {
    pub click_through: f64,
    pub landing: f64,
    pub engagement: f64,
    pub conversion: f64,
}

impl Default for StepRates {
    fn default() -> Self {
        Self {
            click_through: 0.02,
            landing: 0.60,
            engagement: 0.40,
            conversion: 0.10,
        }
    }
}

impl StepRates {
    /// Rates observed in a baseline funnel. Stages without volume keep the default rate.
    pub fn from_baseline(baseline: Option<&ConversionData>) -> Self {
        let defaults = Self::default();
        let Some(data) = baseline else {
            return defaults;
        };
        let observed = |stage: FunnelStageKind, fallback: f64| {
            let rate = stage_metrics(stage, data).rate / 100.0;
            if rate > 0.0 && rate.is_finite() {
                rate.min(1.0)
            } else {
                fallback
            }
        };
        Self {
            click_through: observed(FunnelStageKind::Clicks, defaults.click_through),
            landing: observed(FunnelStageKind::Landing, defaults.landing),
            engagement: observed(FunnelStageKind::Engagement, defaults.engagement),
            conversion: observed(FunnelStageKind::Conversion, defaults.conversion),
        }
    }

    pub fn rate_into(&self, stage: FunnelStageKind) -> Option<f64> {
        match stage {
            FunnelStageKind::Impressions => None,
            FunnelStageKind::Clicks => Some(self.click_through),
            FunnelStageKind::Landing => Some(self.landing),
            FunnelStageKind::Engagement => Some(self.engagement),
            FunnelStageKind::Conversion => Some(self.conversion),
        }
    }

    /// Share of site visitors (landings) expected to convert.
    pub fn visitor_to_conversion(&self) -> f64 {
        self.engagement * self.conversion
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProjectedStage {
    pub stage: FunnelStageKind,
    pub count: f64,
    /// Step rate from the previous stage, in percent.
    pub rate: f64,
    pub drop_off_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionProjection {
    pub stages: BTreeMap<FunnelStageKind, ProjectedStage>,
    pub step_rates: StepRates,
    pub expected_conversions: f64,
    pub expected_revenue: f64,
    /// Conversions per impression, in percent.
    pub overall_conversion_rate: f64,
}

impl ConversionProjection {
    /// Projects the funnel from `impressions`, or backwards from the expected
    /// incremental visitors when reach is unknown.
    pub fn project(
        rates: StepRates,
        impressions: Option<f64>,
        incremental_visitors: f64,
        average_order_value: f64,
    ) -> Self {
        let landing_per_impression = rates.click_through * rates.landing;
        let impressions = match impressions {
            Some(reach) if reach.is_finite() && reach > 0.0 => reach,
            _ if landing_per_impression > 0.0 => incremental_visitors / landing_per_impression,
            _ => 0.0,
        };

        let mut stages = BTreeMap::new();
        let mut previous = impressions;
        for stage in FunnelStageKind::ALL {
            let (count, rate, drop_off_rate) = match rates.rate_into(stage) {
                Some(r) => {
                    let count = previous * r;
                    (count, r * 100.0, drop_off(previous, count))
                }
                None => (impressions, if impressions > 0.0 { 100.0 } else { 0.0 }, 0.0),
            };
            stages.insert(
                stage,
                ProjectedStage {
                    stage,
                    count,
                    rate,
                    drop_off_rate,
                },
            );
            previous = count;
        }

        let expected_conversions = previous;
        Self {
            stages,
            step_rates: rates,
            expected_conversions,
            expected_revenue: expected_conversions * average_order_value,
            overall_conversion_rate: if impressions > 0.0 {
                expected_conversions / impressions * 100.0
            } else {
                0.0
            },
        }
    }
}
