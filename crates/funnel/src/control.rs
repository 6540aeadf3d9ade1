//! Control-group comparison: incrementality of the spot's funnel against a
//! holdout audience or unexposed market.

use crate::analyzer::FunnelAnalyzer;
use crate::types::{ConversionData, FunnelStageKind, StageSignificance};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlComparison {
    pub stage: FunnelStageKind,
    pub spot_count: f64,
    pub control_count: f64,
    /// `(spot - control) / control * 100` (0.0 when control is zero).
    pub lift: f64,
    pub significance: StageSignificance,
}

pub type ComparisonMap = BTreeMap<FunnelStageKind, ControlComparison>;

impl FunnelAnalyzer {
    pub fn compare_control_groups(
        &self,
        spot_funnel: &ConversionData,
        control_funnel: &ConversionData,
    ) -> ComparisonMap {
        FunnelStageKind::ALL
            .iter()
            .map(|stage| {
                let spot_count = spot_funnel.count(*stage);
                let control_count = control_funnel.count(*stage);
                let lift = if control_count > 0.0 {
                    (spot_count - control_count) / control_count * 100.0
                } else {
                    0.0
                };
                let comparison = ControlComparison {
                    stage: *stage,
                    spot_count,
                    control_count,
                    lift,
                    significance: self.stage_significance(*stage, spot_funnel, control_funnel),
                };
                (*stage, comparison)
            })
            .collect()
    }
}
