use crate::roi::RoiSummary;
use crate::stats::EffectSizeClass;
use serde::{Deserialize, Serialize};
use spotlift_core::types::Recommendation;
use spotlift_core::validation::ValidationFlag;
use std::collections::BTreeMap;
use std::fmt;

/// Fixed five-step conversion path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunnelStageKind {
    Impressions,
    Clicks,
    Landing,
    Engagement,
    Conversion,
}

impl FunnelStageKind {
    pub const ALL: [FunnelStageKind; 5] = [
        FunnelStageKind::Impressions,
        FunnelStageKind::Clicks,
        FunnelStageKind::Landing,
        FunnelStageKind::Engagement,
        FunnelStageKind::Conversion,
    ];

    pub fn previous(&self) -> Option<FunnelStageKind> {
        match self {
            Self::Impressions => None,
            Self::Clicks => Some(Self::Impressions),
            Self::Landing => Some(Self::Clicks),
            Self::Engagement => Some(Self::Landing),
            Self::Conversion => Some(Self::Engagement),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Impressions => "impressions",
            Self::Clicks => "clicks",
            Self::Landing => "landing",
            Self::Engagement => "engagement",
            Self::Conversion => "conversion",
        }
    }
}

impl fmt::Display for FunnelStageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Observed volume at one stage.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StageObservation {
    pub count: f64,
    #[serde(default)]
    pub revenue: f64,
}

/// Funnel volumes for a spot, its reference period, or a control group.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConversionData {
    #[serde(default)]
    pub stages: BTreeMap<FunnelStageKind, StageObservation>,
    /// Media cost attributable to these volumes.
    #[serde(default)]
    pub cost: f64,
}

impl ConversionData {
    /// Build from counts in funnel order.
    pub fn from_counts(counts: [f64; 5]) -> Self {
        let stages = FunnelStageKind::ALL
            .iter()
            .zip(counts)
            .map(|(stage, count)| (*stage, StageObservation { count, revenue: 0.0 }))
            .collect();
        Self { stages, cost: 0.0 }
    }

    pub fn with_revenue(mut self, stage: FunnelStageKind, revenue: f64) -> Self {
        self.stages.entry(stage).or_default().revenue = revenue;
        self
    }

    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost;
        self
    }

    pub fn count(&self, stage: FunnelStageKind) -> f64 {
        self.stages.get(&stage).map(|s| s.count).unwrap_or(0.0)
    }

    pub fn revenue(&self, stage: FunnelStageKind) -> f64 {
        self.stages.get(&stage).map(|s| s.revenue).unwrap_or(0.0)
    }

    pub fn total_revenue(&self) -> f64 {
        self.stages.values().map(|s| s.revenue).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StageMetrics {
    pub count: f64,
    /// Step conversion rate from the previous stage, in percent.
    pub rate: f64,
    pub revenue: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StageImpact {
    pub count_change: f64,
    pub revenue_change: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageSignificance {
    pub z_score: f64,
    pub p_value: f64,
    pub cohens_h: f64,
    pub is_significant: bool,
    pub effect_size: EffectSizeClass,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStage {
    pub stage: FunnelStageKind,
    pub metrics: StageMetrics,
    pub reference_metrics: StageMetrics,
    pub impact: StageImpact,
    pub significance: StageSignificance,
    /// Confidence in `[0, 100]`.
    pub confidence: f64,
    pub drop_off_rate: f64,
    pub recommendations: Vec<Recommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelReport {
    pub event_id: String,
    pub stages: BTreeMap<FunnelStageKind, FunnelStage>,
    /// Conversions per impression, in percent.
    pub overall_conversion_rate: f64,
    pub roi: RoiSummary,
    #[serde(default)]
    pub validation: Vec<ValidationFlag>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert_eq!(FunnelStageKind::Impressions.previous(), None);
        assert_eq!(
            FunnelStageKind::Conversion.previous(),
            Some(FunnelStageKind::Engagement)
        );
        assert!(FunnelStageKind::Impressions < FunnelStageKind::Conversion);
    }

    #[test]
    fn test_conversion_data_builders() {
        let data = ConversionData::from_counts([1000.0, 100.0, 80.0, 40.0, 10.0])
            .with_revenue(FunnelStageKind::Conversion, 500.0)
            .with_cost(200.0);
        assert_eq!(data.count(FunnelStageKind::Landing), 80.0);
        assert_eq!(data.total_revenue(), 500.0);
        assert_eq!(data.cost, 200.0);
    }

    #[test]
    fn test_conversion_data_from_json() {
        let data: ConversionData = serde_json::from_str(
            r#"{"stages":{"impressions":{"count":500},"conversion":{"count":5,"revenue":250.0}},"cost":100.0}"#,
        )
        .unwrap();
        assert_eq!(data.count(FunnelStageKind::Impressions), 500.0);
        assert_eq!(data.count(FunnelStageKind::Clicks), 0.0);
        assert_eq!(data.revenue(FunnelStageKind::Conversion), 250.0);
    }
}
