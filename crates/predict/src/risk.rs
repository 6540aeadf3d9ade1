//! Risk assessment of a projection.

use crate::patterns::HistoricalPatterns;
use crate::performance::PerformanceProjection;
use crate::roi::RoiProjection;
use serde::{Deserialize, Serialize};
use spotlift_core::types::Priority;
use spotlift_core::window::TimeWindow;
use std::fmt;

const LOW_PERFORMANCE_RATIO: f64 = 0.7;
const HIGH_VARIABILITY: f64 = 0.5;
const MIN_SAMPLES: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskKind {
    LowPerformance,
    NegativeRoi,
    HighVariability,
    InsufficientData,
}

impl fmt::Display for RiskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::LowPerformance => "low performance",
            Self::NegativeRoi => "negative ROI",
            Self::HighVariability => "high variability",
            Self::InsufficientData => "insufficient data",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub kind: RiskKind,
    pub severity: Priority,
    pub description: String,
    pub mitigation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAnalysis {
    pub factors: Vec<RiskFactor>,
    /// Highest severity present, `low` when there are no factors.
    pub overall: Priority,
}

impl RiskAnalysis {
    pub fn assess(
        performance: &PerformanceProjection,
        roi: &RoiProjection,
        patterns: &HistoricalPatterns,
    ) -> Self {
        let mut factors = Vec::new();

        let immediate = performance
            .window(TimeWindow::Immediate)
            .map(|p| p.projected)
            .unwrap_or(0.0);
        if immediate < LOW_PERFORMANCE_RATIO * performance.historical_average {
            factors.push(RiskFactor {
                kind: RiskKind::LowPerformance,
                severity: Priority::High,
                description: format!(
                    "Immediate projection {immediate:.0} is below 70% of the historical average {:.0}",
                    performance.historical_average
                ),
                mitigation: "Move the spot to a stronger slot or refresh the creative".to_string(),
            });
        }

        if roi.total_roi < 0.0 {
            factors.push(RiskFactor {
                kind: RiskKind::NegativeRoi,
                severity: Priority::Critical,
                description: format!("Projected ROI is {:.1}%", roi.total_roi),
                mitigation: "Reduce spend or negotiate a lower rate for this break".to_string(),
            });
        }

        if patterns.variability > HIGH_VARIABILITY {
            factors.push(RiskFactor {
                kind: RiskKind::HighVariability,
                severity: Priority::Medium,
                description: format!(
                    "Traffic varies strongly (coefficient of variation {:.2})",
                    patterns.variability
                ),
                mitigation: "Air several spots before drawing conclusions from a single one"
                    .to_string(),
            });
        }

        if patterns.sample_count < MIN_SAMPLES {
            factors.push(RiskFactor {
                kind: RiskKind::InsufficientData,
                severity: Priority::Low,
                description: format!("Only {} historical samples available", patterns.sample_count),
                mitigation: "Collect more traffic history before relying on the forecast"
                    .to_string(),
            });
        }

        let overall = factors
            .iter()
            .map(|f| f.severity)
            .max()
            .unwrap_or(Priority::Low);

        Self { factors, overall }
    }

    pub fn has(&self, kind: RiskKind) -> bool {
        self.factors.iter().any(|f| f.kind == kind)
    }
}
