use crate::conversions::ConversionProjection;
use crate::engagement::EngagementProjection;
use crate::performance::PerformanceProjection;
use crate::risk::RiskAnalysis;
use crate::roi::RoiProjection;
use crate::timing::OptimalTiming;
use serde::{Deserialize, Serialize};
use spotlift_core::types::{MetricSample, Recommendation};
use spotlift_core::validation::ValidationFlag;
use spotlift_core::window::TimeWindow;
use spotlift_funnel::ConversionData;
use std::fmt::Write;

/// Measured lift of an earlier spot in one window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorImpact {
    pub window: TimeWindow,
    pub percentage_change: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HistoricalData {
    #[serde(default)]
    pub samples: Vec<MetricSample>,
    #[serde(default)]
    pub prior_impacts: Vec<PriorImpact>,
    /// Funnel volumes of a typical period; step rates fall back to defaults without it.
    #[serde(default)]
    pub funnel_baseline: Option<ConversionData>,
}

impl HistoricalData {
    pub fn from_samples(samples: Vec<MetricSample>) -> Self {
        Self {
            samples,
            ..Default::default()
        }
    }

    /// Mean prior lift for `window`, in percent (0.0 without priors).
    pub fn mean_prior_lift(&self, window: TimeWindow) -> f64 {
        let lifts: Vec<f64> = self
            .prior_impacts
            .iter()
            .filter(|p| p.window == window && p.percentage_change.is_finite())
            .map(|p| p.percentage_change)
            .collect();
        if lifts.is_empty() {
            0.0
        } else {
            lifts.iter().sum::<f64>() / lifts.len() as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    #[serde(default)]
    pub average_order_value: Option<f64>,
    #[serde(default)]
    pub cost_per_second: Option<f64>,
    /// Expected impressions for the break.
    #[serde(default)]
    pub estimated_reach: Option<f64>,
    /// Audience size relative to a typical break (1.0 = typical).
    #[serde(default = "default_index")]
    pub reach_index: f64,
    /// Share of the break occupied by competing advertisers, in `[0, 1]`.
    #[serde(default)]
    pub competitor_intensity: f64,
    /// Scales long-term projections (1.0 = neutral season).
    #[serde(default = "default_index")]
    pub seasonal_index: f64,
}

fn default_index() -> f64 {
    1.0
}

impl Default for MarketData {
    fn default() -> Self {
        Self {
            average_order_value: None,
            cost_per_second: None,
            estimated_reach: None,
            reach_index: default_index(),
            competitor_intensity: 0.0,
            seasonal_index: default_index(),
        }
    }
}

/// Everything projected for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionBundle {
    pub event_id: String,
    pub performance: PerformanceProjection,
    pub roi: RoiProjection,
    pub engagement: EngagementProjection,
    pub conversions: ConversionProjection,
    pub optimal_timing: OptimalTiming,
    pub risk_analysis: RiskAnalysis,
    pub recommendations: Vec<Recommendation>,
    /// Overall confidence in `[0.1, 0.95]`.
    pub confidence: f64,
    pub historical_samples: usize,
    #[serde(default)]
    pub validation: Vec<ValidationFlag>,
}

impl PredictionBundle {
    /// Plain-text digest for downstream text generation.
    pub fn summary_prompt(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Spot {} forecast", self.event_id);
        let _ = writeln!(
            out,
            "Confidence: {:.0}% ({} historical samples)",
            self.confidence * 100.0,
            self.historical_samples
        );

        let _ = writeln!(out, "\nProjected traffic:");
        for (window, p) in &self.performance.windows {
            let _ = writeln!(
                out,
                "- {}: {:.0} visitors ({:+.1}% vs baseline {:.0}, range {:.0}-{:.0})",
                window.label(),
                p.projected,
                p.expected_lift_pct,
                p.baseline,
                p.lower_bound,
                p.upper_bound
            );
        }

        let _ = writeln!(out, "\nReturn on investment:");
        let _ = writeln!(
            out,
            "- Investment {:.2}{}, revenue {:.2}, ROI {:.1}%, ROAS {:.2}",
            self.roi.investment,
            if self.roi.investment_estimated {
                " (estimated)"
            } else {
                ""
            },
            self.roi.total_revenue,
            self.roi.total_roi,
            self.roi.total_roas
        );
        let _ = writeln!(
            out,
            "- Expected conversions {:.1} ({:.2}% of impressions)",
            self.conversions.expected_conversions, self.conversions.overall_conversion_rate
        );
        let _ = writeln!(
            out,
            "- Engagement score {:.2}",
            self.engagement.overall_score
        );

        let _ = writeln!(out, "\nTiming:");
        if let Some(best) = &self.optimal_timing.best {
            let _ = writeln!(out, "- Best slot: {best}");
        }
        let _ = writeln!(out, "- Current slot: {}", self.optimal_timing.event_slot);
        let _ = writeln!(
            out,
            "- Frequency: {} spots per week, at least {} h apart",
            self.optimal_timing.frequency.spots_per_week,
            self.optimal_timing.frequency.min_spacing_hours
        );

        let _ = writeln!(out, "\nRisk: {}", self.risk_analysis.overall);
        for factor in &self.risk_analysis.factors {
            let _ = writeln!(out, "- [{}] {}", factor.severity, factor.description);
        }

        if !self.recommendations.is_empty() {
            let _ = writeln!(out, "\nRecommendations:");
            for rec in &self.recommendations {
                let _ = writeln!(out, "- [{}] {}: {}", rec.priority, rec.title, rec.detail);
            }
        }

        if !self.validation.is_empty() {
            let _ = writeln!(
                out,
                "\n{} values were withheld by validation.",
                self.validation.len()
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_prior_lift() {
        let data = HistoricalData {
            prior_impacts: vec![
                PriorImpact {
                    window: TimeWindow::Immediate,
                    percentage_change: 20.0,
                },
                PriorImpact {
                    window: TimeWindow::Immediate,
                    percentage_change: 40.0,
                },
                PriorImpact {
                    window: TimeWindow::LongTerm,
                    percentage_change: 5.0,
                },
            ],
            ..Default::default()
        };
        assert_eq!(data.mean_prior_lift(TimeWindow::Immediate), 30.0);
        assert_eq!(data.mean_prior_lift(TimeWindow::LongTerm), 5.0);
        assert_eq!(data.mean_prior_lift(TimeWindow::ShortTerm), 0.0);
    }

    #[test]
    fn test_market_defaults_from_json() {
        let market: MarketData = serde_json::from_str("{}").unwrap();
        assert_eq!(market, MarketData::default());
        assert_eq!(market.reach_index, 1.0);
        assert_eq!(market.seasonal_index, 1.0);
    }
}
