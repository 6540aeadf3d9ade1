//! Predictive projector: assembles the full forecast for one event.

use crate::conversions::{ConversionProjection, StepRates};
use crate::engagement::EngagementProjection;
use crate::factors::{Estimators, ProjectionContext};
use crate::patterns::HistoricalPatterns;
use crate::performance::PerformanceProjection;
use crate::recommendations::{self, RecommendationInputs};
use crate::risk::RiskAnalysis;
use crate::roi::{RoiInputs, RoiProjection};
use crate::timing::AirtimeOptimizer;
use crate::types::{HistoricalData, MarketData, PredictionBundle};
use spotlift_core::config::PredictionConfig;
use spotlift_core::types::EventRecord;
use spotlift_core::window::TimeWindow;
use spotlift_core::SpotliftResult;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct Predictor {
    estimators: Estimators,
    timing: AirtimeOptimizer,
    default_average_order_value: f64,
    default_cost_per_second: f64,
}

impl Predictor {
    pub fn new(config: &PredictionConfig) -> Self {
        info!(
            default_average_order_value = config.default_average_order_value,
            default_cost_per_second = config.default_cost_per_second,
            "Predictor initialized"
        );
        Self {
            estimators: Estimators::default(),
            timing: AirtimeOptimizer::new(),
            default_average_order_value: config.default_average_order_value,
            default_cost_per_second: config.default_cost_per_second,
        }
    }

    pub fn with_estimators(mut self, estimators: Estimators) -> Self {
        self.estimators = estimators;
        self
    }

    pub fn project(
        &self,
        event: &EventRecord,
        historical_data: &HistoricalData,
        market_data: &MarketData,
    ) -> SpotliftResult<PredictionBundle> {
        let event_time = event.require_timestamp()?;
        let patterns = HistoricalPatterns::extract(&historical_data.samples);
        let ctx = ProjectionContext {
            event,
            event_time,
            patterns: &patterns,
            history: historical_data,
            market: market_data,
        };

        let performance = PerformanceProjection::project(&self.estimators, &ctx);
        let rates = StepRates::from_baseline(historical_data.funnel_baseline.as_ref());

        let (investment, investment_estimated) = self.investment(event, market_data);
        let average_order_value = market_data
            .average_order_value
            .filter(|v| v.is_finite() && *v >= 0.0)
            .unwrap_or(self.default_average_order_value);

        let roi = RoiProjection::project(
            &performance,
            &rates,
            RoiInputs {
                investment,
                investment_estimated,
                average_order_value,
                sample_count: patterns.sample_count,
            },
        );
        let engagement = EngagementProjection::project(&self.estimators, &ctx);
        let conversions = ConversionProjection::project(
            rates,
            market_data.estimated_reach,
            performance.total_incremental(),
            average_order_value,
        );
        let optimal_timing = self.timing.optimize(
            &patterns,
            event_time,
            historical_data.mean_prior_lift(TimeWindow::Immediate),
        );
        let risk_analysis = RiskAnalysis::assess(&performance, &roi, &patterns);
        let recommendations = recommendations::generate(&RecommendationInputs {
            timing: &optimal_timing,
            roi: &roi,
            risk: &risk_analysis,
            patterns: &patterns,
            market: market_data,
        });
        let confidence = prediction_confidence(&patterns, &roi);

        debug!(
            event_id = %event.id,
            samples = patterns.sample_count,
            confidence,
            total_roi = roi.total_roi,
            risk = %risk_analysis.overall,
            "Prediction assembled"
        );

        Ok(PredictionBundle {
            event_id: event.id.clone(),
            performance,
            roi,
            engagement,
            conversions,
            optimal_timing,
            risk_analysis,
            recommendations,
            confidence,
            historical_samples: patterns.sample_count,
            validation: Vec::new(),
        })
    }

    /// Rebuild the judgements derived from projected values after those values
    /// were altered, e.g. by the validation gate.
    pub fn reassess(
        &self,
        bundle: &mut PredictionBundle,
        historical_data: &HistoricalData,
        market_data: &MarketData,
    ) {
        let patterns = HistoricalPatterns::extract(&historical_data.samples);
        bundle.risk_analysis = RiskAnalysis::assess(&bundle.performance, &bundle.roi, &patterns);
        bundle.recommendations = recommendations::generate(&RecommendationInputs {
            timing: &bundle.optimal_timing,
            roi: &bundle.roi,
            risk: &bundle.risk_analysis,
            patterns: &patterns,
            market: market_data,
        });
        bundle.confidence = prediction_confidence(&patterns, &bundle.roi);
        debug!(
            event_id = %bundle.event_id,
            total_roi = bundle.roi.total_roi,
            risk = %bundle.risk_analysis.overall,
            "Prediction reassessed"
        );
    }

    /// The event's own investment, or the per-second rate times the spot length.
    fn investment(&self, event: &EventRecord, market: &MarketData) -> (f64, bool) {
        match event.investment {
            Some(v) if v.is_finite() && v > 0.0 => (v, false),
            _ => {
                let rate = market
                    .cost_per_second
                    .filter(|v| v.is_finite() && *v >= 0.0)
                    .unwrap_or(self.default_cost_per_second);
                (rate * f64::from(event.duration_seconds), true)
            }
        }
    }
}

impl Default for Predictor {
    fn default() -> Self {
        Self::new(&PredictionConfig::default())
    }
}

/// Overall forecast confidence in `[0.1, 0.95]`.
pub fn prediction_confidence(patterns: &HistoricalPatterns, roi: &RoiProjection) -> f64 {
    let samples = patterns.sample_count;
    let mut confidence = 0.5;
    if samples > 100 {
        confidence += 0.2;
    } else if samples > 50 {
        confidence += 0.1;
    }
    if samples < 10 {
        confidence -= 0.2;
    }
    confidence += 0.15 * patterns.consistency;
    confidence -= 0.1 * patterns.variability.min(1.0);
    if roi.confidence > 0.8 {
        confidence += 0.1;
    }
    confidence.clamp(0.1, 0.95)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::RiskKind;
    use crate::types::PriorImpact;
    use chrono::{Duration, TimeZone, Timelike, Utc};
    use spotlift_core::types::{MetricSample, Priority};
    use spotlift_core::SpotliftError;

    fn history(days: i64) -> Vec<MetricSample> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..days * 24)
            .map(|i| {
                let ts = start + Duration::hours(i);
                let users = if (19..=22).contains(&ts.hour()) { 300.0 } else { 100.0 };
                let mut s = MetricSample::new(ts, users, users * 1.1, users * 3.0);
                s.bounces = Some(users * 0.4);
                s
            })
            .collect()
    }

    fn event() -> EventRecord {
        let ts = Utc.with_ymd_and_hms(2024, 2, 5, 20, 0, 0).unwrap();
        let mut event = EventRecord::new("spot-1", ts);
        event.investment = Some(500.0);
        event
    }

    #[test]
    fn test_empty_history_is_low_confidence() {
        let bundle = Predictor::default()
            .project(&event(), &HistoricalData::default(), &MarketData::default())
            .unwrap();
        assert_eq!(bundle.historical_samples, 0);
        // 0.5 - 0.2 with no consistency and no ROI confidence.
        assert!((bundle.confidence - 0.3).abs() < 1e-12);
        assert!(bundle.risk_analysis.has(RiskKind::InsufficientData));
        assert!(bundle.risk_analysis.has(RiskKind::NegativeRoi));
        assert_eq!(bundle.risk_analysis.overall, Priority::Critical);
        assert_eq!(bundle.performance.windows.len(), 4);
        assert_eq!(bundle.engagement.categories.len(), 4);
        assert_eq!(bundle.conversions.expected_conversions, 0.0);
        assert!(!bundle.recommendations.is_empty());
    }

    #[test]
    fn test_rich_history_with_prior_lift() {
        let data = HistoricalData {
            samples: history(28),
            prior_impacts: vec![
                PriorImpact {
                    window: TimeWindow::Immediate,
                    percentage_change: 50.0,
                },
                PriorImpact {
                    window: TimeWindow::ShortTerm,
                    percentage_change: 20.0,
                },
            ],
            funnel_baseline: None,
        };
        let bundle = Predictor::default()
            .project(&event(), &data, &MarketData::default())
            .unwrap();

        assert_eq!(bundle.historical_samples, 672);
        assert!(bundle.confidence > 0.7 && bundle.confidence <= 0.95);
        let immediate = bundle.performance.window(TimeWindow::Immediate).unwrap();
        assert!(immediate.incremental > 0.0);
        assert!(!bundle.roi.investment_estimated);
        assert_eq!(bundle.roi.investment, 500.0);
        assert_eq!(bundle.optimal_timing.frequency.spots_per_week, 3);
        assert!(!bundle.risk_analysis.has(RiskKind::InsufficientData));
        assert!(bundle
            .recommendations
            .windows(2)
            .all(|w| w[0].priority >= w[1].priority));
    }

    #[test]
    fn test_estimated_investment() {
        let mut event = event();
        event.investment = None;
        let market = MarketData {
            cost_per_second: Some(10.0),
            ..Default::default()
        };
        let bundle = Predictor::default()
            .project(&event, &HistoricalData::default(), &market)
            .unwrap();
        assert!(bundle.roi.investment_estimated);
        assert_eq!(bundle.roi.investment, 300.0);
    }

    #[test]
    fn test_missing_timestamp_is_configuration_error() {
        let mut event = event();
        event.timestamp = None;
        let err = Predictor::default()
            .project(&event, &HistoricalData::default(), &MarketData::default())
            .unwrap_err();
        assert!(matches!(err, SpotliftError::Configuration(_)));
    }

    #[test]
    fn test_deterministic() {
        let data = HistoricalData::from_samples(history(7));
        let predictor = Predictor::default();
        let a = predictor.project(&event(), &data, &MarketData::default()).unwrap();
        let b = predictor.project(&event(), &data, &MarketData::default()).unwrap();
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_summary_prompt_sections() {
        let data = HistoricalData::from_samples(history(7));
        let bundle = Predictor::default()
            .project(&event(), &data, &MarketData::default())
            .unwrap();
        let prompt = bundle.summary_prompt();
        assert!(prompt.starts_with("Spot spot-1 forecast"));
        assert!(prompt.contains("Projected traffic:"));
        assert!(prompt.contains("Immediate (0-30 min)"));
        assert!(prompt.contains("Return on investment:"));
        assert!(prompt.contains("Timing:"));
        assert!(prompt.contains("Risk:"));
    }
}
