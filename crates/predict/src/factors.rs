//! Adjustment factors and engagement scores as pluggable estimators.
//!
//! Every factor is produced by a [`FactorEstimator`] trait object, so a calibrated
//! model can replace a stub without touching the projection pipeline.

use crate::patterns::HistoricalPatterns;
use crate::types::{HistoricalData, MarketData};
use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use spotlift_core::types::EventRecord;
use std::fmt::Debug;
use std::sync::Arc;

/// Inputs available to every estimator.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionContext<'a> {
    pub event: &'a EventRecord,
    pub event_time: DateTime<Utc>,
    pub patterns: &'a HistoricalPatterns,
    pub history: &'a HistoricalData,
    pub market: &'a MarketData,
}

pub trait FactorEstimator: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    /// Inclusive `(min, max)` the estimate is clamped to.
    fn bounds(&self) -> (f64, f64);

    fn estimate(&self, ctx: &ProjectionContext<'_>) -> f64;

    /// The estimate clamped to [`bounds`](Self::bounds); non-finite estimates
    /// fall back to the neutral value 1.0 before clamping.
    fn bounded(&self, ctx: &ProjectionContext<'_>) -> f64 {
        let (lo, hi) = self.bounds();
        let raw = self.estimate(ctx);
        let value = if raw.is_finite() { raw } else { 1.0 };
        value.clamp(lo, hi)
    }
}

/// Event-hour traffic relative to the overall hourly mean.
#[derive(Debug, Clone, Default)]
pub struct TemporalEstimator;

impl FactorEstimator for TemporalEstimator {
    fn name(&self) -> &'static str {
        "temporal"
    }

    fn bounds(&self) -> (f64, f64) {
        (0.5, 2.0)
    }

    fn estimate(&self, ctx: &ProjectionContext<'_>) -> f64 {
        ctx.patterns.hourly_index(ctx.event_time.hour())
    }
}

/// Reach index of the break.
#[derive(Debug, Clone, Default)]
pub struct AudienceEstimator;

impl FactorEstimator for AudienceEstimator {
    fn name(&self) -> &'static str {
        "audience"
    }

    fn bounds(&self) -> (f64, f64) {
        (0.5, 1.5)
    }

    fn estimate(&self, ctx: &ProjectionContext<'_>) -> f64 {
        ctx.market.reach_index
    }
}

/// Fixed-value estimator for factors that have no model yet.
#[derive(Debug, Clone)]
pub struct ConstantEstimator {
    name: &'static str,
    value: f64,
    bounds: (f64, f64),
}

impl ConstantEstimator {
    pub fn new(name: &'static str, value: f64, bounds: (f64, f64)) -> Self {
        Self {
            name,
            value,
            bounds,
        }
    }
}

impl FactorEstimator for ConstantEstimator {
    fn name(&self) -> &'static str {
        self.name
    }

    fn bounds(&self) -> (f64, f64) {
        self.bounds
    }

    fn estimate(&self, _ctx: &ProjectionContext<'_>) -> f64 {
        self.value
    }
}

/// The estimator set used by the projector.
#[derive(Debug, Clone)]
pub struct Estimators {
    pub temporal: Arc<dyn FactorEstimator>,
    pub audience: Arc<dyn FactorEstimator>,
    pub content: Arc<dyn FactorEstimator>,
    pub market: Arc<dyn FactorEstimator>,
    /// Engagement score for creative quality, in `[0, 1]`.
    pub content_quality: Arc<dyn FactorEstimator>,
    /// Engagement score for audience fit, in `[0, 1]`.
    pub audience_match: Arc<dyn FactorEstimator>,
}

impl Default for Estimators {
    fn default() -> Self {
        Self {
            temporal: Arc::new(TemporalEstimator),
            audience: Arc::new(AudienceEstimator),
            content: Arc::new(ConstantEstimator::new("content", 1.0, (0.8, 1.2))),
            market: Arc::new(ConstantEstimator::new("market", 1.0, (0.7, 1.3))),
            content_quality: Arc::new(ConstantEstimator::new("content_quality", 1.0, (0.0, 1.0))),
            audience_match: Arc::new(ConstantEstimator::new("audience_match", 0.8, (0.0, 1.0))),
        }
    }
}

/// Multiplicative adjustments. `temporal` shapes the sub-day baseline; the
/// others scale the spot's expected lift.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdjustmentFactors {
    pub temporal: f64,
    pub audience: f64,
    pub content: f64,
    pub market: f64,
    /// `audience * content * market`.
    pub spot_effect: f64,
}

impl AdjustmentFactors {
    pub fn estimate(estimators: &Estimators, ctx: &ProjectionContext<'_>) -> Self {
        let temporal = estimators.temporal.bounded(ctx);
        let audience = estimators.audience.bounded(ctx);
        let content = estimators.content.bounded(ctx);
        let market = estimators.market.bounded(ctx);
        Self {
            temporal,
            audience,
            content,
            market,
            spot_effect: audience * content * market,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use spotlift_core::types::MetricSample;

    #[derive(Debug)]
    struct Wild;

    impl FactorEstimator for Wild {
        fn name(&self) -> &'static str {
            "wild"
        }
        fn bounds(&self) -> (f64, f64) {
            (0.7, 1.3)
        }
        fn estimate(&self, _ctx: &ProjectionContext<'_>) -> f64 {
            f64::INFINITY
        }
    }

    fn with_ctx<R>(
        market: MarketData,
        samples: Vec<MetricSample>,
        f: impl FnOnce(&ProjectionContext<'_>) -> R,
    ) -> R {
        let ts = Utc.with_ymd_and_hms(2024, 3, 4, 20, 0, 0).unwrap();
        let event = EventRecord::new("spot-1", ts);
        let patterns = HistoricalPatterns::extract(&samples);
        let history = HistoricalData::from_samples(samples);
        let ctx = ProjectionContext {
            event: &event,
            event_time: ts,
            patterns: &patterns,
            history: &history,
            market: &market,
        };
        f(&ctx)
    }

    #[test]
    fn test_default_factors_without_history() {
        let factors = with_ctx(MarketData::default(), Vec::new(), |ctx| {
            AdjustmentFactors::estimate(&Estimators::default(), ctx)
        });
        assert_eq!(factors.temporal, 1.0);
        assert_eq!(factors.audience, 1.0);
        assert_eq!(factors.content, 1.0);
        assert_eq!(factors.market, 1.0);
        assert_eq!(factors.spot_effect, 1.0);
    }

    #[test]
    fn test_temporal_factor_is_clamped() {
        // All traffic at 20:00: index is far above 2.0.
        let start = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let samples: Vec<MetricSample> = (0..24 * 7)
            .map(|i| {
                let ts = start + Duration::hours(i);
                let users = if ts.hour() == 20 { 1000.0 } else { 1.0 };
                MetricSample::new(ts, users, users, users)
            })
            .collect();
        let temporal = with_ctx(MarketData::default(), samples, |ctx| {
            TemporalEstimator.bounded(ctx)
        });
        assert_eq!(temporal, 2.0);
    }

    #[test]
    fn test_audience_and_replacement_estimator() {
        let market = MarketData {
            reach_index: 3.0,
            ..Default::default()
        };
        let (audience, market_factor) = with_ctx(market, Vec::new(), |ctx| {
            let estimators = Estimators {
                market: Arc::new(Wild),
                ..Default::default()
            };
            let factors = AdjustmentFactors::estimate(&estimators, ctx);
            (factors.audience, factors.market)
        });
        assert_eq!(audience, 1.5);
        // Non-finite estimates fall back to neutral.
        assert_eq!(market_factor, 1.0);
    }
}
