//! Base performance and adjusted traffic projection per window.

use crate::factors::{AdjustmentFactors, Estimators, ProjectionContext};
use crate::patterns::HistoricalPatterns;
use serde::{Deserialize, Serialize};
use spotlift_core::window::TimeWindow;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowProjection {
    /// Historical traffic expected in the window without the spot.
    pub baseline: f64,
    /// Mean prior lift, in percent, before the spot-effect factors.
    pub expected_lift_pct: f64,
    pub projected: f64,
    /// `projected - baseline`, floored at zero.
    pub incremental: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceProjection {
    pub windows: BTreeMap<TimeWindow, WindowProjection>,
    pub factors: AdjustmentFactors,
    /// Historical average for the immediate window at the event hour.
    pub historical_average: f64,
}

impl PerformanceProjection {
    pub fn project(estimators: &Estimators, ctx: &ProjectionContext<'_>) -> Self {
        let factors = AdjustmentFactors::estimate(estimators, ctx);
        let spread = ctx.patterns.variability.min(1.0);
        let seasonal = if ctx.market.seasonal_index.is_finite() {
            ctx.market.seasonal_index.clamp(0.5, 2.0)
        } else {
            1.0
        };

        let windows = TimeWindow::ALL
            .iter()
            .map(|window| {
                let baseline = window_baseline(*window, ctx.patterns, &factors, seasonal);
                let expected_lift_pct = ctx.history.mean_prior_lift(*window);
                let projected =
                    (baseline * (1.0 + expected_lift_pct / 100.0 * factors.spot_effect)).max(0.0);
                let projection = WindowProjection {
                    baseline,
                    expected_lift_pct,
                    projected,
                    incremental: (projected - baseline).max(0.0),
                    lower_bound: (projected * (1.0 - spread)).max(0.0),
                    upper_bound: projected * (1.0 + spread),
                };
                (*window, projection)
            })
            .collect::<BTreeMap<_, _>>();

        let historical_average = windows
            .get(&TimeWindow::Immediate)
            .map(|p| p.baseline)
            .unwrap_or(0.0);

        Self {
            windows,
            factors,
            historical_average,
        }
    }

    pub fn window(&self, window: TimeWindow) -> Option<&WindowProjection> {
        self.windows.get(&window)
    }

    /// Incremental visitors over the disjoint horizons (immediate, short, long).
    pub fn total_incremental(&self) -> f64 {
        [
            TimeWindow::Immediate,
            TimeWindow::ShortTerm,
            TimeWindow::LongTerm,
        ]
        .iter()
        .filter_map(|w| self.windows.get(w))
        .map(|p| p.incremental)
        .sum()
    }
}

/// Traffic expected in the window without the spot. Sub-day windows scale the
/// hourly mean by the event-hour index; longer windows scale the daily mean by
/// the seasonal index. The hour-of-day effect only enters through `temporal`.
fn window_baseline(
    window: TimeWindow,
    patterns: &HistoricalPatterns,
    factors: &AdjustmentFactors,
    seasonal: f64,
) -> f64 {
    let hours = window.duration_hours();
    if hours < 24.0 {
        patterns.hourly_mean * hours * factors.temporal
    } else {
        patterns.daily_mean * hours / 24.0 * seasonal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HistoricalData, MarketData, PriorImpact};
    use chrono::{Duration, TimeZone, Timelike, Utc};
    use spotlift_core::types::{EventRecord, MetricSample};

    fn flat_history(days: i64, users: f64) -> Vec<MetricSample> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..days * 24)
            .map(|i| MetricSample::new(start + Duration::hours(i), users, users, users))
            .collect()
    }

    fn project(history: HistoricalData, market: MarketData) -> PerformanceProjection {
        project_at(history, market, 20)
    }

    fn project_at(history: HistoricalData, market: MarketData, hour: u32) -> PerformanceProjection {
        let ts = Utc.with_ymd_and_hms(2024, 2, 5, hour, 0, 0).unwrap();
        let event = EventRecord::new("spot-1", ts);
        let patterns = HistoricalPatterns::extract(&history.samples);
        let ctx = ProjectionContext {
            event: &event,
            event_time: ts,
            patterns: &patterns,
            history: &history,
            market: &market,
        };
        PerformanceProjection::project(&Estimators::default(), &ctx)
    }

    #[test]
    fn test_flat_history_baselines() {
        let projection = project(
            HistoricalData::from_samples(flat_history(14, 100.0)),
            MarketData::default(),
        );
        let immediate = projection.window(TimeWindow::Immediate).unwrap();
        assert!((immediate.baseline - 50.0).abs() < 1e-9);
        assert!((projection.historical_average - 50.0).abs() < 1e-9);

        let short = projection.window(TimeWindow::ShortTerm).unwrap();
        assert!((short.baseline - 300.0).abs() < 1e-9);

        let medium = projection.window(TimeWindow::MediumTerm).unwrap();
        assert!((medium.baseline - 2400.0 * 6.0).abs() < 1e-6);

        // Flat history: no lift and no variability.
        assert_eq!(immediate.projected, immediate.baseline);
        assert_eq!(immediate.incremental, 0.0);
        assert_eq!(immediate.lower_bound, immediate.upper_bound);
    }

    #[test]
    fn test_prior_lift_raises_projection() {
        let mut history = HistoricalData::from_samples(flat_history(14, 100.0));
        history.prior_impacts.push(PriorImpact {
            window: TimeWindow::Immediate,
            percentage_change: 40.0,
        });
        let projection = project(history, MarketData::default());
        let immediate = projection.window(TimeWindow::Immediate).unwrap();
        assert!((immediate.projected - 70.0).abs() < 1e-9);
        assert!((immediate.incremental - 20.0).abs() < 1e-9);
        assert!((projection.total_incremental() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_history_projects_zero() {
        let projection = project(HistoricalData::default(), MarketData::default());
        assert_eq!(projection.windows.len(), 4);
        for p in projection.windows.values() {
            assert_eq!(p.projected, 0.0);
            assert_eq!(p.incremental, 0.0);
        }
        assert_eq!(projection.factors.spot_effect, 1.0);
    }

    fn prime_time_history(days: i64) -> Vec<MetricSample> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..days * 24)
            .map(|i| {
                let ts = start + Duration::hours(i);
                let users = if (19..=22).contains(&ts.hour()) { 200.0 } else { 100.0 };
                MetricSample::new(ts, users, users, users)
            })
            .collect()
    }

    #[test]
    fn test_no_prior_lift_projects_no_incremental_traffic() {
        for hour in [20, 3] {
            let market = MarketData {
                reach_index: 1.4,
                seasonal_index: 1.5,
                ..Default::default()
            };
            let projection = project_at(
                HistoricalData::from_samples(prime_time_history(28)),
                market,
                hour,
            );
            for (window, p) in &projection.windows {
                assert_eq!(p.incremental, 0.0, "{window:?} at {hour}:00");
                assert_eq!(p.projected, p.baseline, "{window:?} at {hour}:00");
            }
            assert_eq!(projection.total_incremental(), 0.0);
        }
    }

    #[test]
    fn test_hour_effect_applies_once_to_sub_day_windows() {
        let history = HistoricalData::from_samples(prime_time_history(28));
        let patterns = HistoricalPatterns::extract(&history.samples);
        let prime = project_at(history.clone(), MarketData::default(), 20);
        let night = project_at(history, MarketData::default(), 3);

        let index = patterns.hourly_index(20);
        let prime_immediate = prime.window(TimeWindow::Immediate).unwrap();
        assert!((prime_immediate.baseline - patterns.hourly_mean * 0.5 * index).abs() < 1e-9);

        // Multi-day windows do not depend on the hour of the spot.
        for window in [TimeWindow::MediumTerm, TimeWindow::LongTerm] {
            let a = prime.window(window).unwrap();
            let b = night.window(window).unwrap();
            assert!((a.baseline - b.baseline).abs() < 1e-9);
            assert!((a.baseline - patterns.daily_mean * window.duration_hours() / 24.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_spot_effect_scales_lift_only() {
        let mut history = HistoricalData::from_samples(flat_history(14, 100.0));
        history.prior_impacts.push(PriorImpact {
            window: TimeWindow::Immediate,
            percentage_change: 40.0,
        });
        let market = MarketData {
            reach_index: 1.5,
            ..Default::default()
        };
        let projection = project(history, market);
        let immediate = projection.window(TimeWindow::Immediate).unwrap();
        assert!((immediate.baseline - 50.0).abs() < 1e-9);
        // 40% lift at 1.5x reach: 60% over the baseline.
        assert!((immediate.projected - 80.0).abs() < 1e-9);
        assert!((immediate.incremental - 30.0).abs() < 1e-9);
    }
}
