//! Engagement projection across the four horizons.

use crate::factors::{Estimators, ProjectionContext};
use chrono::Timelike;
use serde::{Deserialize, Serialize};
use spotlift_core::window::TimeWindow;
use std::collections::BTreeMap;

fn decay(window: TimeWindow) -> f64 {
    match window {
        TimeWindow::Immediate => 1.0,
        TimeWindow::ShortTerm => 0.8,
        TimeWindow::MediumTerm => 0.5,
        TimeWindow::LongTerm => 0.3,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngagementEstimate {
    pub base_engagement: f64,
    pub decay: f64,
    pub content_quality: f64,
    pub timing_quality: f64,
    pub audience_match: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementProjection {
    pub categories: BTreeMap<TimeWindow, EngagementEstimate>,
    pub pages_per_session: f64,
    pub bounce_rate: f64,
    /// Mean of the category scores.
    pub overall_score: f64,
}

impl EngagementProjection {
    pub fn project(estimators: &Estimators, ctx: &ProjectionContext<'_>) -> Self {
        let baseline = ctx.patterns.engagement;
        let base_engagement = baseline.pages_per_session * (1.0 - baseline.bounce_rate);
        let content_quality = estimators.content_quality.bounded(ctx);
        let audience_match = estimators.audience_match.bounded(ctx);
        let timing_quality = timing_quality(ctx);

        let categories: BTreeMap<TimeWindow, EngagementEstimate> = TimeWindow::ALL
            .iter()
            .map(|window| {
                let decay = decay(*window);
                let estimate = EngagementEstimate {
                    base_engagement,
                    decay,
                    content_quality,
                    timing_quality,
                    audience_match,
                    score: base_engagement
                        * decay
                        * content_quality
                        * timing_quality
                        * audience_match,
                };
                (*window, estimate)
            })
            .collect();

        let overall_score =
            categories.values().map(|c| c.score).sum::<f64>() / categories.len() as f64;

        Self {
            categories,
            pages_per_session: baseline.pages_per_session,
            bounce_rate: baseline.bounce_rate,
            overall_score,
        }
    }
}

/// Event-hour average relative to the best hour; zero without history.
fn timing_quality(ctx: &ProjectionContext<'_>) -> f64 {
    let best = ctx.patterns.hourly.iter().copied().fold(0.0, f64::max);
    if best > 0.0 {
        ctx.patterns.hourly[ctx.event_time.hour() as usize] / best
    } else {
        0.0
    }
}
