//! Prioritized recommendations drawn from timing, ROI, risk and data quality.

use crate::patterns::HistoricalPatterns;
use crate::risk::RiskAnalysis;
use crate::roi::RoiProjection;
use crate::timing::OptimalTiming;
use crate::types::MarketData;
use spotlift_core::types::{Priority, Recommendation, RecommendationCategory};

/// Event slot scoring below this share of the best slot triggers a move.
const SLOT_GAP_RATIO: f64 = 0.8;
const CROWDED_BREAK: f64 = 0.7;
const THIN_HISTORY: usize = 50;
const STRONG_ROI_PCT: f64 = 100.0;

pub struct RecommendationInputs<'a> {
    pub timing: &'a OptimalTiming,
    pub roi: &'a RoiProjection,
    pub risk: &'a RiskAnalysis,
    pub patterns: &'a HistoricalPatterns,
    pub market: &'a MarketData,
}

/// Builds recommendations sorted by priority, highest first. Equal priorities
/// keep the order timing, ROI, risk mitigation, data quality.
pub fn generate(inputs: &RecommendationInputs<'_>) -> Vec<Recommendation> {
    let mut recs = Vec::new();
    timing_recommendations(inputs, &mut recs);
    roi_recommendations(inputs.roi, &mut recs);

    for factor in &inputs.risk.factors {
        recs.push(Recommendation {
            category: RecommendationCategory::RiskMitigation,
            priority: factor.severity,
            title: format!("Mitigate {}", factor.kind),
            detail: format!("{}. {}.", factor.description, factor.mitigation),
        });
    }

    data_quality_recommendations(inputs.patterns, &mut recs);

    recs.sort_by(|a, b| b.priority.cmp(&a.priority));
    recs
}

fn timing_recommendations(inputs: &RecommendationInputs<'_>, recs: &mut Vec<Recommendation>) {
    let timing = inputs.timing;
    if let Some(best) = &timing.best {
        if timing.event_slot.score < SLOT_GAP_RATIO * best.score {
            let alternatives: Vec<String> =
                timing.alternatives.iter().map(|s| s.to_string()).collect();
            recs.push(Recommendation {
                category: RecommendationCategory::Timing,
                priority: Priority::High,
                title: format!("Move the spot to {} {:02}:00", best.weekday, best.hour),
                detail: format!(
                    "The current slot ({}) reaches {:.0}% of the best slot's traffic. \
                     Alternatives: {}.",
                    timing.event_slot,
                    if best.score > 0.0 {
                        timing.event_slot.score / best.score * 100.0
                    } else {
                        0.0
                    },
                    alternatives.join(", ")
                ),
            });
        } else {
            recs.push(Recommendation {
                category: RecommendationCategory::Timing,
                priority: Priority::Low,
                title: "Keep the current slot".to_string(),
                detail: format!(
                    "The current slot ({}) is within 20% of the best slot ({best}).",
                    timing.event_slot
                ),
            });
        }
    }

    recs.push(Recommendation {
        category: RecommendationCategory::Timing,
        priority: Priority::Low,
        title: format!(
            "Air {} spot(s) per week",
            timing.frequency.spots_per_week
        ),
        detail: format!(
            "Space airings at least {} hours apart: {}.",
            timing.frequency.min_spacing_hours, timing.frequency.rationale
        ),
    });

    if inputs.market.competitor_intensity > CROWDED_BREAK {
        recs.push(Recommendation {
            category: RecommendationCategory::Timing,
            priority: Priority::Medium,
            title: "Avoid crowded breaks".to_string(),
            detail: format!(
                "{:.0}% of the break is taken by competing advertisers; \
                 prefer first or last position in the break.",
                inputs.market.competitor_intensity * 100.0
            ),
        });
    }
}

fn roi_recommendations(roi: &RoiProjection, recs: &mut Vec<Recommendation>) {
    if roi.total_roi < 0.0 {
        recs.push(Recommendation {
            category: RecommendationCategory::Roi,
            priority: Priority::Critical,
            title: "Projected loss".to_string(),
            detail: format!(
                "Revenue of {:.2} does not cover the {:.2} investment; \
                 {:.1} conversions are needed to break even.",
                roi.total_revenue, roi.investment, roi.break_even_conversions
            ),
        });
    } else if roi.total_roi > STRONG_ROI_PCT {
        recs.push(Recommendation {
            category: RecommendationCategory::Roi,
            priority: Priority::Medium,
            title: "Scale investment".to_string(),
            detail: format!(
                "Projected ROI of {:.1}% leaves room for additional airings.",
                roi.total_roi
            ),
        });
    }

    if roi.investment_estimated {
        recs.push(Recommendation {
            category: RecommendationCategory::Roi,
            priority: Priority::Low,
            title: "Supply the actual spot cost".to_string(),
            detail: "Investment was estimated from the per-second rate; \
                     the real cost sharpens the ROI forecast."
                .to_string(),
        });
    }
}

fn data_quality_recommendations(patterns: &HistoricalPatterns, recs: &mut Vec<Recommendation>) {
    if patterns.sample_count < THIN_HISTORY {
        recs.push(Recommendation {
            category: RecommendationCategory::DataQuality,
            priority: Priority::Medium,
            title: "Collect more history".to_string(),
            detail: format!(
                "{} samples are available; at least {THIN_HISTORY} give stable baselines.",
                patterns.sample_count
            ),
        });
    }
    if !patterns.anomalies.is_empty() {
        recs.push(Recommendation {
            category: RecommendationCategory::DataQuality,
            priority: Priority::Low,
            title: "Review traffic anomalies".to_string(),
            detail: format!(
                "{} hours deviate by more than three standard deviations from the mean.",
                patterns.anomalies.len()
            ),
        });
    }
}
