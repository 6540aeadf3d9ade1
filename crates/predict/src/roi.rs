//! Projected return on investment per window and overall.

use crate::conversions::StepRates;
use crate::performance::PerformanceProjection;
use serde::{Deserialize, Serialize};
use spotlift_core::window::TimeWindow;
use spotlift_funnel::roi::{roas, roi_percent};
use std::collections::BTreeMap;

/// Windows that do not overlap; their sum is the spot's total return.
const DISJOINT_WINDOWS: [TimeWindow; 3] = [
    TimeWindow::Immediate,
    TimeWindow::ShortTerm,
    TimeWindow::LongTerm,
];

/// Sample count at which history is considered sufficient for ROI.
const SUFFICIENT_SAMPLES: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowRoi {
    pub incremental_visitors: f64,
    pub conversions: f64,
    pub revenue: f64,
    /// ROI of the full investment against this window's revenue alone.
    pub roi: f64,
    pub roas: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiProjection {
    pub windows: BTreeMap<TimeWindow, WindowRoi>,
    pub investment: f64,
    /// True when investment came from the per-second rate rather than the event.
    pub investment_estimated: bool,
    pub average_order_value: f64,
    pub total_revenue: f64,
    pub total_roi: f64,
    pub total_roas: f64,
    pub break_even_conversions: f64,
    /// Confidence in the ROI figures, in `[0, 1]`.
    pub confidence: f64,
}

/// Inputs the ROI projection needs beyond the traffic projection.
#[derive(Debug, Clone, Copy)]
pub struct RoiInputs {
    pub investment: f64,
    pub investment_estimated: bool,
    pub average_order_value: f64,
    pub sample_count: usize,
}

impl RoiProjection {
    pub fn project(
        performance: &PerformanceProjection,
        rates: &StepRates,
        inputs: RoiInputs,
    ) -> Self {
        let conversion_rate = rates.visitor_to_conversion();
        let investment = inputs.investment.max(0.0);

        let windows: BTreeMap<TimeWindow, WindowRoi> = performance
            .windows
            .iter()
            .map(|(window, projection)| {
                let conversions = projection.incremental * conversion_rate;
                let revenue = conversions * inputs.average_order_value;
                let roi = WindowRoi {
                    incremental_visitors: projection.incremental,
                    conversions,
                    revenue,
                    roi: roi_percent(revenue, investment),
                    roas: roas(revenue, investment),
                };
                (*window, roi)
            })
            .collect();

        let total_revenue: f64 = DISJOINT_WINDOWS
            .iter()
            .filter_map(|w| windows.get(w))
            .map(|w| w.revenue)
            .sum();

        let base_confidence = if inputs.investment_estimated { 0.6 } else { 0.9 };
        let sufficiency = (inputs.sample_count as f64 / SUFFICIENT_SAMPLES).min(1.0);

        Self {
            windows,
            investment,
            investment_estimated: inputs.investment_estimated,
            average_order_value: inputs.average_order_value,
            total_revenue,
            total_roi: roi_percent(total_revenue, investment),
            total_roas: roas(total_revenue, investment),
            break_even_conversions: if inputs.average_order_value > 0.0 {
                investment / inputs.average_order_value
            } else {
                0.0
            },
            confidence: base_confidence * sufficiency,
        }
    }
}
