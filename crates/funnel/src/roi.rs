//! ROI / ROAS accounting.

use serde::{Deserialize, Serialize};

/// Return-on-investment summary for a spot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RoiSummary {
    pub revenue: f64,
    pub cost: f64,
    pub profit: f64,
    /// `(revenue - cost) / cost * 100` (0.0 when cost is zero).
    pub roi: f64,
    /// `revenue / cost` (0.0 when cost is zero).
    pub roas: f64,
    pub cost_per_conversion: f64,
}

impl RoiSummary {
    pub fn compute(revenue: f64, cost: f64, conversions: f64) -> Self {
        Self {
            revenue,
            cost,
            profit: revenue - cost,
            roi: roi_percent(revenue, cost),
            roas: roas(revenue, cost),
            cost_per_conversion: if conversions > 0.0 {
                cost / conversions
            } else {
                0.0
            },
        }
    }
}

pub fn roi_percent(revenue: f64, cost: f64) -> f64 {
    if cost > 0.0 {
        (revenue - cost) / cost * 100.0
    } else {
        0.0
    }
}

pub fn roas(revenue: f64, cost: f64) -> f64 {
    if cost > 0.0 {
        revenue / cost
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roi_scenario() {
        let summary = RoiSummary::compute(150.0, 100.0, 3.0);
        assert_eq!(summary.roi, 50.0);
        assert_eq!(summary.roas, 1.5);
        assert_eq!(summary.profit, 50.0);
        assert!((summary.cost_per_conversion - 33.333).abs() < 1e-3);
    }

    #[test]
    fn test_zero_cost() {
        let summary = RoiSummary::compute(150.0, 0.0, 0.0);
        assert_eq!(summary.roi, 0.0);
        assert_eq!(summary.roas, 0.0);
        assert_eq!(summary.cost_per_conversion, 0.0);
    }

    #[test]
    fn test_loss_is_negative_roi() {
        assert_eq!(roi_percent(50.0, 100.0), -50.0);
        assert_eq!(roas(50.0, 100.0), 0.5);
    }
}
