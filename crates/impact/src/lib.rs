//! Temporal impact measurement: robust baselines, per-window comparison,
//! and significance scoring for a single broadcast spot.

pub mod impact;
pub mod reference;
pub mod significance;
pub mod validated;

pub use impact::{WindowImpactAnalyzer, SIGNIFICANCE_THRESHOLD_PCT};
pub use reference::{aggregate_window, ReferenceCalculator};
pub use significance::SignificanceEngine;
pub use validated::ValidatedImpactAnalyzer;
