//! Conversion funnel analysis: per-stage impact of a spot against its
//! reference, two-proportion significance, drop-off, ROI/ROAS and
//! control-group lift.

pub mod analyzer;
pub mod control;
pub mod roi;
pub mod stats;
pub mod types;
pub mod validated;

pub use analyzer::FunnelAnalyzer;
pub use control::ControlComparison;
pub use roi::RoiSummary;
pub use types::{ConversionData, FunnelReport, FunnelStage, FunnelStageKind, StageObservation};
pub use validated::ValidatedFunnelAnalyzer;
