//! Predictive projection: turns historical traffic patterns and prior spot
//! impacts into forward-looking performance, ROI, engagement, conversion,
//! timing and risk estimates.

pub mod conversions;
pub mod engagement;
pub mod factors;
pub mod patterns;
pub mod performance;
pub mod projector;
pub mod recommendations;
pub mod risk;
pub mod roi;
pub mod timing;
pub mod types;
pub mod validated;

pub use factors::{ConstantEstimator, Estimators, FactorEstimator, ProjectionContext};
pub use patterns::HistoricalPatterns;
pub use projector::Predictor;
pub use types::{HistoricalData, MarketData, PredictionBundle, PriorImpact};
pub use validated::ValidatedPredictor;
