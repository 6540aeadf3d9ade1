pub mod config;
pub mod error;
pub mod stats;
pub mod types;
pub mod validation;
pub mod window;

pub use config::AppConfig;
pub use error::{SpotliftError, SpotliftResult};
pub use validation::{AnomalyGate, ValidationFlag, ValueKind};
pub use window::TimeWindow;
