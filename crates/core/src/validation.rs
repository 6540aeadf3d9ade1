//! Anomaly validation gate: keeps implausible or placeholder-looking numbers
//! out of reported results.
//!
//! Every derived value passes through [`AnomalyGate::check`] before it is
//! reported. A rejected value is replaced with `0.0` and a [`ValidationFlag`]
//! is recorded so consumers can surface the rejection instead of trusting the zero.

use crate::config::GateConfig;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// How a value is bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Non-negative magnitude (visitors, sessions, revenue).
    Count,
    /// Percentage share in `[0, 100]`.
    Rate,
    /// Confidence score in `[0, 100]`.
    Confidence,
    /// Fraction in `[0, 1]`; canned values are matched on its percentage.
    Probability,
    /// Signed percentage change, bounded by `max_change_pct`.
    Change,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    NotFinite,
    Negative,
    OutOfBounds,
    CannedValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Validation {
    Rejected,
}

/// Record of one rejected value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFlag {
    pub field: String,
    pub original: f64,
    pub reason: RejectionReason,
    pub validation: Validation,
}

#[derive(Debug, Clone)]
pub struct AnomalyGate {
    enabled: bool,
    canned_values: Vec<i64>,
    max_change_pct: f64,
}

impl AnomalyGate {
    pub fn new(config: &GateConfig) -> Self {
        Self {
            enabled: config.enabled,
            canned_values: config.canned_values.clone(),
            max_change_pct: config.max_change_pct,
        }
    }

    /// A gate that accepts everything; used for raw, undecorated analysis.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            canned_values: Vec::new(),
            max_change_pct: f64::INFINITY,
        }
    }

    /// Classify a value, returning the reason it would be rejected.
    pub fn inspect(&self, value: f64, kind: ValueKind) -> Option<RejectionReason> {
        if !self.enabled {
            return None;
        }
        if !value.is_finite() {
            return Some(RejectionReason::NotFinite);
        }
        match kind {
            ValueKind::Count if value < 0.0 => return Some(RejectionReason::Negative),
            ValueKind::Rate | ValueKind::Confidence if value < 0.0 => {
                return Some(RejectionReason::Negative)
            }
            ValueKind::Rate | ValueKind::Confidence if value > 100.0 => {
                return Some(RejectionReason::OutOfBounds)
            }
            ValueKind::Probability if value < 0.0 => return Some(RejectionReason::Negative),
            ValueKind::Probability if value > 1.0 => return Some(RejectionReason::OutOfBounds),
            ValueKind::Change if value.abs() > self.max_change_pct => {
                return Some(RejectionReason::OutOfBounds)
            }
            _ => {}
        }
        let rounded = match kind {
            ValueKind::Probability => (value * 100.0).round(),
            _ => value.round(),
        };
        if self
            .canned_values
            .iter()
            .any(|canned| *canned as f64 == rounded)
        {
            return Some(RejectionReason::CannedValue);
        }
        None
    }

    /// Gate a value in place. Rejected values become `0.0` and are flagged.
    pub fn check(
        &self,
        value: &mut f64,
        kind: ValueKind,
        field: impl Into<String>,
        flags: &mut Vec<ValidationFlag>,
    ) {
        if let Some(reason) = self.inspect(*value, kind) {
            let field = field.into();
            warn!(field = %field, value = *value, reason = ?reason, "Rejected anomalous value");
            metrics::counter!("validation.rejected").increment(1);
            flags.push(ValidationFlag {
                field,
                original: *value,
                reason,
                validation: Validation::Rejected,
            });
            *value = 0.0;
        }
    }
}

impl Default for AnomalyGate {
    fn default() -> Self {
        Self::new(&GateConfig::default())
    }
}

/// Report types that can be passed through the gate after computation.
pub trait Validate {
    fn validate(&mut self, gate: &AnomalyGate);
}
