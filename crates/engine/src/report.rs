//! Per-event and batch result types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use spotlift_core::types::{EventRecord, ImpactMap};
use spotlift_core::validation::ValidationFlag;
use spotlift_funnel::control::ComparisonMap;
use spotlift_funnel::FunnelReport;
use spotlift_predict::PredictionBundle;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStatus {
    /// Every stage ran on fetched data.
    Complete,
    /// Some data was missing, or the event timed out or was cancelled.
    Degraded,
    /// The event could not be analyzed at all (e.g. no timestamp).
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventAnalysis {
    pub event_id: String,
    pub status: AnalysisStatus,
    /// Why the result is degraded or unavailable.
    #[serde(default)]
    pub notes: Vec<String>,
    pub impact: ImpactMap,
    #[serde(default)]
    pub funnel: Option<FunnelReport>,
    #[serde(default)]
    pub control: Option<ComparisonMap>,
    #[serde(default)]
    pub prediction: Option<PredictionBundle>,
    /// Rejections outside the nested reports (control-group lift).
    #[serde(default)]
    pub validation: Vec<ValidationFlag>,
}

impl EventAnalysis {
    pub fn unavailable(event: &EventRecord, reason: impl Into<String>) -> Self {
        Self {
            event_id: event.id.clone(),
            status: AnalysisStatus::Unavailable,
            notes: vec![reason.into()],
            impact: ImpactMap::new(),
            funnel: None,
            control: None,
            prediction: None,
            validation: Vec::new(),
        }
    }

    /// Number of rejected values across the whole analysis.
    pub fn rejected_values(&self) -> usize {
        self.validation.len()
            + self.impact.values().map(|r| r.validation.len()).sum::<usize>()
            + self.funnel.as_ref().map_or(0, |f| f.validation.len())
            + self.prediction.as_ref().map_or(0, |p| p.validation.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub complete: usize,
    pub degraded: usize,
    pub unavailable: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub summary: BatchSummary,
    /// One result per input event, in input order.
    pub events: Vec<EventAnalysis>,
}

impl BatchReport {
    pub fn new(events: Vec<EventAnalysis>, cancelled: bool) -> Self {
        let mut summary = BatchSummary {
            total: events.len(),
            cancelled,
            ..Default::default()
        };
        for event in &events {
            match event.status {
                AnalysisStatus::Complete => summary.complete += 1,
                AnalysisStatus::Degraded => summary.degraded += 1,
                AnalysisStatus::Unavailable => summary.unavailable += 1,
            }
        }
        Self {
            batch_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            summary,
            events,
        }
    }
}
