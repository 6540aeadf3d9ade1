use crate::error::{SpotliftError, SpotliftResult};
use crate::window::TimeWindow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One telemetry reading from the external analytics provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub active_users: f64,
    pub sessions: f64,
    pub pageviews: f64,
    #[serde(default)]
    pub bounces: Option<f64>,
    /// Average session duration in seconds.
    #[serde(default)]
    pub session_duration: Option<f64>,
    #[serde(default)]
    pub conversions: Option<f64>,
}

impl MetricSample {
    pub fn new(timestamp: DateTime<Utc>, active_users: f64, sessions: f64, pageviews: f64) -> Self {
        Self {
            timestamp,
            active_users,
            sessions,
            pageviews,
            bounces: None,
            session_duration: None,
            conversions: None,
        }
    }

    pub fn value(&self, metric: MetricName) -> Option<f64> {
        match metric {
            MetricName::ActiveUsers => Some(self.active_users),
            MetricName::Sessions => Some(self.sessions),
            MetricName::Pageviews => Some(self.pageviews),
            MetricName::Bounces => self.bounces,
            MetricName::SessionDuration => self.session_duration,
            MetricName::Conversions => self.conversions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricName {
    ActiveUsers,
    Sessions,
    Pageviews,
    Bounces,
    SessionDuration,
    Conversions,
}

impl MetricName {
    pub const ALL: [MetricName; 6] = [
        MetricName::ActiveUsers,
        MetricName::Sessions,
        MetricName::Pageviews,
        MetricName::Bounces,
        MetricName::SessionDuration,
        MetricName::Conversions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActiveUsers => "active_users",
            Self::Sessions => "sessions",
            Self::Pageviews => "pageviews",
            Self::Bounces => "bounces",
            Self::SessionDuration => "session_duration",
            Self::Conversions => "conversions",
        }
    }

    /// Whether values aggregate by summing over a period (otherwise averaged).
    pub fn is_additive(&self) -> bool {
        !matches!(self, Self::SessionDuration)
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One broadcast spot, as parsed from an uploaded event list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_seconds: u32,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub program_title: String,
    #[serde(default)]
    pub commercial_type: String,
    #[serde(default)]
    pub version: String,
    /// Media spend for the spot, when known.
    #[serde(default)]
    pub investment: Option<f64>,
}

impl EventRecord {
    pub fn new(id: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            timestamp: Some(timestamp),
            duration_seconds: 30,
            channel: String::new(),
            program_title: String::new(),
            commercial_type: String::new(),
            version: String::new(),
            investment: None,
        }
    }

    /// The broadcast timestamp; its absence makes the event unanalyzable.
    pub fn require_timestamp(&self) -> SpotliftResult<DateTime<Utc>> {
        self.timestamp.ok_or_else(|| {
            SpotliftError::Configuration(format!("event {} has no broadcast timestamp", self.id))
        })
    }
}

/// Aggregated metric values for one window.
pub type WindowMetrics = BTreeMap<MetricName, f64>;

/// Robust baseline statistic for one metric in one window.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ReferenceStatistic {
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    /// Baseline confidence in `[0, 100]`.
    pub confidence: f64,
    pub sample_size: usize,
}

impl ReferenceStatistic {
    /// The zero-sample baseline used when no comparable periods exist.
    pub fn insufficient() -> Self {
        Self::default()
    }

    pub fn is_insufficient(&self) -> bool {
        self.sample_size == 0
    }

    pub fn coefficient_of_variation(&self) -> Option<f64> {
        if self.mean > 0.0 {
            Some(self.std_dev / self.mean)
        } else {
            None
        }
    }
}

pub type WindowReference = BTreeMap<MetricName, ReferenceStatistic>;
pub type ReferenceMap = BTreeMap<TimeWindow, WindowReference>;

/// Per-metric comparison of a window against its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowImpact {
    pub window_value: f64,
    pub reference_value: f64,
    pub absolute_change: f64,
    pub percentage_change: f64,
    pub is_significant: bool,
    pub effect_size: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SignificanceResult {
    /// Share of significant metrics in `[0, 1]`.
    pub overall_ratio: f64,
    pub significant_metric_count: usize,
    pub total_metric_count: usize,
    pub effect_sizes: Vec<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowStatus {
    Measured,
    InsufficientData,
}

/// Impact of one event in one window, across all metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowReport {
    pub window: TimeWindow,
    pub label: String,
    pub status: WindowStatus,
    pub metrics: BTreeMap<MetricName, WindowImpact>,
    pub significance: SignificanceResult,
    /// Window confidence in `[0, 100]`.
    pub confidence: f64,
    #[serde(default)]
    pub validation: Vec<crate::validation::ValidationFlag>,
}

pub type ImpactMap = BTreeMap<TimeWindow, WindowReport>;

/// Severity / priority scale shared by risk factors and recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: RecommendationCategory,
    pub priority: Priority,
    pub title: String,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationCategory {
    Timing,
    Roi,
    RiskMitigation,
    DataQuality,
    Funnel,
}
