//! Historical data access.
//!
//! The orchestrator only talks to the [`HistoricalSource`] trait, so an
//! analytics-provider client and the in-memory source used by the CLI and
//! tests are interchangeable.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use spotlift_core::types::{EventRecord, MetricSample};
use spotlift_core::SpotliftResult;
use spotlift_funnel::ConversionData;
use spotlift_predict::{HistoricalData, PriorImpact};
use std::collections::BTreeMap;
use std::path::Path;

/// Funnel volumes attributed to one event.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventConversions {
    pub spot: ConversionData,
    /// Funnel of the comparable reference period.
    #[serde(default)]
    pub reference: ConversionData,
    /// Holdout audience or unexposed market, when one exists.
    #[serde(default)]
    pub control: Option<ConversionData>,
}

#[async_trait]
pub trait HistoricalSource: Send + Sync {
    /// Telemetry samples with `start <= timestamp < end`.
    async fn fetch_samples(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SpotliftResult<Vec<MetricSample>>;

    /// Timestamp of the newest sample the source can serve, when known.
    /// Windows ending past it are treated as not yet elapsed.
    async fn data_horizon(&self) -> SpotliftResult<Option<DateTime<Utc>>> {
        Ok(None)
    }

    /// Funnel volumes for the event, if the provider tracks conversions.
    async fn fetch_conversions(
        &self,
        _event: &EventRecord,
    ) -> SpotliftResult<Option<EventConversions>> {
        Ok(None)
    }

    /// Measured lifts of earlier spots, used to calibrate projections.
    async fn prior_impacts(&self, _event: &EventRecord) -> SpotliftResult<Vec<PriorImpact>> {
        Ok(Vec::new())
    }

    /// Typical-period funnel used for projected step rates.
    async fn funnel_baseline(&self) -> SpotliftResult<Option<ConversionData>> {
        Ok(None)
    }
}

/// Load one JSON input file (events, history, conversions or market data).
pub fn read_json<T: DeserializeOwned>(path: &Path) -> SpotliftResult<T> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Source backed by data loaded up front.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    samples: Vec<MetricSample>,
    prior_impacts: Vec<PriorImpact>,
    funnel_baseline: Option<ConversionData>,
    conversions: BTreeMap<String, EventConversions>,
}

impl InMemorySource {
    pub fn new(history: HistoricalData) -> Self {
        let mut samples = history.samples;
        samples.sort_by_key(|s| s.timestamp);
        Self {
            samples,
            prior_impacts: history.prior_impacts,
            funnel_baseline: history.funnel_baseline,
            conversions: BTreeMap::new(),
        }
    }

    pub fn with_conversions(mut self, conversions: BTreeMap<String, EventConversions>) -> Self {
        self.conversions = conversions;
        self
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[async_trait]
impl HistoricalSource for InMemorySource {
    async fn fetch_samples(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SpotliftResult<Vec<MetricSample>> {
        let lo = self.samples.partition_point(|s| s.timestamp < start);
        let hi = self.samples.partition_point(|s| s.timestamp < end);
        Ok(self.samples[lo..hi.max(lo)].to_vec())
    }

    async fn data_horizon(&self) -> SpotliftResult<Option<DateTime<Utc>>> {
        Ok(self.samples.last().map(|s| s.timestamp))
    }

    async fn fetch_conversions(
        &self,
        event: &EventRecord,
    ) -> SpotliftResult<Option<EventConversions>> {
        Ok(self.conversions.get(&event.id).cloned())
    }

    async fn prior_impacts(&self, _event: &EventRecord) -> SpotliftResult<Vec<PriorImpact>> {
        Ok(self.prior_impacts.clone())
    }

    async fn funnel_baseline(&self) -> SpotliftResult<Option<ConversionData>> {
        Ok(self.funnel_baseline.clone())
    }
}
