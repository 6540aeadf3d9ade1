//! Historical pattern extraction over the primary traffic metric (active users).

use chrono::{DateTime, Datelike, Duration, DurationRound, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use spotlift_core::stats::{mean, std_dev};
use spotlift_core::types::MetricSample;
use std::collections::BTreeMap;

/// |z| above which an hourly total is reported as an anomaly.
const ANOMALY_Z: f64 = 3.0;
/// Daily slope, relative to the daily mean, that counts as a trend.
const TREND_THRESHOLD: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    /// Least-squares change in daily total per day.
    pub slope_per_day: f64,
    pub direction: TrendDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Seasonality {
    /// `(max - min) / mean` of monthly averages, in `[0, 1]`.
    pub strength: f64,
    /// 1-based month with the highest average, when any month has data.
    pub peak_month: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub z_score: f64,
}

/// Site engagement observed in history.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EngagementBaseline {
    pub pages_per_session: f64,
    /// Bounces per session in `[0, 1]`; zero when no bounce data exists.
    pub bounce_rate: f64,
    pub avg_session_duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPatterns {
    /// Mean hourly total by hour of day (UTC).
    pub hourly: [f64; 24],
    /// Mean daily total by weekday, Monday first.
    pub daily: [f64; 7],
    /// Mean daily total by week of month (days 1-7, 8-14, ...).
    pub weekly: [f64; 5],
    /// Mean daily total by calendar month, January first.
    pub monthly: [f64; 12],
    pub hourly_mean: f64,
    pub daily_mean: f64,
    pub trend: Trend,
    pub seasonality: Seasonality,
    pub anomalies: Vec<Anomaly>,
    /// Coefficient of variation of hourly totals.
    pub variability: f64,
    /// `1 / (1 + variability)`, or zero with fewer than two hourly totals.
    pub consistency: f64,
    pub sample_count: usize,
    pub engagement: EngagementBaseline,
}

impl HistoricalPatterns {
    pub fn extract(samples: &[MetricSample]) -> Self {
        let mut hourly_totals: BTreeMap<DateTime<Utc>, f64> = BTreeMap::new();
        let mut daily_totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
        for sample in samples {
            let hour = sample
                .timestamp
                .duration_trunc(Duration::hours(1))
                .unwrap_or(sample.timestamp);
            *hourly_totals.entry(hour).or_default() += sample.active_users;
            *daily_totals.entry(sample.timestamp.date_naive()).or_default() += sample.active_users;
        }

        let hourly =
            bucket_mean::<24>(hourly_totals.iter().map(|(ts, v)| (ts.hour() as usize, *v)));
        let daily = bucket_mean::<7>(
            daily_totals
                .iter()
                .map(|(d, v)| (d.weekday().num_days_from_monday() as usize, *v)),
        );
        let weekly = bucket_mean::<5>(
            daily_totals
                .iter()
                .map(|(d, v)| (((d.day() - 1) / 7) as usize, *v)),
        );
        let monthly =
            bucket_mean::<12>(daily_totals.iter().map(|(d, v)| (d.month0() as usize, *v)));

        let hourly_values: Vec<f64> = hourly_totals.values().copied().collect();
        let daily_values: Vec<f64> = daily_totals.values().copied().collect();
        let hourly_mean = mean(&hourly_values);
        let daily_mean = mean(&daily_values);
        let hourly_std = std_dev(&hourly_values);

        let variability = if hourly_mean > 0.0 {
            hourly_std / hourly_mean
        } else {
            0.0
        };
        let consistency = if hourly_values.len() < 2 {
            0.0
        } else {
            1.0 / (1.0 + variability)
        };

        let anomalies = if hourly_std > 0.0 {
            hourly_totals
                .iter()
                .filter_map(|(ts, v)| {
                    let z = (v - hourly_mean) / hourly_std;
                    (z.abs() > ANOMALY_Z).then_some(Anomaly {
                        timestamp: *ts,
                        value: *v,
                        z_score: z,
                    })
                })
                .collect()
        } else {
            Vec::new()
        };

        Self {
            hourly,
            daily,
            weekly,
            monthly,
            hourly_mean,
            daily_mean,
            trend: trend(&daily_totals, daily_mean),
            seasonality: seasonality(&monthly),
            anomalies,
            variability,
            consistency,
            sample_count: samples.len(),
            engagement: engagement_baseline(samples),
        }
    }

    /// Hourly average at `hour` relative to the overall hourly mean (1.0 = average).
    pub fn hourly_index(&self, hour: u32) -> f64 {
        if self.hourly_mean > 0.0 {
            self.hourly[(hour % 24) as usize] / self.hourly_mean
        } else {
            1.0
        }
    }

    /// Daily average on `weekday` (0 = Monday) relative to the overall daily mean.
    pub fn daily_index(&self, weekday: u32) -> f64 {
        if self.daily_mean > 0.0 {
            self.daily[(weekday % 7) as usize] / self.daily_mean
        } else {
            1.0
        }
    }

    pub fn has_data(&self) -> bool {
        self.sample_count > 0
    }
}

fn bucket_mean<const N: usize>(values: impl Iterator<Item = (usize, f64)>) -> [f64; N] {
    let mut sums = [0.0; N];
    let mut counts = [0usize; N];
    for (bucket, value) in values {
        if bucket < N {
            sums[bucket] += value;
            counts[bucket] += 1;
        }
    }
    let mut means = [0.0; N];
    for i in 0..N {
        if counts[i] > 0 {
            means[i] = sums[i] / counts[i] as f64;
        }
    }
    means
}

fn trend(daily_totals: &BTreeMap<NaiveDate, f64>, daily_mean: f64) -> Trend {
    let Some(first) = daily_totals.keys().next().copied() else {
        return Trend {
            slope_per_day: 0.0,
            direction: TrendDirection::Stable,
        };
    };

    let points: Vec<(f64, f64)> = daily_totals
        .iter()
        .map(|(d, v)| ((*d - first).num_days() as f64, *v))
        .collect();
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.1).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|p| (p.0 - mean_x).powi(2)).sum();
    let sxy: f64 = points
        .iter()
        .map(|p| (p.0 - mean_x) * (p.1 - mean_y))
        .sum();
    let slope_per_day = if sxx > 0.0 { sxy / sxx } else { 0.0 };

    let direction = if daily_mean > 0.0 && slope_per_day > TREND_THRESHOLD * daily_mean {
        TrendDirection::Increasing
    } else if daily_mean > 0.0 && slope_per_day < -TREND_THRESHOLD * daily_mean {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };

    Trend {
        slope_per_day,
        direction,
    }
}

fn seasonality(monthly: &[f64; 12]) -> Seasonality {
    let observed: Vec<(usize, f64)> = monthly
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, v)| *v > 0.0)
        .collect();
    if observed.is_empty() {
        return Seasonality {
            strength: 0.0,
            peak_month: None,
        };
    }
    let values: Vec<f64> = observed.iter().map(|(_, v)| *v).collect();
    let avg = mean(&values);
    let max = values.iter().copied().fold(f64::MIN, f64::max);
    let min = values.iter().copied().fold(f64::MAX, f64::min);
    let peak_month = observed
        .iter()
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| *i as u32 + 1);

    Seasonality {
        strength: if avg > 0.0 {
            ((max - min) / avg).clamp(0.0, 1.0)
        } else {
            0.0
        },
        peak_month,
    }
}

fn engagement_baseline(samples: &[MetricSample]) -> EngagementBaseline {
    let sessions: f64 = samples.iter().map(|s| s.sessions).sum();
    if sessions <= 0.0 {
        return EngagementBaseline::default();
    }
    let pageviews: f64 = samples.iter().map(|s| s.pageviews).sum();
    let bounces: f64 = samples.iter().filter_map(|s| s.bounces).sum();
    let durations: Vec<f64> = samples.iter().filter_map(|s| s.session_duration).collect();

    EngagementBaseline {
        pages_per_session: pageviews / sessions,
        bounce_rate: (bounces / sessions).clamp(0.0, 1.0),
        avg_session_duration: mean(&durations),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Hourly samples for `days` days starting Monday 2024-01-01, with a prime-time peak.
    fn hourly_history(days: i64, growth_per_day: f64) -> Vec<MetricSample> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        (0..days * 24)
            .map(|i| {
                let ts = start + Duration::hours(i);
                let base = if (19..=22).contains(&ts.hour()) { 200.0 } else { 100.0 };
                let users = base + growth_per_day * (i / 24) as f64;
                let mut s = MetricSample::new(ts, users, users, users * 2.5);
                s.bounces = Some(users * 0.4);
                s
            })
            .collect()
    }

    #[test]
    fn test_empty_history() {
        let patterns = HistoricalPatterns::extract(&[]);
        assert_eq!(patterns.sample_count, 0);
        assert_eq!(patterns.hourly_mean, 0.0);
        assert_eq!(patterns.consistency, 0.0);
        assert_eq!(patterns.trend.direction, TrendDirection::Stable);
        assert!(patterns.seasonality.peak_month.is_none());
        assert_eq!(patterns.hourly_index(20), 1.0);
        assert!(!patterns.has_data());
    }

    #[test]
    fn test_hourly_profile() {
        let patterns = HistoricalPatterns::extract(&hourly_history(14, 0.0));
        assert_eq!(patterns.hourly[20], 200.0);
        assert_eq!(patterns.hourly[3], 100.0);
        assert!(patterns.hourly_index(20) > 1.5);
        assert!(patterns.hourly_index(3) < 1.0);
        assert_eq!(patterns.trend.direction, TrendDirection::Stable);
        assert!(patterns.anomalies.is_empty());
        assert!(patterns.consistency > 0.5 && patterns.consistency < 1.0);
    }

    #[test]
    fn test_engagement_baseline() {
        let patterns = HistoricalPatterns::extract(&hourly_history(2, 0.0));
        assert!((patterns.engagement.pages_per_session - 2.5).abs() < 1e-9);
        assert!((patterns.engagement.bounce_rate - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_increasing_trend() {
        let patterns = HistoricalPatterns::extract(&hourly_history(28, 10.0));
        assert_eq!(patterns.trend.direction, TrendDirection::Increasing);
        assert!(patterns.trend.slope_per_day > 0.0);
    }

    #[test]
    fn test_spike_is_anomaly() {
        let mut samples = hourly_history(14, 0.0);
        samples[100].active_users = 5000.0;
        let patterns = HistoricalPatterns::extract(&samples);
        assert_eq!(patterns.anomalies.len(), 1);
        assert_eq!(patterns.anomalies[0].timestamp, samples[100].timestamp);
    }

    #[test]
    fn test_seasonality_single_month() {
        let patterns = HistoricalPatterns::extract(&hourly_history(7, 0.0));
        assert_eq!(patterns.seasonality.peak_month, Some(1));
        assert_eq!(patterns.seasonality.strength, 0.0);
    }
}
