//! Airtime optimization: ranks weekday/hour slots by historical traffic.

use crate::patterns::HistoricalPatterns;
use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Relative audience by hour used when there is no history (broadcast prime time peak).
const FALLBACK_HOURLY_INDEX: [f64; 24] = [
    0.3, 0.2, 0.1, 0.1, 0.1, 0.2, 0.5, 0.8, 0.9, 0.8, 0.7, 0.7, 0.9, 0.9, 0.8, 0.8, 0.9, 1.1, 1.4,
    1.8, 2.0, 1.9, 1.4, 0.7,
];

const ALTERNATIVES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingSlot {
    pub weekday: Weekday,
    pub hour: u32,
    /// Daily index times hourly index (1.0 = average slot).
    pub score: f64,
}

impl fmt::Display for TimingSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:02}:00 (score {:.2})", self.weekday, self.hour, self.score)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Autumn,
}

impl Season {
    const ALL: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Autumn];

    /// Zero-based months (northern hemisphere).
    fn months(&self) -> [usize; 3] {
        match self {
            Self::Winter => [11, 0, 1],
            Self::Spring => [2, 3, 4],
            Self::Summer => [5, 6, 7],
            Self::Autumn => [8, 9, 10],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMethod {
    Historical,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyRecommendation {
    pub spots_per_week: u32,
    pub min_spacing_hours: u32,
    pub rationale: String,
}

impl FrequencyRecommendation {
    pub fn from_prior_lift(mean_immediate_lift: f64) -> Self {
        let (spots_per_week, rationale) = if mean_immediate_lift > 20.0 {
            (3, "strong prior response supports repeated airings")
        } else if mean_immediate_lift > 10.0 {
            (2, "moderate prior response")
        } else {
            (1, "weak or unmeasured prior response; test before scaling")
        };
        Self {
            spots_per_week,
            min_spacing_hours: 168 / spots_per_week,
            rationale: format!("{rationale} ({mean_immediate_lift:.1}% mean immediate lift)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimalTiming {
    pub best: Option<TimingSlot>,
    pub alternatives: Vec<TimingSlot>,
    pub worst: Option<TimingSlot>,
    /// Score of the slot the event actually aired in.
    pub event_slot: TimingSlot,
    /// 1-based week of month with the highest daily average.
    pub best_week_of_month: Option<u32>,
    pub best_season: Option<Season>,
    pub frequency: FrequencyRecommendation,
    pub method: OptimizationMethod,
}

#[derive(Debug, Clone, Default)]
pub struct AirtimeOptimizer;

impl AirtimeOptimizer {
    pub fn new() -> Self {
        Self
    }

    pub fn optimize(
        &self,
        patterns: &HistoricalPatterns,
        event_time: DateTime<Utc>,
        mean_immediate_lift: f64,
    ) -> OptimalTiming {
        let method = if patterns.has_data() {
            OptimizationMethod::Historical
        } else {
            OptimizationMethod::Fallback
        };

        let score = |weekday: u32, hour: u32| match method {
            OptimizationMethod::Historical => {
                patterns.daily_index(weekday) * patterns.hourly_index(hour)
            }
            OptimizationMethod::Fallback => FALLBACK_HOURLY_INDEX[(hour % 24) as usize],
        };

        let mut slots: Vec<TimingSlot> = (0..7)
            .flat_map(|d| (0..24).map(move |h| (d, h)))
            .map(|(d, h)| TimingSlot {
                weekday: weekday_from_monday(d),
                hour: h,
                score: score(d, h),
            })
            .collect();
        // Stable sort keeps Monday 00:00 first among equal scores.
        slots.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let event_weekday = event_time.weekday().num_days_from_monday();
        let event_slot = TimingSlot {
            weekday: event_time.weekday(),
            hour: event_time.hour(),
            score: score(event_weekday, event_time.hour()),
        };

        OptimalTiming {
            best: slots.first().copied(),
            alternatives: slots.iter().skip(1).take(ALTERNATIVES).copied().collect(),
            worst: slots.last().copied(),
            event_slot,
            best_week_of_month: argmax(&patterns.weekly).map(|w| w as u32 + 1),
            best_season: best_season(&patterns.monthly),
            frequency: FrequencyRecommendation::from_prior_lift(mean_immediate_lift),
            method,
        }
    }
}

fn weekday_from_monday(days: u32) -> Weekday {
    let mut weekday = Weekday::Mon;
    for _ in 0..days {
        weekday = weekday.succ();
    }
    weekday
}

/// Index of the largest positive value; `None` when all are zero.
fn argmax(values: &[f64]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| **v > 0.0)
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(Ordering::Equal))
        .map(|(i, _)| i)
}

fn best_season(monthly: &[f64; 12]) -> Option<Season> {
    let averages: Vec<f64> = Season::ALL
        .iter()
        .map(|season| {
            let observed: Vec<f64> = season
                .months()
                .iter()
                .map(|m| monthly[*m])
                .filter(|v| *v > 0.0)
                .collect();
            if observed.is_empty() {
                0.0
            } else {
                observed.iter().sum::<f64>() / observed.len() as f64
            }
        })
        .collect();
    argmax(&averages).map(|i| Season::ALL[i])
}
