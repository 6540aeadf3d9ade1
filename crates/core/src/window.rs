//! The four fixed measurement horizons around a broadcast spot.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    /// 0-30 minutes after the spot.
    Immediate,
    /// 1-4 hours after the spot.
    ShortTerm,
    /// 1-7 days after the spot.
    MediumTerm,
    /// 1-30 days after the spot.
    LongTerm,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 4] = [
        TimeWindow::Immediate,
        TimeWindow::ShortTerm,
        TimeWindow::MediumTerm,
        TimeWindow::LongTerm,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Immediate => "immediate",
            Self::ShortTerm => "short_term",
            Self::MediumTerm => "medium_term",
            Self::LongTerm => "long_term",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Immediate => "Immediate (0-30 min)",
            Self::ShortTerm => "Short term (1-4 h)",
            Self::MediumTerm => "Medium term (1-7 d)",
            Self::LongTerm => "Long term (1-30 d)",
        }
    }

    /// Offset of the window start relative to the event.
    pub fn start_offset(&self) -> Duration {
        match self {
            Self::Immediate => Duration::zero(),
            Self::ShortTerm => Duration::hours(1),
            Self::MediumTerm | Self::LongTerm => Duration::days(1),
        }
    }

    /// Offset of the (exclusive) window end relative to the event.
    pub fn end_offset(&self) -> Duration {
        match self {
            Self::Immediate => Duration::minutes(30),
            Self::ShortTerm => Duration::hours(4),
            Self::MediumTerm => Duration::days(7),
            Self::LongTerm => Duration::days(30),
        }
    }

    pub fn duration(&self) -> Duration {
        self.end_offset() - self.start_offset()
    }

    pub fn duration_hours(&self) -> f64 {
        self.duration().num_minutes() as f64 / 60.0
    }

    /// Absolute `[start, end)` bounds of this window anchored at `anchor`.
    pub fn bounds(&self, anchor: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (anchor + self.start_offset(), anchor + self.end_offset())
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
