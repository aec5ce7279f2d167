//! Trailing report windows.

use chrono::{DateTime, Duration, Utc};

use super::interval::Interval;

/// The three trailing absolute UTC ranges for one report run.
#[derive(Debug, Clone, Copy)]
pub struct ReportWindows {
    pub hour: Interval,
    pub day: Interval,
    pub week: Interval,
}

impl ReportWindows {
    /// Builds `[now-1h, now)`, `[now-1d, now)` and `[now-1w, now)`.
    pub fn trailing(now: DateTime<Utc>) -> Self {
        let make = |back: Duration| Interval {
            start: now - back,
            end: now,
        };
        Self {
            hour: make(Duration::hours(1)),
            day: make(Duration::days(1)),
            week: make(Duration::weeks(1)),
        }
    }

    /// The widest window; one observation fetch over this range covers all
    /// three estimates.
    pub fn widest(&self) -> Interval {
        self.week
    }
}
