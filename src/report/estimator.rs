//! Duration-weighted uptime/downtime estimation.
//!
//! Walks the partitioned timeline and converts point observations plus
//! gaps into continuous-time active/inactive durations. Between two
//! consecutive observations the earlier status holds until their midpoint;
//! beyond the outermost observations the nearest status extrapolates to
//! the segment boundary. A segment with no evidence at all counts as
//! active and raises the data-quality flag.

use chrono::{DateTime, Utc};

use super::timeline::{Segment, StatusPoint};
use super::ReportError;
use crate::models::SiteStatus;

/// Uptime/downtime for one site and one window, in whole minutes.
/// `uptime_minutes + downtime_minutes` equals the rounded business-hours
/// duration of the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowEstimate {
    pub uptime_minutes: i64,
    pub downtime_minutes: i64,
    /// Some span had no observation evidence and was counted as active.
    pub assumed_active: bool,
}

/// Estimates one window from its partitioned timeline. Pure; no I/O.
pub fn estimate(segments: &[Segment]) -> Result<WindowEstimate, ReportError> {
    let mut up_secs = 0.0f64;
    let mut down_secs = 0.0f64;
    let mut assumed_active = false;

    for segment in segments {
        if segment.is_unknown() {
            up_secs += segment.interval.seconds();
            assumed_active = true;
            continue;
        }

        let points: Vec<StatusPoint> = segment
            .before
            .into_iter()
            .chain(segment.within.iter().copied())
            .chain(segment.after)
            .collect();

        for pair in points.windows(2) {
            if pair[1].at < pair[0].at {
                return Err(ReportError::InvalidInput(format!(
                    "segment evidence out of order at {}",
                    pair[1].at
                )));
            }
        }

        let mids: Vec<DateTime<Utc>> = points
            .windows(2)
            .map(|pair| midpoint(pair[0].at, pair[1].at))
            .collect();

        for (i, point) in points.iter().enumerate() {
            let held_from = if i == 0 {
                segment.interval.start
            } else {
                mids[i - 1]
            };
            let held_until = if i < mids.len() {
                mids[i]
            } else {
                segment.interval.end
            };

            let start = held_from.max(segment.interval.start);
            let end = held_until.min(segment.interval.end);
            if end > start {
                let secs = (end - start).num_milliseconds() as f64 / 1000.0;
                match point.status {
                    SiteStatus::Active => up_secs += secs,
                    SiteStatus::Inactive => down_secs += secs,
                }
            }
        }
    }

    let (uptime_minutes, downtime_minutes) = reconcile_minutes(up_secs, down_secs);
    Ok(WindowEstimate {
        uptime_minutes,
        downtime_minutes,
        assumed_active,
    })
}

fn midpoint(a: DateTime<Utc>, b: DateTime<Utc>) -> DateTime<Utc> {
    a + (b - a) / 2
}

/// Rounds both buckets to whole minutes such that they sum to the rounded
/// total. Floors both, then hands the leftover minute(s) to the bucket(s)
/// with the larger fractional remainder; uptime wins ties.
fn reconcile_minutes(up_secs: f64, down_secs: f64) -> (i64, i64) {
    let total_minutes = ((up_secs + down_secs) / 60.0).round() as i64;
    let up = up_secs / 60.0;
    let down = down_secs / 60.0;

    let mut up_whole = up.floor() as i64;
    let mut down_whole = down.floor() as i64;
    let up_frac = up - up.floor();
    let down_frac = down - down.floor();

    match total_minutes - up_whole - down_whole {
        1 => {
            if up_frac >= down_frac {
                up_whole += 1;
            } else {
                down_whole += 1;
            }
        }
        2 => {
            up_whole += 1;
            down_whole += 1;
        }
        _ => {}
    }

    (up_whole, down_whole)
}
