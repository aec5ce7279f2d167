//! Observation / business-hours intersection.
//!
//! Partitions the business-hours timeline into segments, attaching to each
//! sub-interval the observations it contains plus the nearest neighbors on
//! either side. Neighbors may come from outside the window entirely; the
//! storage layer supplies that margin.

use chrono::{DateTime, Utc};

use super::interval::Interval;
use super::ReportError;
use crate::models::{Observation, SiteStatus};

/// A timestamped status, stripped of its site id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPoint {
    pub at: DateTime<Utc>,
    pub status: SiteStatus,
}

impl From<&Observation> for StatusPoint {
    fn from(obs: &Observation) -> Self {
        StatusPoint {
            at: obs.timestamp_utc,
            status: obs.status,
        }
    }
}

/// One business-hours sub-interval with its observation evidence.
#[derive(Debug, Clone)]
pub struct Segment {
    pub interval: Interval,
    /// Observations with `interval.start <= t < interval.end`, in order.
    pub within: Vec<StatusPoint>,
    /// Nearest observation strictly before the start, if any.
    pub before: Option<StatusPoint>,
    /// Nearest observation at or after the end, if any.
    pub after: Option<StatusPoint>,
}

impl Segment {
    /// Whether no evidence exists anywhere near this segment.
    pub fn is_unknown(&self) -> bool {
        self.within.is_empty() && self.before.is_none() && self.after.is_none()
    }
}

/// Validates ordering and collapses same-instant duplicates, keeping the
/// last value seen for each instant.
pub fn normalize(observations: &[Observation]) -> Result<Vec<StatusPoint>, ReportError> {
    let mut points: Vec<StatusPoint> = Vec::with_capacity(observations.len());
    for obs in observations {
        if let Some(last) = points.last_mut() {
            if obs.timestamp_utc < last.at {
                return Err(ReportError::InvalidInput(format!(
                    "observations out of order: {} after {}",
                    obs.timestamp_utc, last.at
                )));
            }
            if obs.timestamp_utc == last.at {
                last.status = obs.status;
                continue;
            }
        }
        points.push(obs.into());
    }
    Ok(points)
}

/// Merge-walks sorted business sub-intervals against sorted observations in
/// a single linear pass.
pub fn partition(
    intervals: &[Interval],
    points: &[StatusPoint],
) -> Result<Vec<Segment>, ReportError> {
    for pair in intervals.windows(2) {
        if pair[1].start < pair[0].end {
            return Err(ReportError::InvalidInput(format!(
                "business sub-intervals overlap or are unsorted near {}",
                pair[1].start
            )));
        }
    }
    for pair in points.windows(2) {
        if pair[1].at < pair[0].at {
            return Err(ReportError::InvalidInput(
                "observations out of order".to_string(),
            ));
        }
    }

    let mut segments = Vec::with_capacity(intervals.len());
    let mut idx = 0;
    let mut before: Option<StatusPoint> = None;

    for interval in intervals {
        while idx < points.len() && points[idx].at < interval.start {
            before = Some(points[idx]);
            idx += 1;
        }

        let mut within = Vec::new();
        let mut j = idx;
        while j < points.len() && points[j].at < interval.end {
            within.push(points[j]);
            j += 1;
        }

        let segment_before = before;
        if let Some(last) = within.last() {
            before = Some(*last);
        }
        idx = j;

        segments.push(Segment {
            interval: *interval,
            within,
            before: segment_before,
            after: points.get(j).copied(),
        });
    }

    Ok(segments)
}
