//! Half-open UTC time ranges.
//!
//! `Interval` is the atomic unit the report pipeline reasons about:
//! `[start, end)` with `start < end`. Zero-length ranges are never
//! constructed.

use chrono::{DateTime, Utc};

/// A half-open UTC interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    /// Creates an interval, or `None` when it would be empty or inverted.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (start < end).then_some(Self { start, end })
    }

    pub fn duration(&self) -> chrono::Duration {
        self.end - self.start
    }

    /// Length in continuous seconds.
    pub fn seconds(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 1000.0
    }

    /// Whether an instant falls within this interval.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }

    /// Overlap with another interval, if any.
    pub fn intersect(&self, other: &Self) -> Option<Self> {
        Self::new(self.start.max(other.start), self.end.min(other.end))
    }
}

/// Sorts intervals ascending by start and merges overlapping or abutting
/// neighbors. Redundant rules collapse into one span here.
pub fn coalesce(mut intervals: Vec<Interval>) -> Vec<Interval> {
    intervals.sort_by_key(|iv| (iv.start, iv.end));

    let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
    for iv in intervals {
        match merged.last_mut() {
            Some(last) if iv.start <= last.end => {
                last.end = last.end.max(iv.end);
            }
            _ => merged.push(iv),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn iv(start: i64, end: i64) -> Interval {
        Interval::new(at(start), at(end)).unwrap()
    }

    #[test]
    fn rejects_empty_and_inverted() {
        assert!(Interval::new(at(100), at(100)).is_none());
        assert!(Interval::new(at(200), at(100)).is_none());
    }

    #[test]
    fn contains_is_half_open() {
        let w = iv(100, 200);
        assert!(w.contains(at(100)));
        assert!(w.contains(at(199)));
        assert!(!w.contains(at(200)));
        assert!(!w.contains(at(50)));
    }

    #[test]
    fn intersect_overlapping() {
        let a = iv(0, 100);
        let b = iv(50, 150);
        assert_eq!(a.intersect(&b), Some(iv(50, 100)));
        assert_eq!(b.intersect(&a), Some(iv(50, 100)));
    }

    #[test]
    fn intersect_touching_is_empty() {
        let a = iv(0, 100);
        let b = iv(100, 200);
        assert_eq!(a.intersect(&b), None);
    }

    #[test]
    fn coalesce_merges_overlaps_and_abutments() {
        let merged = coalesce(vec![iv(100, 200), iv(0, 50), iv(50, 120), iv(300, 400)]);
        assert_eq!(merged, vec![iv(0, 200), iv(300, 400)]);
    }

    #[test]
    fn coalesce_keeps_disjoint_sorted() {
        let merged = coalesce(vec![iv(200, 300), iv(0, 100)]);
        assert_eq!(merged, vec![iv(0, 100), iv(200, 300)]);
    }
}
